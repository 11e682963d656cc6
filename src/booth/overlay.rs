//! Pure display composition: mirroring plus burned-in countdown digits and
//! the review key hint. The input frame is never touched, so frozen pixels
//! stay pristine for saving.

use ab_glyph::{FontVec, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

const COUNTDOWN_COLOR: Rgb<u8> = Rgb([255, 48, 48]);
const HINT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const REVIEW_HINT: &str = "ENTER save    R retake";

/// Fallback chain for the overlay font; drawing degrades to block digits
/// when none of these exist.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/truetype/freefont/FreeSansBold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    Live,
    Countdown(u64),
    Review,
}

pub struct OverlayRenderer {
    font: Option<FontVec>,
    mirror: bool,
}

impl OverlayRenderer {
    pub fn new(mirror: bool) -> Self {
        Self {
            font: load_font(),
            mirror,
        }
    }

    #[cfg(test)]
    fn with_font(font: Option<FontVec>, mirror: bool) -> Self {
        Self { font, mirror }
    }

    /// Build the frame to show for this tick. Always returns a new buffer.
    pub fn compose(&self, frame: &RgbImage, mode: OverlayMode) -> RgbImage {
        let mut display = if self.mirror {
            imageops::flip_horizontal(frame)
        } else {
            frame.clone()
        };

        match mode {
            OverlayMode::Live => {}
            OverlayMode::Countdown(secs) => self.draw_countdown(&mut display, secs),
            OverlayMode::Review => self.draw_review_hint(&mut display),
        }

        display
    }

    fn draw_countdown(&self, img: &mut RgbImage, secs: u64) {
        let text = secs.to_string();
        let (w, h) = img.dimensions();

        // Metrics depend on the digit being shown, so the centered position
        // is recomputed every tick.
        if let Some(font) = &self.font {
            let scale = PxScale::from(h as f32 * 0.45);
            let (tw, th) = text_size(scale, font, &text);
            let x = ((w as i32 - tw as i32) / 2).max(0);
            let y = ((h as i32 - th as i32) / 2).max(0);
            draw_text_mut(img, COUNTDOWN_COLOR, x, y, scale, font, &text);
        } else {
            draw_block_digits(img, &text);
        }
    }

    fn draw_review_hint(&self, img: &mut RgbImage) {
        let Some(font) = &self.font else { return };
        let (_, h) = img.dimensions();
        let scale = PxScale::from((h as f32 / 18.0).max(12.0));
        let (_, th) = text_size(scale, font, REVIEW_HINT);
        let y = (h as i32 - th as i32 - 12).max(0);
        draw_text_mut(img, HINT_COLOR, 12, y, scale, font, REVIEW_HINT);
    }
}

fn load_font() -> Option<FontVec> {
    for &path in FONT_CANDIDATES {
        let Ok(data) = std::fs::read(path) else {
            continue;
        };
        match FontVec::try_from_vec(data) {
            Ok(font) => {
                info!(path, "loaded overlay font");
                return Some(font);
            }
            Err(e) => warn!(path, error = %e, "failed to parse font file"),
        }
    }
    warn!("no overlay font found, falling back to block digits");
    None
}

/// Seven-segment masks for 0-9, bits A..G from least significant.
const SEGMENTS: [u8; 10] = [
    0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f,
];

fn draw_block_digits(img: &mut RgbImage, text: &str) {
    let (w, h) = img.dimensions();
    let dh = h / 3;
    if dh == 0 {
        return;
    }
    let dw = (dh / 2).max(3);
    let t = (dh / 8).max(2);
    let gap = t * 2;

    let count = text.chars().filter(|c| c.is_ascii_digit()).count() as u32;
    let total = count * dw + count.saturating_sub(1) * gap;
    let mut x = (w.saturating_sub(total) / 2) as i32;
    let y = (h.saturating_sub(dh) / 2) as i32;

    for c in text.chars() {
        if let Some(d) = c.to_digit(10) {
            draw_segments(img, SEGMENTS[d as usize], x, y, dw, dh, t);
            x += (dw + gap) as i32;
        }
    }
}

fn draw_segments(img: &mut RgbImage, mask: u8, x: i32, y: i32, w: u32, h: u32, t: u32) {
    let half = h / 2;
    let right = x + w.saturating_sub(t) as i32;
    // A top, B upper-right, C lower-right, D bottom, E lower-left,
    // F upper-left, G middle
    let segments: [(u8, i32, i32, u32, u32); 7] = [
        (0x01, x, y, w, t),
        (0x02, right, y, t, half),
        (0x04, right, y + half as i32, t, h - half),
        (0x08, x, y + h.saturating_sub(t) as i32, w, t),
        (0x10, x, y + half as i32, t, h - half),
        (0x20, x, y, t, half),
        (0x40, x, y + half.saturating_sub(t / 2) as i32, w, t),
    ];
    for (bit, sx, sy, sw, sh) in segments {
        if mask & bit != 0 && sw > 0 && sh > 0 {
            draw_filled_rect_mut(img, Rect::at(sx, sy).of_size(sw, sh), COUNTDOWN_COLOR);
        }
    }
}
