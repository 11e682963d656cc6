//! Raw camera frames to RGB, the only format the rest of the app sees.

use color_eyre::{eyre::eyre, Result};
use image::RgbImage;
use jpeg_decoder::Decoder;

use super::frame::{FrameMetadata, PixelFormat};

pub fn decode_frame(data: &[u8], meta: &FrameMetadata) -> Result<RgbImage> {
    match meta.format {
        PixelFormat::Mjpeg => {
            let mut decoder = Decoder::new(data);
            let pixels = decoder.decode()?;
            let info = decoder
                .info()
                .ok_or_else(|| eyre!("jpeg stream carried no header"))?;
            if info.pixel_format != jpeg_decoder::PixelFormat::RGB24 {
                return Err(eyre!(
                    "unsupported jpeg pixel format: {:?}",
                    info.pixel_format
                ));
            }
            RgbImage::from_raw(info.width as u32, info.height as u32, pixels)
                .ok_or_else(|| eyre!("jpeg decode produced a short pixel buffer"))
        }
        PixelFormat::Yuyv4 => yuyv_to_rgb(data, meta.width, meta.height),
        PixelFormat::Rgb24 => {
            let expected = (meta.width * meta.height * 3) as usize;
            if data.len() < expected {
                return Err(eyre!("rgb frame too short: {} < {}", data.len(), expected));
            }
            RgbImage::from_raw(meta.width, meta.height, data[..expected].to_vec())
                .ok_or_else(|| eyre!("rgb frame dimensions mismatch"))
        }
    }
}

/// YUYV 4:2:2 packs two pixels into four bytes sharing one chroma pair.
fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        return Err(eyre!(
            "yuyv frame too short: {} < {}",
            data.len(),
            expected
        ));
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        push_rgb(&mut rgb, y0, u, v);
        push_rgb(&mut rgb, y1, u, v);
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| eyre!("yuyv conversion size mismatch"))
}

// ITU-R BT.601 studio-swing coefficients.
fn push_rgb(out: &mut Vec<u8>, y: u8, u: u8, v: u8) {
    let c = (y as f32 - 16.0) * 1.164;
    let d = u as f32 - 128.0;
    let e = v as f32 - 128.0;
    out.push(clamp(c + 1.596 * e));
    out.push(clamp(c - 0.392 * d - 0.813 * e));
    out.push(clamp(c + 2.017 * d));
}

fn clamp(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
