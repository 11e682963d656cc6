//! Photo Clinic: camera preview, countdown capture, accept-or-retake review.

use std::time::Instant;

use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use photoclinic::booth::{CaptureEvent, Session, UserInput};
use photoclinic::capture::{decoder, V4l2Capture};
use photoclinic::display::Sdl2Display;
use photoclinic::storage::JpegStore;
use photoclinic::{utils, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("photoclinic=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Photo Clinic launching...");

    let config = Config::load()?;

    // Auto-detect capture device if needed
    let device = if config.capture.device.path.is_empty() {
        utils::auto_detect_device().await?
    } else {
        config.capture.device.clone()
    };

    info!("Using capture device: {:?}", device);

    // Camera open failure is fatal before the loop ever starts.
    let mut capture_config = config.capture.clone();
    capture_config.device = device;
    let mut capture = V4l2Capture::new(capture_config)?;
    capture.start_stream()?;

    let mut store = JpegStore::new(&config.booth.photo_dir, config.booth.jpeg_quality)?;

    let sdl_context = sdl2::init().map_err(|e| eyre!(e))?;
    let mut display = Sdl2Display::new(&sdl_context, config.display.width, config.display.height)?;

    let mut session = Session::new(&config.booth);

    info!("Controls: SPACE capture, ENTER save, R retake, ESC quit");

    // One tick per frame: poll input, read + decode (unless reviewing),
    // advance the state machine, render. Camera read or decode failure ends
    // the loop; drops release the camera and window on the way out.
    loop {
        let input = display.poll_input();
        if input == UserInput::Quit {
            info!("Quit requested");
            break;
        }

        let live = if session.needs_live_frame() {
            let raw = capture.capture_frame().await?;
            Some(decoder::decode_frame(&raw.data, &raw.meta)?)
        } else {
            None
        };

        let tick = session.advance(live.as_ref(), input, Instant::now(), &mut store)?;

        match &tick.event {
            CaptureEvent::Frozen(frame) => {
                info!(width = frame.width(), height = frame.height(), "captured");
            }
            CaptureEvent::Persisted(path) => {
                info!(path = %path.display(), "photo saved");
            }
            CaptureEvent::None => {}
        }

        display.show(&tick.display)?;
    }

    info!("Photo Clinic shutting down");
    Ok(())
}
