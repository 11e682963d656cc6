use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use v4l::{capability::Flags, video::Capture, Device, FourCC};

use crate::capture::frame::PixelFormat;

// Detected capture device info
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

impl FoundDevice {
    pub fn new(path: String, format: PixelFormat) -> Self {
        Self { path, format }
    }
}

/// Scan /dev/video0..9 for a usable capture device, preferring MJPEG and
/// falling back to the first YUYV device seen.
pub async fn auto_detect_device() -> Result<FoundDevice> {
    use std::path::Path;

    info!("Auto-detecting capture devices...");

    let mut yuyv_fallback: Option<FoundDevice> = None;

    for i in 0..10 {
        let path = format!("/dev/video{i}");
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
            continue;
        }

        let Ok(formats) = dev.enum_formats() else {
            continue;
        };
        for fmt in formats {
            if fmt.fourcc == FourCC::new(b"MJPG") {
                info!("Found MJPEG device: {} - {}", path, caps.card);
                return Ok(FoundDevice::new(path, PixelFormat::Mjpeg));
            }
            if fmt.fourcc == FourCC::new(b"YUYV") && yuyv_fallback.is_none() {
                info!("Found YUYV device: {} - {}", path, caps.card);
                yuyv_fallback = Some(FoundDevice::new(path.clone(), PixelFormat::Yuyv4));
            }
        }
    }

    yuyv_fallback.ok_or_else(|| eyre!("No suitable capture device found"))
}
