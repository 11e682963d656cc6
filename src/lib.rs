pub mod booth;
pub mod capture;
pub mod display;
pub mod storage;
pub mod utils;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::utils::FoundDevice;

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub display: DisplayConfig,
    pub booth: BoothConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Device path plus its pixel format; an empty path triggers auto-detection.
    pub device: FoundDevice,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

/// Knobs of the capture flow itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    /// Seconds between the trigger and the shutter.
    pub countdown_secs: u64,
    /// Flip the preview horizontally so the screen behaves like a mirror.
    /// Saved photos are always unflipped.
    pub mirror_preview: bool,
    /// Directory for saved photos, created on startup if missing.
    pub photo_dir: PathBuf,
    /// JPEG encode quality, 0-100.
    pub jpeg_quality: u8,
}

impl Config {
    /// Load configuration from an optional `photoclinic.toml` in the working
    /// directory, falling back to the defaults for anything unset.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("photoclinic").required(false))
            .build()?
            .try_deserialize()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: FoundDevice::default(),
            width: 1280,
            height: 720,
            fps: 30,
            buffer_count: 4,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            mirror_preview: true,
            photo_dir: PathBuf::from("photos"),
            jpeg_quality: 95,
        }
    }
}
