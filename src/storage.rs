//! Persisting accepted photos as timestamped JPEGs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create photo directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode jpeg for {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where accepted frames go. The session calls this exactly once per accept.
pub trait PhotoStore {
    fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, StoreError>;
}

/// JPEG files under a fixed directory, named by wall-clock timestamp.
pub struct JpegStore {
    dir: PathBuf,
    quality: u8,
}

impl JpegStore {
    /// The directory is created up front so the first accept cannot fail on
    /// a missing path.
    pub fn new(dir: impl AsRef<Path>, quality: u8) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StoreError::CreateDir {
            path: dir.clone(),
            source: e,
        })?;
        info!(dir = %dir.display(), quality, "photo store ready");
        Ok(Self { dir, quality })
    }
}

impl PhotoStore for JpegStore {
    fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, StoreError> {
        let name = format!("photo_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(name);

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality)
            .encode_image(frame)
            .map_err(|e| StoreError::Encode {
                path: path.clone(),
                source: e,
            })?;
        fs::write(&path, &buf).map_err(|e| StoreError::Write {
            path: path.clone(),
            source: e,
        })?;

        debug!(path = %path.display(), bytes = buf.len(), "jpeg written");
        Ok(path)
    }
}
