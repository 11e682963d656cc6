use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A raw frame as it came off the camera, still in the wire format.
#[derive(Clone)]
pub struct Frame {
    /// Immutable frame data - can be shared without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Yuyv4,
    #[default]
    Mjpeg,
}
