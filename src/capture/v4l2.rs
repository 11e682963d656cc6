//! V4L2 capture over memory-mapped streaming buffers

use std::sync::Arc;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, instrument, trace, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::{
    capture::frame::{Frame, FrameMetadata, PixelFormat},
    CaptureConfig,
};

/// Streaming V4L2 camera handle. The device is released on drop, so every
/// exit path of the loop closes the camera.
pub struct V4l2Capture {
    device: Box<Device>,
    stream: Option<MmapStream<'static>>,
    config: CaptureConfig,
    width: u32,
    height: u32,
    sequence: u64,
}

impl V4l2Capture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        info!(device = ?config.device, "initializing V4L2 capture");

        let device = Device::with_path(&config.device.path)?;

        let caps = device.query_caps()?;
        info!("device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = match config.device.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            PixelFormat::Rgb24 => FourCC::new(b"RGB3"),
        };

        // The driver may negotiate a different size than requested.
        let actual = device.set_format(&fmt)?;
        if actual.width != config.width || actual.height != config.height {
            warn!(
                requested_width = config.width,
                requested_height = config.height,
                actual_width = actual.width,
                actual_height = actual.height,
                "camera negotiated a different frame size"
            );
        }
        info!(width = actual.width, height = actual.height, "camera active");

        device.set_params(&Parameters::with_fps(config.fps))?;

        Ok(Self {
            device: Box::new(device),
            stream: None,
            width: actual.width,
            height: actual.height,
            config,
            sequence: 0,
        })
    }

    /// Start streaming with memory-mapped buffers
    pub fn start_stream(&mut self) -> Result<()> {
        let stream =
            MmapStream::with_buffers(&self.device, Type::VideoCapture, self.config.buffer_count)?;

        self.stream = Some(stream);
        info!(
            buffers = self.config.buffer_count,
            "capture stream started"
        );
        Ok(())
    }

    /// Dequeue the next frame. Blocks until the camera produces data; any
    /// error is fatal to the tick loop.
    #[instrument(skip(self))]
    pub async fn capture_frame(&mut self) -> Result<Frame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| eyre!("stream not started"))?;

        let (buf, meta) = stream.next()?;

        // Compressed formats only fill part of the mmap buffer.
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let data = Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;
        trace!(sequence = self.sequence, bytes = data.len(), "frame dequeued");

        Ok(Frame {
            data,
            meta: Arc::new(FrameMetadata {
                sequence: self.sequence,
                width: self.width,
                height: self.height,
                format: self.config.device.format,
            }),
        })
    }
}
