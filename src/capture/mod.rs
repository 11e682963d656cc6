pub mod decoder;
pub mod frame;
pub mod v4l2;

pub use frame::Frame;
pub use frame::FrameMetadata;
pub use frame::PixelFormat;
pub use v4l2::V4l2Capture;
