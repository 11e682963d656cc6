pub mod overlay;
pub mod session;

pub use overlay::{OverlayMode, OverlayRenderer};
pub use session::{BoothError, CaptureEvent, Session, State, Tick, UserInput};
