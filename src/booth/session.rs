//! The capture state machine: one `advance` per tick decides whether the
//! booth is previewing, counting down, or holding a shot for review.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::booth::overlay::{OverlayMode, OverlayRenderer};
use crate::storage::PhotoStore;
use crate::BoothConfig;

#[derive(Debug, Error)]
pub enum BoothError {
    #[error("tick advanced without a live frame while streaming")]
    MissingLiveFrame,
}

/// One decoded key press per tick. When several arrive in the same tick the
/// display layer resolves them as Quit > Accept/Retry > TriggerCapture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInput {
    None,
    TriggerCapture,
    Accept,
    Retry,
    Quit,
}

/// What a tick produced beyond the display frame.
pub enum CaptureEvent {
    None,
    /// A frame was frozen for review; carries the pristine camera pixels.
    Frozen(RgbImage),
    /// The reviewed frame was written out.
    Persisted(PathBuf),
}

/// Session state. Holding the deadline and the captured frame inside their
/// variants makes "frame held iff reviewing" true by construction.
pub enum State {
    Preview,
    Countdown { deadline: Instant },
    Review { frame: RgbImage },
}

pub struct Tick {
    pub display: RgbImage,
    pub event: CaptureEvent,
}

pub struct Session {
    state: State,
    countdown: Duration,
    overlay: OverlayRenderer,
}

impl Session {
    pub fn new(config: &BoothConfig) -> Self {
        Self {
            state: State::Preview,
            countdown: Duration::from_secs(config.countdown_secs),
            overlay: OverlayRenderer::new(config.mirror_preview),
        }
    }

    /// While reviewing, the frozen frame is shown and the camera read can be
    /// skipped entirely.
    pub fn needs_live_frame(&self) -> bool {
        !matches!(self.state, State::Review { .. })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Advance one tick: the freshly decoded camera frame (absent only while
    /// reviewing), the input for this tick, and the current time in, the
    /// frame to show and at most one capture event out.
    pub fn advance(
        &mut self,
        live: Option<&RgbImage>,
        input: UserInput,
        now: Instant,
        store: &mut dyn PhotoStore,
    ) -> Result<Tick, BoothError> {
        match (std::mem::replace(&mut self.state, State::Preview), live) {
            (State::Review { frame }, _) => {
                // A live read performed anyway is discarded: review always
                // shows the frozen frame.
                let display = self.overlay.compose(&frame, OverlayMode::Review);
                match input {
                    UserInput::Accept => {
                        let event = match store.save(&frame) {
                            Ok(path) => CaptureEvent::Persisted(path),
                            Err(e) => {
                                // A failed save must not wedge the session;
                                // drop the frame and keep shooting.
                                warn!(error = %e, "failed to save photo, returning to preview");
                                CaptureEvent::None
                            }
                        };
                        Ok(Tick { display, event })
                    }
                    UserInput::Retry => {
                        debug!("photo discarded");
                        Ok(Tick {
                            display,
                            event: CaptureEvent::None,
                        })
                    }
                    _ => {
                        self.state = State::Review { frame };
                        Ok(Tick {
                            display,
                            event: CaptureEvent::None,
                        })
                    }
                }
            }
            (State::Preview, Some(frame)) => {
                if input == UserInput::TriggerCapture {
                    let deadline = now + self.countdown;
                    info!(secs = self.countdown.as_secs(), "countdown armed");
                    self.state = State::Countdown { deadline };
                }
                Ok(Tick {
                    display: self.overlay.compose(frame, OverlayMode::Live),
                    event: CaptureEvent::None,
                })
            }
            (State::Countdown { deadline }, Some(frame)) => {
                if now >= deadline {
                    // The one copy that outlives its tick.
                    let frozen = frame.clone();
                    let display = self.overlay.compose(&frozen, OverlayMode::Review);
                    self.state = State::Review {
                        frame: frozen.clone(),
                    };
                    Ok(Tick {
                        display,
                        event: CaptureEvent::Frozen(frozen),
                    })
                } else {
                    let remaining = secs_remaining(deadline, now);
                    self.state = State::Countdown { deadline };
                    Ok(Tick {
                        display: self
                            .overlay
                            .compose(frame, OverlayMode::Countdown(remaining)),
                        event: CaptureEvent::None,
                    })
                }
            }
            (state, None) => {
                self.state = state;
                Err(BoothError::MissingLiveFrame)
            }
        }
    }
}

/// Whole seconds left on the countdown, rounded up so the overlay never
/// shows 0 while still counting.
fn secs_remaining(deadline: Instant, now: Instant) -> u64 {
    deadline.saturating_duration_since(now).as_secs_f64().ceil() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;
    use image::Rgb;

    struct MockStore {
        saved: Vec<RgbImage>,
        fail: bool,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                saved: Vec::new(),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                saved: Vec::new(),
                fail: true,
            }
        }
    }

    impl PhotoStore for MockStore {
        fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, StoreError> {
            if self.fail {
                return Err(StoreError::Write {
                    path: PathBuf::from("photos/full.jpg"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.saved.push(frame.clone());
            Ok(PathBuf::from(format!("photos/photo_{}.jpg", self.saved.len())))
        }
    }

    fn session() -> Session {
        Session::new(&BoothConfig {
            mirror_preview: false,
            ..BoothConfig::default()
        })
    }

    fn cam(seed: u8) -> RgbImage {
        RgbImage::from_fn(8, 6, |x, y| Rgb([seed, x as u8, y as u8]))
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Arm at `t0` and tick past the 3 s deadline; returns the camera frame
    /// that got frozen.
    fn freeze(session: &mut Session, store: &mut MockStore, t0: Instant) -> RgbImage {
        let shot = cam(7);
        session
            .advance(Some(&cam(1)), UserInput::TriggerCapture, t0, store)
            .unwrap();
        session
            .advance(Some(&shot), UserInput::None, t0 + secs(3), store)
            .unwrap();
        shot
    }

    #[test]
    fn trigger_arms_countdown() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();

        let tick = s
            .advance(Some(&cam(0)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();

        assert!(matches!(tick.event, CaptureEvent::None));
        let State::Countdown { deadline } = s.state() else {
            panic!("expected countdown");
        };
        assert_eq!(*deadline, t0 + secs(3));
    }

    #[test]
    fn countdown_overlay_sequence_then_freeze() {
        // D = 3, ticks at +0.1/+1.2/+2.5 show 3, 2, 1; the first tick past
        // the deadline (+3.1) freezes and nothing froze earlier.
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();

        s.advance(Some(&cam(0)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();
        let State::Countdown { deadline } = s.state() else {
            panic!("expected countdown");
        };
        let deadline = *deadline;

        let mut shown = Vec::new();
        for (offset_ms, expect_freeze) in [(100, false), (1200, false), (2500, false), (3100, true)]
        {
            let now = t0 + Duration::from_millis(offset_ms);
            let tick = s
                .advance(Some(&cam(1)), UserInput::None, now, &mut store)
                .unwrap();
            if expect_freeze {
                assert!(matches!(tick.event, CaptureEvent::Frozen(_)));
                assert!(matches!(s.state(), State::Review { .. }));
            } else {
                assert!(matches!(tick.event, CaptureEvent::None));
                shown.push(secs_remaining(deadline, now));
            }
        }
        assert_eq!(shown, vec![3, 2, 1]);
    }

    #[test]
    fn secs_remaining_ceils_and_never_shows_zero() {
        let t0 = Instant::now();
        let deadline = t0 + secs(3);
        assert_eq!(secs_remaining(deadline, t0), 3);
        assert_eq!(secs_remaining(deadline, t0 + Duration::from_millis(1)), 3);
        assert_eq!(secs_remaining(deadline, t0 + Duration::from_millis(2001)), 1);
        assert_eq!(secs_remaining(deadline, t0 + Duration::from_millis(2999)), 1);
    }

    #[test]
    fn trigger_ignored_while_counting() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();

        s.advance(Some(&cam(0)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();
        s.advance(Some(&cam(0)), UserInput::TriggerCapture, t0 + secs(2), &mut store)
            .unwrap();

        let State::Countdown { deadline } = s.state() else {
            panic!("re-trigger must not leave countdown");
        };
        assert_eq!(*deadline, t0 + secs(3));

        // still freezes at the original deadline
        let tick = s
            .advance(Some(&cam(0)), UserInput::None, t0 + secs(3), &mut store)
            .unwrap();
        assert!(matches!(tick.event, CaptureEvent::Frozen(_)));
    }

    #[test]
    fn trigger_ignored_in_review() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        freeze(&mut s, &mut store, t0);

        s.advance(None, UserInput::TriggerCapture, t0 + secs(4), &mut store)
            .unwrap();

        assert!(matches!(s.state(), State::Review { .. }));
        assert!(!s.needs_live_frame());
    }

    #[test]
    fn accept_and_retry_ignored_outside_review() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();

        s.advance(Some(&cam(0)), UserInput::Accept, t0, &mut store)
            .unwrap();
        assert!(matches!(s.state(), State::Preview));

        s.advance(Some(&cam(0)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();
        s.advance(Some(&cam(0)), UserInput::Retry, t0 + secs(1), &mut store)
            .unwrap();
        assert!(matches!(s.state(), State::Countdown { .. }));
        assert!(store.saved.is_empty());
    }

    #[test]
    fn frame_held_only_while_reviewing() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();

        assert!(s.needs_live_frame());
        s.advance(Some(&cam(0)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();
        assert!(s.needs_live_frame());
        s.advance(Some(&cam(1)), UserInput::None, t0 + secs(3), &mut store)
            .unwrap();
        assert!(!s.needs_live_frame());
        s.advance(None, UserInput::Retry, t0 + secs(4), &mut store)
            .unwrap();
        assert!(s.needs_live_frame());
        assert!(matches!(s.state(), State::Preview));
    }

    #[test]
    fn accept_saves_the_pristine_frozen_frame_once() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        let shot = freeze(&mut s, &mut store, t0);

        let tick = s
            .advance(None, UserInput::Accept, t0 + secs(5), &mut store)
            .unwrap();

        assert!(matches!(tick.event, CaptureEvent::Persisted(_)));
        assert!(matches!(s.state(), State::Preview));
        assert_eq!(store.saved.len(), 1);
        // exactly the camera pixels at freeze time: no overlay, no mirror
        assert_eq!(store.saved[0].as_raw(), shot.as_raw());
    }

    #[test]
    fn frozen_event_carries_the_captured_frame() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        let shot = cam(7);

        s.advance(Some(&cam(1)), UserInput::TriggerCapture, t0, &mut store)
            .unwrap();
        let tick = s
            .advance(Some(&shot), UserInput::None, t0 + secs(3), &mut store)
            .unwrap();

        let CaptureEvent::Frozen(frozen) = tick.event else {
            panic!("expected a freeze");
        };
        assert_eq!(frozen.as_raw(), shot.as_raw());
    }

    #[test]
    fn retry_discards_without_saving() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        freeze(&mut s, &mut store, t0);

        let tick = s
            .advance(None, UserInput::Retry, t0 + secs(4), &mut store)
            .unwrap();

        assert!(matches!(tick.event, CaptureEvent::None));
        assert!(matches!(s.state(), State::Preview));
        assert!(store.saved.is_empty());
    }

    #[test]
    fn retry_then_trigger_counts_down_fresh() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        freeze(&mut s, &mut store, t0);
        s.advance(None, UserInput::Retry, t0 + secs(4), &mut store)
            .unwrap();

        let t1 = t0 + secs(10);
        s.advance(Some(&cam(2)), UserInput::TriggerCapture, t1, &mut store)
            .unwrap();

        let State::Countdown { deadline } = s.state() else {
            panic!("expected a fresh countdown");
        };
        assert_eq!(*deadline, t1 + secs(3));

        let tick = s
            .advance(Some(&cam(2)), UserInput::None, t1 + secs(1), &mut store)
            .unwrap();
        assert!(matches!(tick.event, CaptureEvent::None));
        assert!(store.saved.is_empty());
    }

    #[test]
    fn failed_save_recovers_to_preview() {
        let mut s = session();
        let mut store = MockStore::failing();
        let t0 = Instant::now();
        freeze(&mut s, &mut store, t0);

        let tick = s
            .advance(None, UserInput::Accept, t0 + secs(5), &mut store)
            .unwrap();

        assert!(matches!(tick.event, CaptureEvent::None));
        assert!(matches!(s.state(), State::Preview));
        assert!(s.needs_live_frame());
        assert!(store.saved.is_empty());
    }

    #[test]
    fn review_display_ignores_live_frame() {
        let mut s = session();
        let mut store = MockStore::new();
        let t0 = Instant::now();
        let shot = freeze(&mut s, &mut store, t0);

        let tick = s
            .advance(Some(&cam(9)), UserInput::None, t0 + secs(4), &mut store)
            .unwrap();

        assert!(matches!(s.state(), State::Review { .. }));
        assert_eq!(tick.display.get_pixel(0, 0), shot.get_pixel(0, 0));
    }

    #[test]
    fn missing_frame_outside_review_is_an_error() {
        let mut s = session();
        let mut store = MockStore::new();

        let result = s.advance(None, UserInput::None, Instant::now(), &mut store);

        assert!(result.is_err());
        assert!(matches!(s.state(), State::Preview));
    }
}
