//! The per-frame gesture loop: one thread owns every piece of recognition
//! state, so frame ordering is preserved end to end.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use super::runtime;
use super::server::DaemonEvent;
use crate::classifier::{Classifier, FingerCurlClassifier, GestureLabel};
use crate::config::Profile;
use crate::gestures::{PlaybackMode, SwipeDetector, ToggleDetector};
use crate::input::{FrameSource, LandmarkFrame};
use crate::ipc::dispatch::{self, PlayerEvent};
use crate::landmarks;
use crate::remote::MediaControl;

/// Recognition state for one session: classifier, toggle debouncer, swipe
/// tracker. Frames go in, at most one playback event comes out per frame
/// (toggle fires on an `OPEN` frame, swipes on a `POINTER` frame).
pub struct GesturePipeline<C: Classifier> {
    classifier: C,
    toggle: ToggleDetector,
    swipe: SwipeDetector,
}

impl<C: Classifier> GesturePipeline<C> {
    pub fn new(classifier: C, swipe_threshold: f32) -> Self {
        Self {
            classifier,
            toggle: ToggleDetector::new(),
            swipe: SwipeDetector::new(swipe_threshold),
        }
    }

    pub fn advance(&mut self, frame: &LandmarkFrame) -> (GestureLabel, Option<PlayerEvent>) {
        let label = if frame.landmarks.is_empty() {
            GestureLabel::None
        } else {
            let features = landmarks::center(&frame.landmarks);
            self.classifier.classify(&features)
        };

        let mut event = None;
        if self.toggle.advance(label) {
            event = Some(PlayerEvent::TogglePlayback);
        }
        // swipes use raw pixel coordinates, not centered features
        if let Some(swipe) = self.swipe.advance(label, &frame.landmarks) {
            event = Some(PlayerEvent::from(swipe));
        }
        (label, event)
    }

    pub fn note_mode(&mut self, mode: PlaybackMode) {
        self.toggle.note_mode(mode);
    }

    pub fn mode(&self) -> PlaybackMode {
        self.toggle.mode()
    }

    /// Drops the swipe baseline so a re-enabled stream starts clean.
    pub fn pause_tracking(&mut self) {
        self.swipe.reset();
    }
}

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    enabled: Arc<AtomicBool>,
    remote: Arc<dyn MediaControl + Send + Sync>,
    tx_evt: std::sync::mpsc::Sender<DaemonEvent>,
) -> Result<()> {
    let th = { profile.lock().unwrap().thresholds.clone() };
    let mut pipe = GesturePipeline::new(
        FingerCurlClassifier::new(th.extend_ratio),
        th.swipe_px,
    );

    let stream_path = runtime::landmarks_path();
    loop {
        if !stream_path.exists() {
            warn!(
                "landmark stream missing at {}; waiting for the hand tracker",
                stream_path.display()
            );
            while !stream_path.exists() {
                thread::sleep(Duration::from_secs(1));
            }
        }

        let mut source = match crate::input::open_stream(&stream_path) {
            Ok(s) => s,
            Err(e) => {
                error!("{e}");
                thread::sleep(Duration::from_secs(1));
                continue;
            }
        };
        info!("reading landmark frames from {}", stream_path.display());

        loop {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    if !enabled.load(Ordering::Relaxed) {
                        // keep draining so re-enable starts from live frames
                        pipe.pause_tracking();
                        continue;
                    }
                    step(&mut pipe, &frame, &profile, remote.as_ref(), &tx_evt);
                }
                Ok(None) => {
                    warn!("landmark stream ended; reopening");
                    thread::sleep(Duration::from_millis(200));
                    break;
                }
                Err(e) => {
                    error!("frame read failed: {e}");
                    thread::sleep(Duration::from_millis(200));
                    break;
                }
            }
        }
    }
}

fn step<C: Classifier>(
    pipe: &mut GesturePipeline<C>,
    frame: &LandmarkFrame,
    profile: &Arc<Mutex<Profile>>,
    remote: &dyn MediaControl,
    tx_evt: &std::sync::mpsc::Sender<DaemonEvent>,
) {
    let (label, event) = pipe.advance(frame);
    debug!("frame label {label}");

    let Some(event) = event else { return };
    let _ = tx_evt.send(DaemonEvent::Log(format!("{label} -> {event:?}")));

    let snapshot = { profile.lock().unwrap().clone() };
    match dispatch::dispatch_event(&event, &snapshot, remote) {
        Ok(Some(mode)) => {
            if mode != pipe.mode() {
                let _ = tx_evt.send(DaemonEvent::Log(format!("playback mode now {mode:?}")));
            }
            pipe.note_mode(mode);
        }
        Ok(None) => {}
        // remote failures are reported and absorbed; recognition state
        // stays as it was and the loop keeps consuming frames
        Err(e) => error!("dispatch failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{HAND_LANDMARKS, INDEX_TIP, Point};

    /// Scripted classifier: returns canned labels regardless of features.
    struct Scripted {
        labels: std::cell::RefCell<std::vec::IntoIter<GestureLabel>>,
    }

    impl Scripted {
        fn new(labels: Vec<GestureLabel>) -> Self {
            Self {
                labels: std::cell::RefCell::new(labels.into_iter()),
            }
        }
    }

    impl Classifier for Scripted {
        fn classify(&self, _features: &[Point]) -> GestureLabel {
            self.labels.borrow_mut().next().unwrap_or(GestureLabel::None)
        }
    }

    fn hand_frame(tip_x: f32) -> LandmarkFrame {
        let mut lm = vec![Point::new(200.0, 200.0); HAND_LANDMARKS];
        lm[INDEX_TIP] = Point::new(tip_x, 180.0);
        LandmarkFrame { landmarks: lm }
    }

    fn empty_frame() -> LandmarkFrame {
        LandmarkFrame { landmarks: vec![] }
    }

    use GestureLabel::{Close, Open, Pointer};

    #[test]
    fn test_toggle_sequence_yields_one_event() {
        let script = Scripted::new(vec![Open, Open, Close, Close, Open]);
        let mut pipe = GesturePipeline::new(script, 50.0);

        let mut events = Vec::new();
        for _ in 0..5 {
            let (_, ev) = pipe.advance(&hand_frame(100.0));
            events.extend(ev);
        }
        assert_eq!(events, vec![PlayerEvent::TogglePlayback]);
    }

    #[test]
    fn test_empty_frames_never_classify() {
        // classifier would say Open, but an empty hand short-circuits to NONE
        let script = Scripted::new(vec![Open; 3]);
        let mut pipe = GesturePipeline::new(script, 50.0);

        for _ in 0..3 {
            let (label, ev) = pipe.advance(&empty_frame());
            assert_eq!(label, GestureLabel::None);
            assert_eq!(ev, None);
        }
    }

    #[test]
    fn test_pointer_swipe_maps_to_skip() {
        let script = Scripted::new(vec![Pointer, Pointer, Pointer]);
        let mut pipe = GesturePipeline::new(script, 50.0);

        assert_eq!(pipe.advance(&hand_frame(100.0)).1, None);
        assert_eq!(
            pipe.advance(&hand_frame(200.0)).1,
            Some(PlayerEvent::SkipForward)
        );
        assert_eq!(
            pipe.advance(&hand_frame(90.0)).1,
            Some(PlayerEvent::SkipBack)
        );
    }

    #[test]
    fn test_hand_loss_resets_swipe_baseline() {
        let script = Scripted::new(vec![Pointer, Pointer]);
        let mut pipe = GesturePipeline::new(script, 50.0);

        assert_eq!(pipe.advance(&hand_frame(100.0)).1, None);
        assert_eq!(pipe.advance(&empty_frame()).1, None);
        assert_eq!(pipe.advance(&hand_frame(200.0)).1, None);
    }

    #[test]
    fn test_mode_cache_round_trip() {
        let mut pipe = GesturePipeline::new(Scripted::new(vec![]), 50.0);
        assert_eq!(pipe.mode(), PlaybackMode::Pause);
        pipe.note_mode(PlaybackMode::Play);
        assert_eq!(pipe.mode(), PlaybackMode::Play);
    }
}
