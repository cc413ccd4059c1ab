//! Turns the noisy per-frame label stream into discrete playback events.

use crate::classifier::GestureLabel;
use crate::landmarks::{INDEX_TIP, Point};

/// The three-label pattern that flips playback mode.
pub const TOGGLE_SEQUENCE: [GestureLabel; 3] =
    [GestureLabel::Open, GestureLabel::Close, GestureLabel::Open];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Play,
    Pause,
}

/// Recognizes the toggle sequence out of a flickering label stream.
///
/// Identical back-to-back labels are collapsed, so a pose held across many
/// frames counts once. Only `OPEN`/`CLOSE` changes enter the history;
/// `POINTER` and `NONE` frames leave a partially-matched sequence intact,
/// and a partial match never times out on idle.
#[derive(Debug)]
pub struct ToggleDetector {
    history: Vec<GestureLabel>,
    previous: GestureLabel,
    mode: PlaybackMode,
}

impl Default for ToggleDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ToggleDetector {
    pub fn new() -> Self {
        Self {
            history: Vec::with_capacity(TOGGLE_SEQUENCE.len()),
            previous: GestureLabel::None,
            mode: PlaybackMode::Pause,
        }
    }

    /// Feeds one frame's label. Returns true when the toggle sequence
    /// completed this frame; the history is cleared so the next toggle
    /// starts from scratch.
    pub fn advance(&mut self, label: GestureLabel) -> bool {
        if label == self.previous {
            return false;
        }

        let mut fired = false;
        if matches!(label, GestureLabel::Open | GestureLabel::Close) {
            self.history.push(label);
            if self.history.len() > TOGGLE_SEQUENCE.len() {
                self.history.remove(0);
            }
            if self.history == TOGGLE_SEQUENCE {
                self.history.clear();
                fired = true;
            }
        }
        self.previous = label;
        fired
    }

    /// Locally tracked mode. Advisory only: the remote player is the
    /// source of truth at toggle time, this cache just mirrors the last
    /// confirmed outcome.
    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Records the mode the dispatcher confirmed against the remote side.
    /// Not called when a toggle fails remotely, so a failed call leaves
    /// the cache as it was.
    pub fn note_mode(&mut self, mode: PlaybackMode) {
        self.mode = mode;
    }

    #[cfg(test)]
    fn history(&self) -> &[GestureLabel] {
        &self.history
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Forward,
    Back,
}

/// Tracks horizontal index-fingertip displacement while the hand holds the
/// pointer pose, emitting a discrete swipe whenever one frame-to-frame
/// step exceeds the threshold.
///
/// The baseline re-bases to the current sample every pointer frame, so a
/// long continuous drag can re-trigger, but each trigger needs the full
/// threshold again. Any non-pointer frame clears the baseline; the first
/// pointer frame after that can never fire.
#[derive(Debug)]
pub struct SwipeDetector {
    prev_x: Option<f32>,
    threshold: f32,
}

impl SwipeDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            prev_x: None,
            threshold,
        }
    }

    pub fn advance(&mut self, label: GestureLabel, landmarks: &[Point]) -> Option<Swipe> {
        if label != GestureLabel::Pointer {
            self.prev_x = None;
            return None;
        }
        let Some(tip) = landmarks.get(INDEX_TIP) else {
            self.prev_x = None;
            return None;
        };

        let fired = self.prev_x.and_then(|prev| {
            let dx = tip.x - prev;
            if dx > self.threshold {
                Some(Swipe::Forward)
            } else if -dx > self.threshold {
                Some(Swipe::Back)
            } else {
                None
            }
        });
        self.prev_x = Some(tip.x);
        fired
    }

    pub fn reset(&mut self) {
        self.prev_x = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::HAND_LANDMARKS;

    fn feed(det: &mut ToggleDetector, labels: &[GestureLabel]) -> usize {
        labels.iter().filter(|l| det.advance(**l)).count()
    }

    fn pointer_at(x: f32) -> Vec<Point> {
        let mut lm = vec![Point::new(0.0, 0.0); HAND_LANDMARKS];
        lm[INDEX_TIP] = Point::new(x, 240.0);
        lm
    }

    use GestureLabel::{Close, None as NoHand, Open, Pointer};

    #[test]
    fn test_toggle_fires_once_with_repeats() {
        let mut det = ToggleDetector::new();
        let fired = feed(&mut det, &[Open, Open, Close, Close, Open]);
        assert_eq!(fired, 1);
        assert!(det.history().is_empty());
    }

    #[test]
    fn test_wrong_order_never_fires() {
        let mut det = ToggleDetector::new();
        let fired = feed(&mut det, &[Close, Open, Open, Close]);
        assert_eq!(fired, 0);
        assert_eq!(det.history(), [Close, Open, Close].as_slice());
    }

    #[test]
    fn test_repeated_labels_are_idempotent() {
        let mut once = ToggleDetector::new();
        feed(&mut once, &[Open, Close]);

        let mut many = ToggleDetector::new();
        feed(&mut many, &[Open, Open, Open, Close, Close, Close, Close]);

        assert_eq!(once.history(), many.history());
    }

    #[test]
    fn test_interrupting_labels_leave_history_alone() {
        let mut det = ToggleDetector::new();
        assert_eq!(feed(&mut det, &[Open, Close, Pointer, NoHand]), 0);
        assert_eq!(det.history(), [Open, Close].as_slice());
        // the sequence can still complete after the interruption
        assert_eq!(feed(&mut det, &[Open]), 1);
    }

    #[test]
    fn test_consecutive_toggles() {
        let mut det = ToggleDetector::new();
        assert_eq!(feed(&mut det, &[Open, Close, Open, Close, Open]), 1);
        // after firing, history restarts: [Close] then [Close, Open]
        assert_eq!(det.history(), [Close, Open].as_slice());
    }

    #[test]
    fn test_swipe_forward_on_large_step() {
        let mut det = SwipeDetector::new(50.0);
        assert_eq!(det.advance(Pointer, &pointer_at(100.0)), None);
        assert_eq!(
            det.advance(Pointer, &pointer_at(200.0)),
            Some(Swipe::Forward)
        );
    }

    #[test]
    fn test_small_steps_never_accumulate() {
        let mut det = SwipeDetector::new(50.0);
        assert_eq!(det.advance(Pointer, &pointer_at(100.0)), None);
        assert_eq!(det.advance(Pointer, &pointer_at(120.0)), None);
        assert_eq!(det.advance(Pointer, &pointer_at(100.0)), None);
    }

    #[test]
    fn test_swipe_back() {
        let mut det = SwipeDetector::new(50.0);
        det.advance(Pointer, &pointer_at(300.0));
        assert_eq!(det.advance(Pointer, &pointer_at(180.0)), Some(Swipe::Back));
    }

    #[test]
    fn test_non_pointer_frame_resets_baseline() {
        let mut det = SwipeDetector::new(50.0);
        assert_eq!(det.advance(Pointer, &pointer_at(100.0)), None);
        assert_eq!(det.advance(NoHand, &[]), None);
        assert_eq!(det.advance(Pointer, &pointer_at(200.0)), None);
    }

    #[test]
    fn test_rebase_after_fire() {
        let mut det = SwipeDetector::new(50.0);
        det.advance(Pointer, &pointer_at(100.0));
        assert_eq!(
            det.advance(Pointer, &pointer_at(160.0)),
            Some(Swipe::Forward)
        );
        // next step is measured from 160, not from 100
        assert_eq!(det.advance(Pointer, &pointer_at(200.0)), None);
        assert_eq!(
            det.advance(Pointer, &pointer_at(260.0)),
            Some(Swipe::Forward)
        );
    }
}
