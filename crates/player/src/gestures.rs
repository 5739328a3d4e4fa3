//! Horizontal swipe recognition
//!
//! A drag reads as "next" when the net horizontal displacement exceeds
//! the threshold in the negative direction (finger moving left), "prev"
//! in the positive direction. Sub-threshold motion is ignored.

use readalong_core::TurnDirection;

#[derive(Debug)]
pub struct SwipeTracker {
    threshold: f32,
    start_x: Option<f32>,
}

impl SwipeTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            start_x: None,
        }
    }

    pub fn begin(&mut self, x: f32) {
        self.start_x = Some(x);
    }

    /// Finish the gesture and classify it. Returns `None` for
    /// sub-threshold motion or an end without a matching begin.
    pub fn end(&mut self, x: f32) -> Option<TurnDirection> {
        let start = self.start_x.take()?;
        let displacement = x - start;

        if displacement <= -self.threshold {
            Some(TurnDirection::Next)
        } else if displacement >= self.threshold {
            Some(TurnDirection::Prev)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_swipe_past_threshold_is_next() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(200.0);
        assert_eq!(tracker.end(140.0), Some(TurnDirection::Next));
    }

    #[test]
    fn right_swipe_past_threshold_is_prev() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(100.0);
        assert_eq!(tracker.end(160.0), Some(TurnDirection::Prev));
    }

    #[test]
    fn sub_threshold_motion_is_ignored() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(100.0);
        assert_eq!(tracker.end(70.0), None);
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut tracker = SwipeTracker::new(50.0);
        assert_eq!(tracker.end(0.0), None);
    }

    #[test]
    fn gesture_state_resets_after_end() {
        let mut tracker = SwipeTracker::new(50.0);
        tracker.begin(300.0);
        assert_eq!(tracker.end(200.0), Some(TurnDirection::Next));
        assert_eq!(tracker.end(0.0), None);
    }
}
