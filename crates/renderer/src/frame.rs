//! Ring of frame slots and their lifecycle states.
//!
//! The ring is the explicit "current frame" position of the scheduler. It
//! never touches the GPU; backends map a slot index onto whatever per-frame
//! resources they own.

use tracing::trace;

/// Lifecycle of one ring slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    /// The slot's previous submission (if any) is known to be complete.
    #[default]
    Idle,
    /// Commands for the slot are being recorded.
    Recording,
    /// Work was submitted and its fence has not been observed signaled.
    Submitted,
}

/// Ring index plus per-slot state for `N` frames in flight.
#[derive(Debug, Clone)]
pub struct FrameRing {
    states: Vec<SlotState>,
    current: usize,
    frame_number: u64,
}

impl FrameRing {
    pub const MAX_SLOTS: usize = 3;

    /// Creates a ring of `slots` idle slots, clamped to `1..=MAX_SLOTS`.
    pub fn new(slots: usize) -> Self {
        let slots = slots.clamp(1, Self::MAX_SLOTS);
        Self {
            states: vec![SlotState::Idle; slots],
            current: 0,
            frame_number: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Slot the next frame will use.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of frames presented so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    #[inline]
    pub fn state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    pub fn states(&self) -> &[SlotState] {
        &self.states
    }

    /// Slots currently submitted and not yet waited on.
    pub fn in_flight(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state == SlotState::Submitted)
            .count()
    }

    /// The current slot's fence has been observed signaled.
    pub fn mark_idle(&mut self) {
        self.states[self.current] = SlotState::Idle;
    }

    pub fn mark_recording(&mut self) {
        debug_assert_eq!(self.states[self.current], SlotState::Idle);
        self.states[self.current] = SlotState::Recording;
    }

    pub fn mark_submitted(&mut self) {
        debug_assert_eq!(self.states[self.current], SlotState::Recording);
        self.states[self.current] = SlotState::Submitted;
    }

    /// Recording failed before submission; the slot holds no GPU work.
    pub fn abandon_recording(&mut self) {
        if self.states[self.current] == SlotState::Recording {
            self.states[self.current] = SlotState::Idle;
        }
    }

    /// Moves to `(current + 1) mod N`.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.states.len();
        self.frame_number += 1;
        trace!(slot = self.current, frame = self.frame_number, "Ring advanced");
    }

    /// Every slot's work has completed (after a device-wide wait).
    pub fn mark_all_idle(&mut self) {
        self.states.fill(SlotState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_is_clamped() {
        assert_eq!(FrameRing::new(0).len(), 1);
        assert_eq!(FrameRing::new(2).len(), 2);
        assert_eq!(FrameRing::new(8).len(), FrameRing::MAX_SLOTS);
    }

    #[test]
    fn test_advance_wraps() {
        let mut ring = FrameRing::new(3);
        let visited: Vec<usize> = (0..7)
            .map(|_| {
                let slot = ring.current();
                ring.advance();
                slot
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(ring.frame_number(), 7);
    }

    #[test]
    fn test_slot_lifecycle() {
        let mut ring = FrameRing::new(2);
        ring.mark_recording();
        assert_eq!(ring.state(0), SlotState::Recording);
        ring.mark_submitted();
        ring.advance();
        ring.mark_recording();
        ring.mark_submitted();
        assert_eq!(ring.in_flight(), 2);

        ring.advance();
        ring.mark_idle();
        assert_eq!(ring.state(0), SlotState::Idle);
        assert_eq!(ring.in_flight(), 1);

        ring.mark_all_idle();
        assert_eq!(ring.in_flight(), 0);
    }

    #[test]
    fn test_abandon_returns_slot_to_idle() {
        let mut ring = FrameRing::new(2);
        ring.mark_recording();
        ring.abandon_recording();
        assert_eq!(ring.state(0), SlotState::Idle);
        assert_eq!(ring.current(), 0);
    }
}
