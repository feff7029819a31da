//! Behavior state machine
//!
//! One machine covers every pet flavor: the policy decides whether the state
//! ever changes, the walker moves the window while walking, and the frame is
//! derived from the state and the current tick.

pub mod policy;
pub mod state;
pub mod walk;

use std::time::Duration;

pub use policy::{DwellTimes, FixedPolicy, RandomPolicy, TransitionPolicy, Weights};
pub use state::{BehaviorState, SpriteFrame};
pub use walk::{Direction, Walker};

use state::sprite_frame;

/// Sheet layout and animation speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub frame_size: u32,
    pub speed_ms: u64,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            frame_size: 32,
            speed_ms: 100,
        }
    }
}

pub struct StateMachine {
    state: BehaviorState,
    entered_at: u64,
    policy: Box<dyn TransitionPolicy>,
    walker: Walker,
    layout: SheetLayout,
    alert_state: BehaviorState,
    wake_requested: bool,
    frame: SpriteFrame,
}

impl StateMachine {
    pub fn new(
        initial: BehaviorState,
        policy: Box<dyn TransitionPolicy>,
        walker: Walker,
        layout: SheetLayout,
    ) -> Self {
        let frame = sprite_frame(
            initial,
            walker.facing(),
            0,
            layout.frame_size,
            layout.speed_ms,
        );
        Self {
            state: initial,
            entered_at: 0,
            policy,
            walker,
            layout,
            alert_state: BehaviorState::Idle1,
            wake_requested: false,
            frame,
        }
    }

    /// State entered when pointer motion wakes a sleeping pet.
    pub fn with_alert_state(mut self, state: BehaviorState) -> Self {
        self.alert_state = state;
        self
    }

    pub fn state(&self) -> BehaviorState {
        self.state
    }

    pub fn facing(&self) -> Direction {
        self.walker.facing()
    }

    pub fn position(&self) -> (i32, i32) {
        self.walker.position()
    }

    /// Frame computed by the last [`StateMachine::update`].
    pub fn frame(&self) -> SpriteFrame {
        self.frame
    }

    /// Milliseconds the current state has been active at `ticks`.
    pub fn dwell(&self, ticks: u64) -> u64 {
        ticks.saturating_sub(self.entered_at)
    }

    /// Pointer moved over the pet. Wakes it on the next update if asleep.
    pub fn on_pointer_motion(&mut self) {
        if self.state == BehaviorState::Sleep {
            self.wake_requested = true;
        }
    }

    /// Advance to `ticks`. Returns the new window position if the pet walked.
    pub fn update(&mut self, ticks: u64) -> Option<(i32, i32)> {
        let wake = std::mem::take(&mut self.wake_requested);
        if wake && self.state == BehaviorState::Sleep {
            self.enter(self.alert_state, ticks);
        } else {
            let dwell = Duration::from_millis(self.dwell(ticks));
            if let Some(next) = self.policy.evaluate(self.state, dwell) {
                self.enter(next, ticks);
            }
        }

        let moved = self.state.is_walking().then(|| self.walker.step());

        self.frame = sprite_frame(
            self.state,
            self.walker.facing(),
            ticks,
            self.layout.frame_size,
            self.layout.speed_ms,
        );
        moved
    }

    fn enter(&mut self, next: BehaviorState, ticks: u64) {
        log::debug!(
            "{:?} -> {:?} after {} ms",
            self.state,
            next,
            self.dwell(ticks)
        );
        self.state = next;
        self.entered_at = ticks;
    }
}
