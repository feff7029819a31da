//! Transition policies

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use super::state::BehaviorState;

/// Decides whether the pet changes state.
pub trait TransitionPolicy {
    /// Evaluate a transition from `current`, which has been active for `dwell`.
    ///
    /// Returning `Some` (even the same state) restarts the dwell timer.
    fn evaluate(&mut self, current: BehaviorState, dwell: Duration) -> Option<BehaviorState>;
}

/// Never changes state.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedPolicy;

impl TransitionPolicy for FixedPolicy {
    fn evaluate(&mut self, _current: BehaviorState, _dwell: Duration) -> Option<BehaviorState> {
        None
    }
}

/// Minimum time a state lasts before a transition is evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellTimes {
    pub sleep: Duration,
    pub walk: Duration,
    pub idle: Duration,
}

impl Default for DwellTimes {
    fn default() -> Self {
        Self {
            sleep: Duration::from_secs(20),
            walk: Duration::from_secs(5),
            idle: Duration::from_secs(5),
        }
    }
}

impl DwellTimes {
    pub fn minimum(&self, state: BehaviorState) -> Duration {
        match state {
            BehaviorState::Sleep => self.sleep,
            BehaviorState::Walk => self.walk,
            BehaviorState::Idle1
            | BehaviorState::Idle2
            | BehaviorState::Idle3
            | BehaviorState::Idle4 => self.idle,
        }
    }
}

/// Relative weight of each target state. Bands are laid out in the order
/// sleep, walk, idle 1..4 over `[0, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub sleep: u32,
    pub walk: u32,
    pub idle: [u32; 4],
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            sleep: 40,
            walk: 40,
            idle: [8, 8, 7, 7],
        }
    }
}

impl Weights {
    pub fn total(&self) -> u32 {
        self.bands().iter().map(|(_, weight)| weight).sum()
    }

    fn bands(&self) -> [(BehaviorState, u32); 6] {
        [
            (BehaviorState::Sleep, self.sleep),
            (BehaviorState::Walk, self.walk),
            (BehaviorState::Idle1, self.idle[0]),
            (BehaviorState::Idle2, self.idle[1]),
            (BehaviorState::Idle3, self.idle[2]),
            (BehaviorState::Idle4, self.idle[3]),
        ]
    }

    /// State whose band contains `roll`. Rolls past the end land in the last
    /// non-empty band.
    pub fn pick(&self, roll: u32) -> BehaviorState {
        let mut upper = 0;
        let mut last = BehaviorState::Idle4;
        for (state, weight) in self.bands() {
            if weight == 0 {
                continue;
            }
            upper += weight;
            last = state;
            if roll < upper {
                return state;
            }
        }
        last
    }
}

/// Dwell-gated random transitions.
pub struct RandomPolicy<R = StdRng> {
    dwell: DwellTimes,
    weights: Weights,
    rng: R,
}

impl RandomPolicy<StdRng> {
    pub fn new(dwell: DwellTimes, weights: Weights) -> Self {
        Self::with_rng(dwell, weights, StdRng::from_entropy())
    }

    pub fn seeded(dwell: DwellTimes, weights: Weights, seed: u64) -> Self {
        Self::with_rng(dwell, weights, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomPolicy<R> {
    pub fn with_rng(dwell: DwellTimes, weights: Weights, rng: R) -> Self {
        Self { dwell, weights, rng }
    }
}

impl<R: Rng> TransitionPolicy for RandomPolicy<R> {
    fn evaluate(&mut self, current: BehaviorState, dwell: Duration) -> Option<BehaviorState> {
        if dwell < self.dwell.minimum(current) {
            return None;
        }
        let total = self.weights.total();
        if total == 0 {
            return None;
        }
        let roll = self.rng.gen_range(0..total);
        Some(self.weights.pick(roll))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn policy() -> RandomPolicy<StdRng> {
        RandomPolicy::seeded(DwellTimes::default(), Weights::default(), 7)
    }

    #[test]
    fn test_no_transition_before_minimum_dwell() {
        let mut p = policy();
        for state in BehaviorState::ALL {
            let minimum = DwellTimes::default().minimum(state);
            for ms in (0..minimum.as_millis() as u64).step_by(250) {
                assert_eq!(p.evaluate(state, Duration::from_millis(ms)), None);
            }
        }
    }

    #[test]
    fn test_transition_after_minimum_dwell() {
        let mut p = policy();
        assert!(p.evaluate(BehaviorState::Idle1, Duration::from_secs(5)).is_some());
        assert!(p.evaluate(BehaviorState::Sleep, Duration::from_secs(20)).is_some());
        assert_eq!(p.evaluate(BehaviorState::Sleep, Duration::from_secs(19)), None);
    }

    #[test]
    fn test_bands_partition_without_gaps() {
        let w = Weights::default();
        assert_eq!(w.total(), 110);
        for roll in 0..w.total() {
            let expected = match roll {
                0..=39 => BehaviorState::Sleep,
                40..=79 => BehaviorState::Walk,
                80..=87 => BehaviorState::Idle1,
                88..=95 => BehaviorState::Idle2,
                96..=102 => BehaviorState::Idle3,
                _ => BehaviorState::Idle4,
            };
            assert_eq!(w.pick(roll), expected, "roll {}", roll);
        }
    }

    #[test]
    fn test_every_state_is_reachable() {
        let w = Weights::default();
        for state in BehaviorState::ALL {
            assert!((0..w.total()).any(|roll| w.pick(roll) == state), "{:?}", state);
        }
    }

    #[test]
    fn test_zero_weights_are_skipped() {
        let w = Weights {
            sleep: 0,
            walk: 10,
            idle: [0, 0, 0, 0],
        };
        assert_eq!(w.pick(0), BehaviorState::Walk);
        assert_eq!(w.pick(9), BehaviorState::Walk);
        assert_eq!(w.pick(50), BehaviorState::Walk);
    }

    #[test]
    fn test_all_zero_weights_never_transition() {
        let weights = Weights {
            sleep: 0,
            walk: 0,
            idle: [0; 4],
        };
        let mut p = RandomPolicy::with_rng(DwellTimes::default(), weights, StepRng::new(0, 1));
        assert_eq!(p.evaluate(BehaviorState::Walk, Duration::from_secs(60)), None);
    }

    #[test]
    fn test_fixed_policy_never_transitions() {
        let mut p = FixedPolicy;
        for state in BehaviorState::ALL {
            assert_eq!(p.evaluate(state, Duration::from_secs(3_600)), None);
        }
    }
}
