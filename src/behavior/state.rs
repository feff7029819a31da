//! Behavior states and per-tick frame selection

use pet_ui::Rect;
use serde::Deserialize;

use super::walk::Direction;

/// What the pet is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    Idle1,
    Idle2,
    Idle3,
    Idle4,
    /// The fifth idle animation, used as the sleeping state.
    Sleep,
    Walk,
}

/// Where a state's animation lives on the sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Animation {
    /// Top pixel row of the strip.
    pub row: u32,
    pub frames: u32,
}

impl BehaviorState {
    pub const ALL: [BehaviorState; 6] = [
        BehaviorState::Idle1,
        BehaviorState::Idle2,
        BehaviorState::Idle3,
        BehaviorState::Idle4,
        BehaviorState::Sleep,
        BehaviorState::Walk,
    ];

    pub const fn animation(self) -> Animation {
        match self {
            BehaviorState::Idle1 => Animation { row: 0, frames: 4 },
            BehaviorState::Idle2 => Animation { row: 32, frames: 4 },
            BehaviorState::Idle3 => Animation { row: 64, frames: 4 },
            BehaviorState::Idle4 => Animation { row: 96, frames: 4 },
            BehaviorState::Walk => Animation { row: 160, frames: 8 },
            BehaviorState::Sleep => Animation { row: 192, frames: 4 },
        }
    }

    pub fn is_walking(self) -> bool {
        self == BehaviorState::Walk
    }
}

/// Source and destination of the copy drawn this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpriteFrame {
    pub src: Rect,
    pub dst: Rect,
    pub flip_horizontal: bool,
}

/// Index of the animation frame shown at `ticks` milliseconds.
pub fn frame_index(ticks: u64, speed_ms: u64, frames: u32) -> u32 {
    if frames == 0 {
        return 0;
    }
    ((ticks / speed_ms.max(1)) % frames as u64) as u32
}

/// Frame for `state` at `ticks`. The destination never moves: the window does.
pub fn sprite_frame(
    state: BehaviorState,
    facing: Direction,
    ticks: u64,
    frame_size: u32,
    speed_ms: u64,
) -> SpriteFrame {
    let animation = state.animation();
    let index = frame_index(ticks, speed_ms, animation.frames);

    SpriteFrame {
        src: Rect::new(
            (index * frame_size) as i32,
            animation.row as i32,
            frame_size,
            frame_size,
        ),
        dst: Rect::new(0, 0, frame_size, frame_size),
        flip_horizontal: state.is_walking() && facing == Direction::Left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEED: u64 = 100;

    #[test]
    fn test_state_table() {
        let rows: Vec<_> = BehaviorState::ALL
            .iter()
            .map(|s| (s.animation().row, s.animation().frames))
            .collect();
        assert_eq!(
            rows,
            vec![(0, 4), (32, 4), (64, 4), (96, 4), (192, 4), (160, 8)]
        );
    }

    #[test]
    fn test_frame_index_is_periodic() {
        for state in BehaviorState::ALL {
            let frames = state.animation().frames;
            for ticks in (0..5_000).step_by(37) {
                assert_eq!(
                    frame_index(ticks, SPEED, frames),
                    frame_index(ticks + frames as u64 * SPEED, SPEED, frames),
                    "{:?} at {}",
                    state,
                    ticks
                );
            }
        }
    }

    #[test]
    fn test_frame_index_advances_every_speed_ms() {
        assert_eq!(frame_index(0, SPEED, 4), 0);
        assert_eq!(frame_index(99, SPEED, 4), 0);
        assert_eq!(frame_index(100, SPEED, 4), 1);
        assert_eq!(frame_index(399, SPEED, 4), 3);
        assert_eq!(frame_index(400, SPEED, 4), 0);
        assert_eq!(frame_index(700, SPEED, 8), 7);
    }

    #[test]
    fn test_sprite_frame_rects() {
        let frame = sprite_frame(BehaviorState::Sleep, Direction::Right, 250, 32, SPEED);
        assert_eq!(frame.src, Rect::new(64, 192, 32, 32));
        assert_eq!(frame.dst, Rect::new(0, 0, 32, 32));
        assert!(!frame.flip_horizontal);
    }

    #[test]
    fn test_only_walking_left_is_flipped() {
        let walk_left = sprite_frame(BehaviorState::Walk, Direction::Left, 0, 32, SPEED);
        let walk_right = sprite_frame(BehaviorState::Walk, Direction::Right, 0, 32, SPEED);
        let idle_left = sprite_frame(BehaviorState::Idle2, Direction::Left, 0, 32, SPEED);
        assert!(walk_left.flip_horizontal);
        assert!(!walk_right.flip_horizontal);
        assert!(!idle_left.flip_horizontal);
        assert_eq!(walk_left.src.y, 160);
    }

    #[test]
    fn test_states_parse_from_snake_case() {
        #[derive(Deserialize)]
        struct Holder {
            state: BehaviorState,
        }
        let holder: Holder = toml::from_str("state = \"idle3\"").unwrap();
        assert_eq!(holder.state, BehaviorState::Idle3);
        let holder: Holder = toml::from_str("state = \"sleep\"").unwrap();
        assert_eq!(holder.state, BehaviorState::Sleep);
    }
}
