//! Walking along the bottom of the screen

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    fn sign(self) -> i32 {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

/// Pet position and facing while it walks.
///
/// `x` stays within `0..=max_x`, where `max_x` is the screen width minus the
/// sprite width. `y` never changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Walker {
    x: i32,
    y: i32,
    facing: Direction,
    max_x: i32,
    step: i32,
}

impl Walker {
    pub fn new(x: i32, y: i32, facing: Direction, screen_width: u32, sprite_width: u32) -> Self {
        let max_x = screen_width.saturating_sub(sprite_width) as i32;
        Self {
            x: x.clamp(0, max_x),
            y,
            facing,
            max_x,
            step: 1,
        }
    }

    /// Pixels moved per tick (default 1).
    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step.max(1) as i32;
        self
    }

    /// Advance one tick and return the new position.
    ///
    /// Facing flips when the pet stands on an edge and faces it. With no
    /// room to walk (`max_x == 0`) the pet stays put and keeps its facing.
    pub fn step(&mut self) -> (i32, i32) {
        if self.max_x == 0 {
            return self.position();
        }

        let at_edge = match self.facing {
            Direction::Right => self.x >= self.max_x,
            Direction::Left => self.x <= 0,
        };
        if at_edge {
            self.facing = self.facing.flipped();
            log::debug!("Reached edge at x={}, now facing {:?}", self.x, self.facing);
        }

        self.x = (self.x + self.facing.sign() * self.step).clamp(0, self.max_x);
        self.position()
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn facing(&self) -> Direction {
        self.facing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: u32 = 200;
    const SPRITE: u32 = 32;

    #[test]
    fn test_right_edge_flips_and_stays_in_bounds() {
        let mut walker = Walker::new(168, 500, Direction::Right, SCREEN, SPRITE);
        assert_eq!(walker.max_x, 168);

        let (x, y) = walker.step();
        assert_eq!(walker.facing(), Direction::Left);
        assert!(x <= 168);
        assert_eq!(x, 167);
        assert_eq!(y, 500);
    }

    #[test]
    fn test_walk_is_monotonic_with_one_flip() {
        let mut walker = Walker::new(100, 0, Direction::Right, SCREEN, SPRITE);
        let mut xs = vec![walker.position().0];
        let mut flips = 0;
        let mut facing = walker.facing();

        for _ in 0..120 {
            xs.push(walker.step().0);
            if walker.facing() != facing {
                flips += 1;
                facing = walker.facing();
            }
        }

        assert_eq!(flips, 1);
        let peak = xs.iter().position(|&x| x == 168).unwrap();
        assert!(xs[..=peak].windows(2).all(|w| w[1] > w[0]));
        assert!(xs[peak..].windows(2).all(|w| w[1] < w[0]));
        assert!(xs.iter().all(|&x| (0..=168).contains(&x)));
    }

    #[test]
    fn test_left_edge_flips() {
        let mut walker = Walker::new(0, 0, Direction::Left, SCREEN, SPRITE);
        assert_eq!(walker.step(), (1, 0));
        assert_eq!(walker.facing(), Direction::Right);
    }

    #[test]
    fn test_start_is_clamped() {
        let walker = Walker::new(1_000, 0, Direction::Right, SCREEN, SPRITE);
        assert_eq!(walker.position(), (168, 0));

        // Screen narrower than the sprite: no room to walk.
        let tiny = Walker::new(10, 0, Direction::Right, 16, SPRITE);
        assert_eq!(tiny.position(), (0, 0));
    }

    #[test]
    fn test_no_room_keeps_facing_stable() {
        for width in [16, SPRITE] {
            let mut walker = Walker::new(0, 7, Direction::Right, width, SPRITE);
            for _ in 0..10 {
                assert_eq!(walker.step(), (0, 7));
                assert_eq!(walker.facing(), Direction::Right);
            }
        }
    }

    #[test]
    fn test_larger_step_does_not_overshoot() {
        let mut walker = Walker::new(165, 0, Direction::Right, SCREEN, SPRITE).with_step(5);
        assert_eq!(walker.step(), (168, 0));
        assert_eq!(walker.step(), (163, 0));
        assert_eq!(walker.facing(), Direction::Left);
    }
}
