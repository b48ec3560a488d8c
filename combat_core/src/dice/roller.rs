//! Die sources: seeded RNG for play, scripted sequences for replays and tests

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use tracing::warn;

/// Produces single die faces in `1..=sides`
pub trait DieRoller {
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<T: DieRoller + ?Sized> DieRoller for Box<T> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

impl<T: DieRoller + ?Sized> DieRoller for &mut T {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

/// Uniform die source backed by any `rand` RNG
#[derive(Debug, Clone)]
pub struct RngRoller<R: Rng> {
    rng: R,
}

impl<R: Rng> RngRoller<R> {
    pub fn new(rng: R) -> Self {
        RngRoller { rng }
    }
}

impl RngRoller<ChaCha8Rng> {
    /// Reproducible roller for a fixed seed
    pub fn seeded(seed: u64) -> Self {
        RngRoller::new(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        RngRoller::new(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng> DieRoller for RngRoller<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Replays a fixed sequence of faces
///
/// Values are clamped into `1..=sides`. Once the script runs out every
/// further die shows 1.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    faces: VecDeque<u32>,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        ScriptedRoller {
            faces: faces.into_iter().collect(),
        }
    }

    /// Queue more faces after the current script
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    /// Faces not yet consumed
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DieRoller for ScriptedRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        match self.faces.pop_front() {
            Some(face) => face.clamp(1, sides.max(1)),
            None => {
                warn!(sides, "scripted roller exhausted, rolling 1");
                1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = RngRoller::seeded(42);
        let mut b = RngRoller::seeded(42);
        let rolls_a: Vec<u32> = (0..20).map(|_| a.roll_die(20)).collect();
        let rolls_b: Vec<u32> = (0..20).map(|_| b.roll_die(20)).collect();
        assert_eq!(rolls_a, rolls_b);
        assert!(rolls_a.iter().all(|r| (1..=20).contains(r)));
    }

    #[test]
    fn test_scripted_clamps_and_exhausts() {
        let mut roller = ScriptedRoller::new([12, 30, 0]);
        assert_eq!(roller.roll_die(20), 12);
        assert_eq!(roller.roll_die(6), 6);
        assert_eq!(roller.roll_die(6), 1);
        assert_eq!(roller.remaining(), 0);
        assert_eq!(roller.roll_die(6), 1);
    }

    #[test]
    fn test_boxed_roller() {
        let mut roller: Box<dyn DieRoller + Send> = Box::new(ScriptedRoller::new([4]));
        assert_eq!(roller.roll_die(6), 4);
    }
}
