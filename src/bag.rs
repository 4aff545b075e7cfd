//! 7-bag randomizer for piece generation
//!
//! All 7 shapes are shuffled into a bag and dealt out before reshuffling,
//! which bounds how far apart repeats of the same shape can land. Each
//! player owns one bag (its generator key), seeded so that tests and
//! replays are reproducible.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::tetromino::Shape;

/// A per-player shuffled-permutation piece source
#[derive(Debug, Clone)]
pub struct Bag {
    rng: ChaCha8Rng,
    stack: Vec<Shape>,
}

impl Bag {
    /// Create a bag with a random seed
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create a bag with an explicit seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            stack: Vec::with_capacity(7),
        }
    }

    /// Pop the next shape, reshuffling a fresh permutation when the bag runs dry
    pub fn draw(&mut self) -> Shape {
        if self.stack.is_empty() {
            self.refill();
        }
        self.stack.pop().expect("refilled bag holds seven shapes")
    }

    fn refill(&mut self) {
        let mut shapes = Shape::all();
        shapes.shuffle(&mut self.rng);
        self.stack.extend(shapes);
    }
}

impl Default for Bag {
    fn default() -> Self {
        Self::new()
    }
}
