//! Word pools and sampling helpers for task generators.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Lowercase words of four to eight letters.
pub const WORDS: &[&str] = &[
    "apple", "bridge", "candle", "dragon", "engine", "forest", "garden", "harbor", "island",
    "jungle", "kettle", "ladder", "marble", "needle", "orange", "pepper", "rabbit", "saddle",
    "tunnel", "velvet", "window", "yellow", "anchor", "basket", "castle", "desert", "feather",
    "glacier", "helmet", "lantern", "meadow", "planet", "rocket", "silver", "thunder", "violin",
    "wallet", "zipper", "copper", "butter", "coffee", "letter", "mirror", "puzzle", "summer",
    "cloud", "stone", "river", "music", "bread", "chair", "plant", "torch", "wheel", "brick",
];

pub const COLORS: &[&str] = &[
    "red", "blue", "green", "yellow", "purple", "orange", "black", "white", "brown", "pink",
    "gray", "silver",
];

pub const OBJECTS: &[&str] = &[
    "umbrella", "lamp", "book", "guitar", "kettle", "clock", "scarf", "shoe", "camera",
    "bottle", "pillow", "hammer", "compass", "ribbon", "teapot", "glove", "helmet", "mirror",
    "basket", "candle",
];

/// Uniform pick from a non-empty slice.
pub fn pick<T: Copy>(rng: &mut ChaCha8Rng, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

/// Up to `n` distinct elements in random order.
pub fn sample_distinct<T: Copy>(rng: &mut ChaCha8Rng, items: &[T], n: usize) -> Vec<T> {
    let mut indices: Vec<usize> = (0..items.len()).collect();
    indices.shuffle(rng);
    indices.into_iter().take(n).map(|i| items[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pools_are_clean() {
        for pool in [WORDS, COLORS, OBJECTS] {
            let unique: HashSet<_> = pool.iter().collect();
            assert_eq!(unique.len(), pool.len());
            assert!(pool
                .iter()
                .all(|w| w.chars().all(|c| c.is_ascii_lowercase())));
        }
    }

    #[test]
    fn test_sample_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = sample_distinct(&mut rng, WORDS, 5);
        let unique: HashSet<_> = sample.iter().collect();
        assert_eq!(unique.len(), 5);

        assert_eq!(sample_distinct(&mut rng, &[1, 2], 5).len(), 2);
    }
}
