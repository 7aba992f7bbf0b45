//! Deterministic weighted choice.
//!
//! The draw depends only on the seed and the value's index key, so
//! re-deriving the same grammar from the same root picks the same branches
//! no matter in which order values arrive.

use sha2::{Digest, Sha256};

/// Map `(seed, key)` to a number in `[0, 1)`.
pub fn draw(key: &str, seed: u64) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let word = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    f64::from(word) / 4_294_967_296.0
}

/// Walk the cumulative probabilities until they exceed `draw`.
///
/// Probabilities that do not sum to 1 fall through to the last branch.
/// Returns `None` only when there are no branches.
pub fn choose(probabilities: &[f64], draw: f64) -> Option<usize> {
    let last = probabilities.len().checked_sub(1)?;
    let mut cumulative = 0.0;
    for (i, p) in probabilities.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return Some(i);
        }
    }
    Some(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_is_deterministic_and_in_range() {
        for key in ["0", "0,1", "3,2,1", ""] {
            let a = draw(key, 42);
            assert_eq!(a, draw(key, 42));
            assert!((0.0..1.0).contains(&a));
        }
    }

    #[test]
    fn draw_depends_on_seed_and_key() {
        assert_ne!(draw("0", 0), draw("0", 1));
        assert_ne!(draw("0", 0), draw("1", 0));
    }

    #[test]
    fn choose_walks_cumulative() {
        let p = [0.25, 0.5, 0.25];
        assert_eq!(choose(&p, 0.0), Some(0));
        assert_eq!(choose(&p, 0.3), Some(1));
        assert_eq!(choose(&p, 0.74), Some(1));
        assert_eq!(choose(&p, 0.9), Some(2));
    }

    #[test]
    fn choose_falls_back_to_last() {
        assert_eq!(choose(&[0.1, 0.1], 0.5), Some(1));
        assert_eq!(choose(&[], 0.5), None);
    }

    #[test]
    fn draws_spread_over_branches() {
        let hits = (0..1000)
            .filter(|i| choose(&[0.5, 0.5], draw(&i.to_string(), 3)) == Some(0))
            .count();
        assert!((350..650).contains(&hits), "hits = {hits}");
    }
}
