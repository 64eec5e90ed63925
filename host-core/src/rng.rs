use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Mutex;

/// Deterministic-seedable PRNG used for daytime collision tie-breaks. Wrapping
/// `SmallRng` in a mutex keeps the source `Send + Sync` without requiring every
/// caller to thread `&mut` through domain operations that are otherwise read-only.
pub struct Random {
    rng: Mutex<SmallRng>,
}

impl Random {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(SmallRng::from_os_rng()),
        }
    }

    /// Pick uniformly among `choices`, panicking if empty.
    pub fn choose<'a, T>(&self, choices: &'a [T]) -> &'a T {
        use rand::Rng;
        let mut rng = self.rng.lock().expect("random source poisoned");
        let index = rng.random_range(0..choices.len());
        &choices[index]
    }

    pub fn range(&self, low: i64, high: i64) -> i64 {
        use rand::Rng;
        let mut rng = self.rng.lock().expect("random source poisoned");
        rng.random_range(low..high)
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_random_is_reproducible() {
        let a = Random::seeded(7);
        let b = Random::seeded(7);
        let choices = [1, 2, 3, 4, 5];
        assert_eq!(a.choose(&choices), b.choose(&choices));
    }
}
