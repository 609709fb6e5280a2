use rand::Rng;
use crate::fiber::FiberSet;

/// Downsample filter.
///
/// Keeps a uniformly random subset of at most `max_fibers` fibers, drawn
/// without replacement. Relative fiber order is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsampleFilter {
    max_fibers: usize,
}

impl DownsampleFilter {
    /// Create a new downsample filter.
    pub fn new(max_fibers: usize) -> Self {
        Self { max_fibers }
    }

    /// Apply the filter. Sets no larger than `max_fibers` are returned whole.
    pub fn apply<R: Rng + ?Sized>(&self, set: &FiberSet, rng: &mut R) -> FiberSet {
        if set.len() <= self.max_fibers {
            return set.clone();
        }
        let mut indices = rand::seq::index::sample(rng, set.len(), self.max_fibers).into_vec();
        indices.sort_unstable();
        indices
            .into_iter()
            .filter_map(|i| set.get(i).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::Fiber;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn numbered(count: usize) -> FiberSet {
        (0..count)
            .map(|i| Fiber::from_coords(&[[i as f32, 0.0, 0.0], [i as f32, 1.0, 0.0]]))
            .collect()
    }

    #[test]
    fn test_downsample_size_and_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let out = DownsampleFilter::new(10).apply(&numbered(100), &mut rng);
        assert_eq!(out.len(), 10);
        let xs: Vec<f32> = out.iter().map(|f| f.points()[0].x).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_small_set_kept_whole() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let set = numbered(5);
        assert_eq!(DownsampleFilter::new(10).apply(&set, &mut rng), set);
    }
}
