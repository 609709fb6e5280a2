use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tractalign_core::{Fiber, FiberSet};
use tractalign_registration::FiberSampler;

fn fibers(count: usize, points: usize) -> FiberSet {
    (0..count)
        .map(|i| {
            let coords: Vec<[f32; 3]> = (0..points)
                .map(|k| [i as f32, k as f32 * 2.5, (k as f32).sin()])
                .collect();
            Fiber::from_coords(&coords)
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_sample_size_and_point_count(
        count in 1usize..80,
        points in 1usize..25,
        points_per_fiber in 2usize..20,
        n in 0usize..120,
        seed in any::<u64>(),
    ) {
        let sampler = FiberSampler::new(&fibers(count, points), points_per_fiber);
        let sample = sampler.sample(n, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(sample.len(), n.min(count));
        prop_assert_eq!(sample.points_per_fiber(), points_per_fiber);
        prop_assert_eq!(sample.coords().len(), n.min(count) * points_per_fiber * 3);
    }

    #[test]
    fn prop_sample_draws_distinct_fibers(
        count in 1usize..60,
        n in 1usize..60,
        seed in any::<u64>(),
    ) {
        // Fiber i sits at x = i, so its first coordinate identifies it
        let sampler = FiberSampler::new(&fibers(count, 4), 3);
        let sample = sampler.sample(n, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let mut ids: Vec<i64> = (0..sample.len()).map(|i| sample.fiber(i)[0] as i64).collect();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), sample.len());
    }
}

#[test]
fn test_fresh_sample_per_call() {
    let sampler = FiberSampler::new(&fibers(100, 5), 4);
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let a = sampler.sample(10, &mut rng).unwrap();
    let b = sampler.sample(10, &mut rng).unwrap();
    assert_ne!(a, b);
}
