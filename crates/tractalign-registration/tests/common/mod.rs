#![allow(dead_code)]

use tractalign_core::{Fiber, FiberSet};

/// Synthetic whole-brain-like bundle: curved fibers running along all
/// three axes, 90 to 120 mm long, spread over a 60 mm cube.
pub fn synthetic_atlas(count: usize) -> FiberSet {
    (0..count)
        .map(|i| {
            let t = i as f32;
            let axis = i % 3;
            let offset = [
                ((t * 7.3) % 60.0) - 30.0,
                ((t * 13.1) % 60.0) - 30.0,
                ((t * 3.7) % 60.0) - 30.0,
            ];
            let length = 90.0 + (t * 11.0) % 30.0;
            let bend = 4.0 + (t * 1.9) % 8.0;
            let coords: Vec<[f32; 3]> = (0..=20)
                .map(|k| {
                    let s = k as f32 / 20.0;
                    let along = (s - 0.5) * length;
                    let arc = bend * (std::f32::consts::PI * s).sin();
                    let mut p = offset;
                    p[axis] += along;
                    p[(axis + 1) % 3] += arc;
                    p
                })
                .collect();
            Fiber::from_coords(&coords)
        })
        .collect()
}

/// Every point of `set` moved by `shift`.
pub fn translated(set: &FiberSet, shift: [f32; 3]) -> FiberSet {
    set.iter()
        .map(|fiber| {
            let coords: Vec<[f32; 3]> = fiber
                .points()
                .iter()
                .map(|p| [p.x + shift[0], p.y + shift[1], p.z + shift[2]])
                .collect();
            Fiber::from_coords(&coords)
        })
        .collect()
}

/// Mean distance between corresponding points of two sets with the same layout.
pub fn mean_point_distance(a: &FiberSet, b: &FiberSet) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (fa, fb) in a.iter().zip(b.iter()) {
        for (p, q) in fa.points().iter().zip(fb.points()) {
            total += (p - q).norm() as f64;
            count += 1;
        }
    }
    total / count as f64
}

/// Short fibers that every default length filter removes.
pub fn short_fibers(count: usize) -> FiberSet {
    (0..count)
        .map(|i| Fiber::from_coords(&[[i as f32, 0.0, 0.0], [i as f32, 10.0, 0.0]]))
        .collect()
}
