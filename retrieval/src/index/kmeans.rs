//! Lloyd's k-means used to train the IVF coarse quantizer.

use rayon::prelude::*;
use tracing::debug;

use super::squared_l2;

/// Index of the centroid closest to `vector`. Ties go to the lower index.
pub(crate) fn nearest(centroids: &[f32], dim: usize, vector: &[f32]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::INFINITY;
    for (idx, centroid) in centroids.chunks_exact(dim).enumerate() {
        let distance = squared_l2(centroid, vector);
        if distance < best_distance {
            best = idx;
            best_distance = distance;
        }
    }
    best
}

/// Trains `k` centroids over the row-major `data`.
///
/// Seeds are evenly spaced rows, so training is deterministic. A cluster that loses all its
/// members keeps its previous centroid. Iteration stops early once assignments are stable.
/// Callers guarantee `0 < k <= rows` and `dim > 0`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn train(data: &[f32], dim: usize, k: usize, iterations: usize) -> Vec<f32> {
    let rows = data.len() / dim;
    let mut centroids = Vec::with_capacity(k * dim);
    for i in 0..k {
        let row = i * rows / k;
        centroids.extend_from_slice(&data[row * dim..(row + 1) * dim]);
    }

    let mut assignments: Vec<usize> = vec![usize::MAX; rows];
    for iteration in 0..iterations {
        let next: Vec<usize> = data
            .par_chunks_exact(dim)
            .map(|vector| nearest(&centroids, dim, vector))
            .collect();
        let changed = next
            .iter()
            .zip(&assignments)
            .filter(|(a, b)| a != b)
            .count();
        assignments = next;
        debug!(iteration, changed, "k-means iteration");
        if changed == 0 {
            break;
        }

        let mut sums = vec![0.0f32; k * dim];
        let mut counts = vec![0usize; k];
        for (vector, &cluster) in data.chunks_exact(dim).zip(&assignments) {
            counts[cluster] += 1;
            for (sum, value) in sums[cluster * dim..(cluster + 1) * dim]
                .iter_mut()
                .zip(vector)
            {
                *sum += value;
            }
        }
        for (cluster, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let target = &mut centroids[cluster * dim..(cluster + 1) * dim];
            for (c, sum) in target.iter_mut().zip(&sums[cluster * dim..(cluster + 1) * dim]) {
                *c = sum / count as f32;
            }
        }
    }

    centroids
}
