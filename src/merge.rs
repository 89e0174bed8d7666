//! Variance-minimizing reduction of a centroid pool to a fixed size.
//!
//! Streaming inserts reduce greedily by merging the nearest pair. When whole
//! sketches are merged the union of their centroids is known up front, so the
//! reduction can instead be solved exactly: partition the sorted pool into
//! `capacity` contiguous groups minimizing the total count-weighted
//! within-group variance, via dynamic programming over group boundaries.

use crate::centroid::Centroid;

/// Sort `pool` by value, coalesce exact-value duplicates, and reduce the
/// result to at most `capacity` centroids with minimum total count-weighted
/// within-group variance. A pool already within the budget is returned
/// unchanged beyond sorting and coalescing.
pub(crate) fn merge_centroid_pool(mut pool: Vec<Centroid>, capacity: usize) -> Vec<Centroid> {
    pool.sort_by(|a, b| a.value.total_cmp(&b.value));

    // Centroids with the same value merge by just summing counts; fold those
    // before attempting dynamic programming.
    let mut coalesced: Vec<Centroid> = Vec::with_capacity(pool.len());
    for c in pool {
        match coalesced.last_mut() {
            Some(last) if last.value == c.value => last.count += c.count,
            _ => coalesced.push(c),
        }
    }

    if coalesced.len() <= capacity {
        return coalesced;
    }
    optimal_partition(&coalesced, capacity)
}

// Weighted incremental mean/variance accumulator (West's formulation of
// Welford's method). `sq_dev` is the count-weighted sum of squared
// deviations from the running mean.
struct RunningVariance {
    weight: f64,
    mean: f64,
    sq_dev: f64,
}

impl RunningVariance {
    fn new() -> RunningVariance {
        RunningVariance {
            weight: 0.0,
            mean: 0.0,
            sq_dev: 0.0,
        }
    }

    fn push(&mut self, c: &Centroid) {
        let w = c.count as f64;
        self.weight += w;
        let delta = c.value - self.mean;
        self.mean += delta * w / self.weight;
        self.sq_dev += w * delta * (c.value - self.mean);
    }
}

// Partition the sorted, deduplicated `centroids` into exactly `capacity`
// contiguous groups minimizing the summed group variances, and collapse each
// group to its count-weighted mean. Requires `centroids.len() > capacity`.
//
// `cost[i][j]` is the minimum total variance of splitting the first `i + 1`
// centroids into `j + 1` groups; `back[i][j]` is the start index of the last
// group in that optimum, used to backtrack the decomposition. Both matrices
// are row-major and scoped to this call.
fn optimal_partition(centroids: &[Centroid], capacity: usize) -> Vec<Centroid> {
    let n = centroids.len();
    let k = capacity;
    let mut cost = vec![0.0; n * k];
    let mut back = vec![0usize; n * k];

    // One group covering the whole prefix.
    let mut var = RunningVariance::new();
    for (i, c) in centroids.iter().enumerate() {
        var.push(c);
        cost[i * k] = var.sq_dev;
    }

    // tail_var[s] holds the variance of centroids[s..=i] for the current i.
    let mut tail_var = vec![0.0; n];
    for j in 1..k {
        for i in j..n {
            let mut var = RunningVariance::new();
            for s in (j..=i).rev() {
                var.push(&centroids[s]);
                tail_var[s] = var.sq_dev;
            }
            let mut best_cost = f64::INFINITY;
            let mut best_start = i;
            for s in j..=i {
                let candidate = cost[(s - 1) * k + (j - 1)] + tail_var[s];
                if candidate < best_cost {
                    best_cost = candidate;
                    best_start = s;
                }
            }
            cost[i * k + j] = best_cost;
            back[i * k + j] = best_start;
        }
    }

    // Backtrack the group boundaries and collapse each group to its
    // count-weighted mean.
    let mut result = vec![Centroid::new(0.0, 0); k];
    let mut end = n - 1;
    for j in (0..k).rev() {
        let start = back[end * k + j];
        let mut sum = 0.0;
        let mut count = 0;
        for c in &centroids[start..=end] {
            sum += c.value * c.count as f64;
            count += c.count;
        }
        result[j] = Centroid::new(sum / count as f64, count);
        if start == 0 {
            break;
        }
        end = start - 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(items: &[(f64, u64)]) -> Vec<Centroid> {
        items.iter().map(|&(v, c)| Centroid::new(v, c)).collect()
    }

    #[test]
    fn test_pool_within_budget_unchanged() {
        let merged = merge_centroid_pool(pool(&[(3.0, 1), (1.0, 2), (2.0, 1)]), 8);
        assert_eq!(pool(&[(1.0, 2), (2.0, 1), (3.0, 1)]), merged);
    }

    #[test]
    fn test_duplicates_coalesce() {
        let merged = merge_centroid_pool(
            pool(&[(1.0, 1), (2.0, 1), (3.0, 1), (1.0, 1), (2.0, 1), (3.0, 1)]),
            3,
        );
        assert_eq!(pool(&[(1.0, 2), (2.0, 2), (3.0, 2)]), merged);
    }

    #[test]
    fn test_separated_clusters() {
        let merged = merge_centroid_pool(pool(&[(0.0, 1), (1.0, 1), (10.0, 1), (11.0, 1)]), 2);
        assert_eq!(pool(&[(0.5, 2), (10.5, 2)]), merged);
    }

    #[test]
    fn test_outlier_isolated() {
        let merged = merge_centroid_pool(pool(&[(1.0, 1), (2.0, 1), (100.0, 1)]), 2);
        assert_eq!(pool(&[(1.5, 2), (100.0, 1)]), merged);
    }

    #[test]
    fn test_counts_weight_the_split() {
        // With the middle point heavily weighted toward the left cluster,
        // grouping it left costs less weighted variance than grouping right.
        let merged = merge_centroid_pool(pool(&[(0.0, 99), (1.0, 99), (2.0, 1), (10.0, 1)]), 2);
        assert_eq!(2, merged.len());
        assert_eq!(199, merged[0].count);
        assert_eq!(1, merged[1].count);
        assert_eq!(10.0, merged[1].value);
    }

    #[test]
    fn test_mass_and_order_preserved() {
        let input = pool(&[
            (5.0, 3),
            (-2.0, 1),
            (7.5, 2),
            (0.0, 4),
            (3.0, 1),
            (9.0, 2),
            (2.0, 5),
            (8.0, 1),
        ]);
        let total: u64 = input.iter().map(|c| c.count).sum();
        let merged = merge_centroid_pool(input, 3);
        assert_eq!(3, merged.len());
        assert_eq!(total, merged.iter().map(|c| c.count).sum::<u64>());
        assert!(merged.windows(2).all(|w| w[0].value < w[1].value));
    }

    #[test]
    fn test_running_variance_matches_two_pass() {
        let items = pool(&[(1.0, 2), (4.0, 1), (6.0, 3), (9.0, 2)]);
        let mut var = RunningVariance::new();
        for c in &items {
            var.push(c);
        }
        let total_weight: f64 = items.iter().map(|c| c.count as f64).sum();
        let mean: f64 =
            items.iter().map(|c| c.value * c.count as f64).sum::<f64>() / total_weight;
        let direct: f64 = items
            .iter()
            .map(|c| c.count as f64 * (c.value - mean) * (c.value - mean))
            .sum();
        assert!((var.sq_dev - direct).abs() < 1e-9);
        assert!((var.mean - mean).abs() < 1e-12);
    }
}
