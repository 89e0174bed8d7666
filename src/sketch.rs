use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::centroid::Centroid;
use crate::error::Error;
use crate::merge::merge_centroid_pool;
use crate::serde;

/// Number of centroids a sketch holds when none is specified.
pub const DEFAULT_CAPACITY: usize = 64;
/// Hard ceiling on the number of centroids a sketch may be created with.
pub const MAX_CAPACITY: usize = 2048;

/// A bounded-memory streaming histogram sketch.
///
/// The sketch holds at most `capacity` centroids sorted by increasing value.
/// Inserting a value either folds it into the centroid with the exact same
/// value or adds it as a singleton and then merges the two centroids whose
/// values are closest together, so the size bound always holds after an
/// insert. Quantile and rank queries interpolate between the two centroids
/// bordering the queried point, using the true observed minimum and maximum
/// as zero-count sentinels at the tails.
///
/// All operations are synchronous and single-threaded; a caller sharing one
/// sketch across threads must serialize mutation externally.
#[derive(Clone, Debug)]
pub struct HistoSketch {
    // Sorted by increasing value, no duplicate values.
    centroids: Vec<Centroid>,
    // Total number of values observed by the sketch.
    total_count: u64,
    // Smallest raw value ever observed, independent of later merges.
    min: f64,
    // Largest raw value ever observed.
    max: f64,
    // Maximum number of centroids retained after a reduction.
    capacity: usize,
    // Tie-break source for the nearest-pair scan.
    rng: SmallRng,
}

impl HistoSketch {
    /// Create an empty sketch holding at most `capacity` centroids.
    ///
    /// Fails with `InvalidArgument` if `capacity` is outside `[1, 2048]`.
    pub fn new(capacity: usize) -> Result<HistoSketch, Error> {
        check_capacity(capacity)?;
        Ok(HistoSketch {
            centroids: Vec::with_capacity(capacity + 1),
            total_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            capacity,
            rng: SmallRng::from_os_rng(),
        })
    }

    /// Create an empty sketch with a seeded tie-break generator, so that
    /// reductions over equally-spaced centroids are reproducible.
    pub fn with_seed(capacity: usize, seed: u64) -> Result<HistoSketch, Error> {
        let mut sketch = HistoSketch::new(capacity)?;
        sketch.rng = SmallRng::seed_from_u64(seed);
        Ok(sketch)
    }

    /// Reconstruct a sketch verbatim from a persisted snapshot. No centroid
    /// is recomputed; the caller-supplied bookkeeping is taken as-is.
    ///
    /// Fails with `InvalidArgument` if the capacity is out of range, the
    /// centroids overflow it, are not strictly increasing by value, or carry
    /// a zero count.
    pub fn restore(
        capacity: usize,
        centroids: Vec<Centroid>,
        total_count: u64,
        min: f64,
        max: f64,
    ) -> Result<HistoSketch, Error> {
        check_capacity(capacity)?;
        if centroids.len() > capacity {
            return Err(Error::InvalidArgument("more centroids than capacity"));
        }
        if centroids.iter().any(|c| c.count == 0) {
            return Err(Error::InvalidArgument("centroid count must be positive"));
        }
        if centroids.windows(2).any(|w| !(w[0].value < w[1].value)) {
            return Err(Error::InvalidArgument(
                "centroids must be strictly increasing by value",
            ));
        }
        Ok(HistoSketch {
            centroids,
            total_count,
            min,
            max,
            capacity,
            rng: SmallRng::from_os_rng(),
        })
    }

    /// Insert a single observation.
    pub fn insert(&mut self, value: f64) {
        self.insert_with_count(value, 1);
    }

    /// Insert `count` observations of `value`.
    ///
    /// NaN values are ignored. A zero count still updates the observed
    /// extremes but merges no mass.
    pub fn insert_with_count(&mut self, value: f64, count: u64) {
        if value.is_nan() {
            return;
        }
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
        if count == 0 {
            return;
        }
        self.total_count += count;

        match self
            .centroids
            .binary_search_by(|c| c.value.total_cmp(&value))
        {
            Ok(i) => {
                // Folding into an exact match keeps the value unchanged, so
                // no reduction is needed.
                self.centroids[i].count += count;
            }
            Err(i) => {
                self.centroids.insert(i, Centroid::new(value, count));
                if self.centroids.len() > self.capacity {
                    self.reduce();
                }
            }
        }
    }

    // Merge the two adjacent centroids whose values are closest together.
    // Ties are broken uniformly at random among tied pairs so that
    // equally-spaced streams do not always collapse at a fixed position.
    fn reduce(&mut self) {
        let mut best = 0;
        let mut best_gap = f64::INFINITY;
        let mut ties = 0u32;
        for i in 0..self.centroids.len() - 1 {
            let gap = self.centroids[i + 1].value - self.centroids[i].value;
            if gap < best_gap {
                best = i;
                best_gap = gap;
                ties = 1;
            } else if gap == best_gap {
                ties += 1;
                if self.rng.random_range(0..ties) == 0 {
                    best = i;
                }
            }
        }
        let removed = self.centroids.remove(best + 1);
        self.centroids[best].fold(removed.value, removed.count);
    }

    // The two centroids bracketing gap `i`, where `i` ranges over
    // `[0, len]`: the gap before the first centroid, between two centroids,
    // or after the last. The ends are bracketed by zero-count sentinels at
    // the true observed extremes, which keeps estimates near the tails
    // anchored to real values rather than already-merged centroids.
    fn borders(&self, i: usize) -> (Centroid, Centroid) {
        if i == 0 {
            (Centroid::new(self.min, 0), self.centroids[0])
        } else if i == self.centroids.len() {
            (self.centroids[i - 1], Centroid::new(self.max, 0))
        } else {
            (self.centroids[i - 1], self.centroids[i])
        }
    }

    /// Estimate the smallest value `v` such that a `q` fraction of the
    /// observed values are less than or equal to `v`.
    ///
    /// Fails with `InvalidArgument` if `q` is outside `[0.0, 1.0]` and with
    /// `EmptySketch` if nothing has been observed.
    pub fn quantile(&self, q: f64) -> Result<f64, Error> {
        if !(0.0..=1.0).contains(&q) {
            return Err(Error::InvalidArgument("quantile must be in [0.0, 1.0]"));
        }
        if self.total_count == 0 {
            return Err(Error::EmptySketch);
        }

        // Walk the centroids accumulating half a count on either side of
        // each one (the trapezoid model), stopping at the gap holding the
        // target mass.
        let t = q * self.total_count as f64;
        let mut i = 0;
        let mut s = 0.0;
        let mut prev_half = 0.0;
        while i < self.centroids.len() {
            let half = self.centroids[i].count as f64 / 2.0;
            if s + half + prev_half > t {
                break;
            }
            s += half + prev_half;
            prev_half = half;
            i += 1;
        }

        let (left, right) = self.borders(i);

        // Solve for u such that
        // t - s = (left.count + mu) / 2 * (u - left.value) / (right.value - left.value),
        // where mu is the count interpolated at u. This is Algorithm 4 of
        // the Ben-Haim/Tom-Tov paper; the quadratic degenerates to a linear
        // solve when the border counts are equal.
        let d = t - s;
        let a = right.count as f64 - left.count as f64;
        if a == 0.0 {
            if left.count == 0 {
                return Ok(left.value);
            }
            return Ok(left.value + (right.value - left.value) * (d / left.count as f64));
        }
        let b = 2.0 * left.count as f64;
        let c = -2.0 * d;
        let z = (-b + (b * b - 4.0 * a * c).sqrt()) / (2.0 * a);
        Ok(left.value + (right.value - left.value) * z)
    }

    /// Estimate the number of observed values less than or equal to `v`.
    /// This is the "Sum" procedure of the Ben-Haim/Tom-Tov paper.
    ///
    /// Fails with `EmptySketch` if nothing has been observed.
    pub fn rank(&self, v: f64) -> Result<u64, Error> {
        if self.total_count == 0 {
            return Err(Error::EmptySketch);
        }
        if v >= self.max {
            return Ok(self.total_count);
        }
        if v < self.min {
            return Ok(0);
        }

        // Index of the gap just right of the rightmost centroid with
        // value <= v.
        let i = self.centroids.partition_point(|c| c.value <= v);
        let (left, right) = self.borders(i);

        let s: f64 = self.centroids[..i.saturating_sub(1)]
            .iter()
            .map(|c| c.count as f64)
            .sum();
        let x = (v - left.value) / (right.value - left.value);
        let b = left.count as f64 + (right.count as f64 - left.count as f64) * x;
        let est = s + left.count as f64 / 2.0 + (left.count as f64 + b) * x / 2.0;
        Ok(est.round() as u64)
    }

    /// Replay every centroid of `other` through this sketch, in ascending
    /// order. Equivalent to having inserted `other`'s observations directly,
    /// up to the approximation already baked into `other`.
    pub fn merge_with(&mut self, other: &HistoSketch) {
        for c in other.centroids() {
            self.insert_with_count(c.value, c.count);
        }
    }

    /// Merge the centroids of `sources` into a new sketch of at most
    /// `capacity` centroids, minimizing the total count-weighted
    /// within-group variance of the reduction (rather than the greedy
    /// nearest-pair heuristic used during streaming inserts).
    ///
    /// The result's extremes are the extreme centroid values; the original
    /// stream extremes are not preserved across this path. An empty
    /// `sources` slice yields an empty sketch.
    ///
    /// Fails with `InvalidArgument` if `capacity` is outside `[1, 2048]`.
    pub fn merge_optimal(
        sources: &[HistoSketch],
        capacity: usize,
    ) -> Result<HistoSketch, Error> {
        check_capacity(capacity)?;
        let pool: Vec<Centroid> = sources
            .iter()
            .flat_map(|s| s.centroids().iter().copied())
            .collect();
        let centroids = merge_centroid_pool(pool, capacity);

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut total_count = 0;
        for c in &centroids {
            if c.value < min {
                min = c.value;
            }
            if c.value > max {
                max = c.value;
            }
            total_count += c.count;
        }
        Ok(HistoSketch {
            centroids,
            total_count,
            min,
            max,
            capacity,
            rng: SmallRng::from_os_rng(),
        })
    }

    /// Build a sketch with a different capacity by replaying this sketch's
    /// centroids through the insertion engine. Shrinking the capacity merges
    /// some centroids.
    pub fn resize(&self, capacity: usize) -> Result<HistoSketch, Error> {
        let mut resized = HistoSketch::new(capacity)?;
        resized.merge_with(self);
        Ok(resized)
    }

    /// Total number of values observed by the sketch.
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Current number of centroids held by the sketch.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }

    /// Maximum number of centroids the sketch retains after a reduction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The centroids in ascending value order, for serialization by the host.
    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    /// Smallest raw value ever observed, or `EmptySketch` before any insert.
    pub fn min(&self) -> Result<f64, Error> {
        if self.total_count == 0 {
            return Err(Error::EmptySketch);
        }
        Ok(self.min)
    }

    /// Largest raw value ever observed, or `EmptySketch` before any insert.
    pub fn max(&self) -> Result<f64, Error> {
        if self.total_count == 0 {
            return Err(Error::EmptySketch);
        }
        Ok(self.max)
    }

    /// Drop all observed state, keeping the capacity and tie-break source.
    pub fn clear(&mut self) {
        self.centroids.clear();
        self.total_count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    /// Encode the sketch into the snapshot byte format: an encoding-version
    /// byte, then capacity, centroid length and total count as varints, each
    /// centroid as a little-endian double and a varint count, then the raw
    /// minimum and maximum as little-endian doubles.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 3 * 9 + self.centroids.len() * 17 + 16);
        out.push(serde::ENCODING_VERSION);
        serde::encode_var_u64(&mut out, self.capacity as u64);
        serde::encode_var_u64(&mut out, self.centroids.len() as u64);
        serde::encode_var_u64(&mut out, self.total_count);
        for c in &self.centroids {
            serde::encode_f64_le(&mut out, c.value);
            serde::encode_var_u64(&mut out, c.count);
        }
        serde::encode_f64_le(&mut out, self.min);
        serde::encode_f64_le(&mut out, self.max);
        out
    }

    /// Decode a snapshot produced by [`HistoSketch::encode`].
    ///
    /// Fails with `IoError` on truncated input and `InvalidArgument` on an
    /// unknown encoding version or a snapshot violating the sketch
    /// invariants.
    pub fn decode(bytes: &[u8]) -> Result<HistoSketch, Error> {
        let mut input = serde::Input::new(bytes);
        let version = input.read_byte()?;
        if version > serde::ENCODING_VERSION {
            return Err(Error::InvalidArgument("unknown encoding version"));
        }
        let capacity = serde::decode_var_u64(&mut input)? as usize;
        let num_centroids = serde::decode_var_u64(&mut input)? as usize;
        let total_count = serde::decode_var_u64(&mut input)?;
        if num_centroids > MAX_CAPACITY {
            return Err(Error::InvalidArgument("more centroids than capacity"));
        }
        let mut centroids = Vec::with_capacity(num_centroids);
        for _ in 0..num_centroids {
            let value = input.read_f64_le()?;
            let count = serde::decode_var_u64(&mut input)?;
            centroids.push(Centroid::new(value, count));
        }
        let min = input.read_f64_le()?;
        let max = input.read_f64_le()?;
        HistoSketch::restore(capacity, centroids, total_count, min, max)
    }
}

impl Default for HistoSketch {
    /// An empty sketch with [`DEFAULT_CAPACITY`] centroids.
    fn default() -> HistoSketch {
        HistoSketch {
            centroids: Vec::with_capacity(DEFAULT_CAPACITY + 1),
            total_count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            capacity: DEFAULT_CAPACITY,
            rng: SmallRng::from_os_rng(),
        }
    }
}

fn check_capacity(capacity: usize) -> Result<(), Error> {
    if capacity < 1 || capacity > MAX_CAPACITY {
        return Err(Error::InvalidArgument(
            "capacity must be in the range [1, 2048]",
        ));
    }
    Ok(())
}
