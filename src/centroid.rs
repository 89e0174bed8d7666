/// A coalesced `(value, count)` summary point standing in for one or more
/// original observations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Centroid {
    /// Count-weighted mean of the observations folded into this centroid.
    pub value: f64,
    /// Number of observations folded into this centroid.
    pub count: u64,
}

impl Centroid {
    pub fn new(value: f64, count: u64) -> Centroid {
        Centroid { value, count }
    }

    /// Fold another centroid into this one: the value becomes the
    /// count-weighted mean of the two, the count their sum.
    pub(crate) fn fold(&mut self, value: f64, count: u64) {
        let total = self.count + count;
        self.value =
            (self.value * self.count as f64 + value * count as f64) / total as f64;
        self.count = total;
    }
}
