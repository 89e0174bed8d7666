/*!
This crate provides a Rust implementation of the histogram sketch described in
Ben-Haim and Tom-Tov's ["A Streaming Parallel Decision Tree Algorithm"](http://www.jmlr.org/papers/volume11/ben-haim10a/ben-haim10a.pdf)
(Journal of Machine Learning Research 11).

The sketch keeps a bounded number of `(value, count)` centroids sorted by
increasing value. Each inserted value is either folded into an existing
centroid with the same value or added as a singleton, after which the two
closest centroids are merged. Quantiles and ranks are estimated from the
trapezoid spanned by the two centroids bordering the queried point.

# Usage
Insert samples and query any quantile in *0.0* to *1.0*, or the estimated
number of samples at or below a value:

```rust
    use self::histk::HistoSketch;
    let mut h = HistoSketch::new(64).unwrap();
    h.insert(1.0);
    h.insert(2.0);
    h.insert(3.0);
    assert_eq!(3, h.total_count());
    let q = h.quantile(0.5).unwrap();
    assert!((q - 2.0).abs() < 1e-9);
    assert_eq!(3, h.rank(3.0).unwrap());
```

Sketches built independently can be merged, either by replaying one into
another or by the variance-minimizing optimal merge:

```rust
    use self::histk::HistoSketch;
    let mut h1 = HistoSketch::new(64).unwrap();
    h1.insert_with_count(1.0, 2);
    let mut h2 = HistoSketch::new(64).unwrap();
    h2.insert_with_count(5.0, 3);
    h1.merge_with(&h2);
    assert_eq!(5, h1.total_count());

    let merged = HistoSketch::merge_optimal(&[h1, h2], 64).unwrap();
    assert_eq!(8, merged.total_count());
```

 */

mod centroid;
mod merge;
mod serde;

pub mod error;
pub mod sketch;

pub use self::centroid::Centroid;
pub use self::error::Error;
pub use self::sketch::HistoSketch;
