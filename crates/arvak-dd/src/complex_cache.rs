//! Complex-number interning cache.
//!
//! Decision-diagram edge weights are compared up to a numerical tolerance
//! `eps` rather than bit-for-bit, so two weights computed along different
//! paths but representing "the same" complex number must collapse to a
//! single canonical value before they can be used as unique-table or
//! compute-cache keys. This cache buckets every interned weight onto a grid
//! of size `eps` and returns the first value that landed in a bucket as the
//! canonical representative for every later lookup that falls in the same
//! bucket.
//!
//! This trades the reference implementation's pointer-identity weight table
//! (a `std::complex` arena with its own unique table) for value identity on
//! `f64` bit patterns, which is sufficient here because `Complex64` is
//! `Copy` and every consumer compares by value rather than by address.
//! Values that straddle a bucket boundary can still intern to distinct
//! buckets; this is a known limitation of grid quantization, not a
//! correctness requirement the spec relaxes elsewhere.

use num_complex::Complex64;
use rustc_hash::FxHashMap;

/// Quantized grid coordinates used as both the cache key and, after
/// `multiply`-ing back by `eps`, a stable hash key for the unique/compute
/// tables (see `package::GridKey`).
pub type Bucket = (i64, i64);

/// Interns complex numbers onto an `eps`-sized grid.
#[derive(Debug, Clone)]
pub struct ComplexCache {
    eps: f64,
    table: FxHashMap<Bucket, Complex64>,
}

impl ComplexCache {
    /// Create a new cache with the given numerical tolerance.
    pub fn new(eps: f64) -> Self {
        assert!(eps > 0.0, "eps must be positive");
        Self {
            eps,
            table: FxHashMap::default(),
        }
    }

    /// The tolerance this cache was constructed with.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Intern `value`, returning the canonical representative for its
    /// `eps`-bucket (registering `value` itself if this is the first hit).
    pub fn intern(&mut self, value: Complex64) -> Complex64 {
        let bucket = Self::bucket_of(value, self.eps);
        *self.table.entry(bucket).or_insert(value)
    }

    /// Grid bucket a value falls into at the given tolerance, exposed so the
    /// package can derive unique-table/compute-cache keys without a second
    /// lookup.
    pub fn bucket_of(value: Complex64, eps: f64) -> Bucket {
        (
            (value.re / eps).round() as i64,
            (value.im / eps).round() as i64,
        )
    }

    /// Number of distinct values currently interned.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the cache holds no values.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop every interned value whose magnitude does not appear in `keep`.
    /// Used by `Package::garbage_collect` to shrink the cache alongside the
    /// unique table.
    pub fn retain(&mut self, mut keep: impl FnMut(Complex64) -> bool) {
        self.table.retain(|_, v| keep(*v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_same_bucket_shares_value() {
        let mut cache = ComplexCache::new(1e-9);
        let a = cache.intern(Complex64::new(1.0, 0.0));
        let b = cache.intern(Complex64::new(1.0 + 1e-12, 0.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_intern_distinct_values_distinct_buckets() {
        let mut cache = ComplexCache::new(1e-9);
        let a = cache.intern(Complex64::new(1.0, 0.0));
        let b = cache.intern(Complex64::new(-1.0, 0.0));
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }
}
