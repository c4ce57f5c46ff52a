//! `PropertySet` for pass communication.
//!
//! This module provides the [`PropertySet`] type, which enables compilation
//! passes to share data with each other by storing and retrieving arbitrary
//! typed values. It is the side-channel through which preprocessing passes
//! (see `arvak-eqcheck::preprocess`) read and write per-circuit metadata
//! such as ancillary/garbage masks without threading extra parameters
//! through every [`Pass::run`](crate::pass::Pass::run) call.
//!
//! # Examples
//!
//! ```
//! use arvak_compile::PropertySet;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct OptimizationStats {
//!     gates_removed: usize,
//!     depth_reduction: usize,
//! }
//!
//! let mut props = PropertySet::new();
//!
//! props.insert(OptimizationStats {
//!     gates_removed: 15,
//!     depth_reduction: 3,
//! });
//!
//! let stats = props.get::<OptimizationStats>().unwrap();
//! assert_eq!(stats.gates_removed, 15);
//! ```

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};

/// Properties shared between compilation passes.
///
/// Passes store and retrieve arbitrary data using the type-safe
/// [`insert`](Self::insert) and [`get`](Self::get) methods. Each type can
/// have at most one value stored at a time.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a custom property, replacing any existing value of the same type.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::items_after_statements)]
    fn test_property_set_custom() {
        let mut props = PropertySet::new();

        #[derive(Debug, PartialEq)]
        struct CustomData(i32);

        props.insert(CustomData(42));
        assert_eq!(props.get::<CustomData>(), Some(&CustomData(42)));

        let removed = props.remove::<CustomData>();
        assert_eq!(removed, Some(CustomData(42)));
        assert_eq!(props.get::<CustomData>(), None);
    }

    #[test]
    fn test_property_set_overwrite() {
        let mut props = PropertySet::new();
        props.insert(7_i32);
        props.insert(9_i32);
        assert_eq!(props.get::<i32>(), Some(&9));
    }
}
