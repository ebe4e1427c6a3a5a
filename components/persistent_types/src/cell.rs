//! Attribute-bearing cells.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::PersistentValue;

/// Explicit class tag carried by a cell.
///
/// Kinds the algebra has no native variant for are carried by a tagged cell,
/// never inferred from the shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellClass {
    /// Ordinary object
    Object,
    /// Date; attribute `time` holds milliseconds as a double
    Date,
    /// Arbitrary precision integer; attribute `digits` holds the decimal text
    BigInt,
    /// Reference-preserving placeholder for a host function
    Function,
    /// Native resource; attribute `handle` holds the side-table handle
    External,
}

/// A cell: an ordered attribute map plus a mutability flag.
///
/// A mutable cell is a facade whose current content handle changes over time
/// under copy-on-write. Each [`with_attribute`](Self::with_attribute) call
/// produces a new cell sharing every unchanged attribute with the old one.
#[derive(Debug, Clone)]
pub struct PersistentCell {
    class: CellClass,
    attributes: Arc<BTreeMap<Arc<str>, PersistentValue>>,
    mutable: bool,
}

impl PersistentCell {
    /// Creates a cell.
    pub fn new<K>(
        class: CellClass,
        attributes: impl IntoIterator<Item = (K, PersistentValue)>,
        mutable: bool,
    ) -> Self
    where
        K: Into<Arc<str>>,
    {
        PersistentCell {
            class,
            attributes: Arc::new(
                attributes
                    .into_iter()
                    .map(|(k, v)| (k.into(), v))
                    .collect(),
            ),
            mutable,
        }
    }

    /// Returns the class tag.
    pub fn class(&self) -> CellClass {
        self.class
    }

    /// Returns whether the cell accepts attribute writes through the bridge.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Returns the attributes in the engine's order (sorted by key).
    pub fn attributes(&self) -> &BTreeMap<Arc<str>, PersistentValue> {
        &self.attributes
    }

    /// Reads one attribute.
    pub fn get(&self, key: &str) -> Option<&PersistentValue> {
        self.attributes.get(key)
    }

    /// Returns a copy of this cell with `key` set to `value`.
    pub fn with_attribute(&self, key: impl Into<Arc<str>>, value: PersistentValue) -> Self {
        let mut attributes = Arc::clone(&self.attributes);
        Arc::make_mut(&mut attributes).insert(key.into(), value);
        PersistentCell {
            class: self.class,
            attributes,
            mutable: self.mutable,
        }
    }

    /// Returns whether both cells share the same attribute storage.
    pub fn shares_attributes_with(&self, other: &PersistentCell) -> bool {
        Arc::ptr_eq(&self.attributes, &other.attributes)
    }
}
