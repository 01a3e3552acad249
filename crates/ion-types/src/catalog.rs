use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::shared_table::SharedSymbolTable;

/// Source of shared symbol tables for resolving imports.
///
/// The decoder only ever reads from a catalog. Implementations can be
/// in-memory, file-backed, or networked; all methods take `&self`, so
/// implementations that change over time need interior mutability.
///
/// ```text
/// imports: [{name: "foo", version: 2, max_id: 40}]
///        │
///        ▼
///   catalog.lookup("foo", 2) ──▶ Some(table) ──▶ slots 1..=40 from table
///                             └─▶ None        ──▶ 40 slots of unknown text
/// ```
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one catalog can back readers
/// on many threads.
pub trait Catalog: Send + Sync {
    /// Find the table with this name, preferring the exact version.
    ///
    /// Returning a different version is allowed; the resolver then only
    /// trusts the declared `max_id`.
    fn lookup(&self, name: &str, version: u32) -> Option<Arc<SharedSymbolTable>>;
}

/// In-memory catalog keyed by name and version.
///
/// Uses [`RwLock`] so tables can be registered through `&self` while
/// readers hold the catalog behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use ion_types::{Catalog, MemoryCatalog, SharedSymbolTable};
///
/// let catalog = MemoryCatalog::new();
/// catalog.insert(SharedSymbolTable::from_texts("foo", 1, ["a", "b"]));
/// assert_eq!(catalog.lookup("foo", 1).unwrap().max_id(), 2);
/// assert!(catalog.lookup("bar", 1).is_none());
/// ```
#[derive(Default)]
pub struct MemoryCatalog {
    tables: RwLock<BTreeMap<(String, u32), Arc<SharedSymbolTable>>>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any table with the same name and version.
    pub fn insert(&self, table: SharedSymbolTable) {
        let key = (table.name().to_owned(), table.version());
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::new(table));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Catalog for MemoryCatalog {
    /// Exact match first, otherwise the highest registered version.
    fn lookup(&self, name: &str, version: u32) -> Option<Arc<SharedSymbolTable>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = tables.get(&(name.to_owned(), version)) {
            return Some(Arc::clone(table));
        }
        tables
            .range((name.to_owned(), 0)..=(name.to_owned(), u32::MAX))
            .next_back()
            .map(|(_, table)| Arc::clone(table))
    }
}
