use std::sync::Arc;

use crate::error::TypeError;
use crate::shared_table::SharedSymbolTable;
use crate::symbol_token::{ImportLocation, SymbolToken};
use crate::system_symbols::{self, SYSTEM_MAX_ID};

/// One declared import of a local symbol table.
///
/// The import always occupies `max_id` SIDs, whatever the catalog had.
/// `table` is `None` when the catalog did not know the name; every slot
/// then resolves to unknown text tagged with this import's location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportedTable {
    name: String,
    version: u32,
    max_id: usize,
    table: Option<Arc<SharedSymbolTable>>,
}

impl ImportedTable {
    pub fn new(
        name: impl Into<String>,
        version: u32,
        max_id: usize,
        table: Option<Arc<SharedSymbolTable>>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            max_id,
            table,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn max_id(&self) -> usize {
        self.max_id
    }

    /// Whether the catalog supplied a table for this import.
    #[must_use]
    pub fn is_substitute(&self) -> bool {
        self.table.is_none()
    }

    /// First 1-based slot within `max_id` whose text is `text`.
    fn slot_of(&self, text: &str) -> Option<usize> {
        let table = self.table.as_ref()?;
        table
            .symbols()
            .iter()
            .take(self.max_id)
            .position(|symbol| symbol.as_deref() == Some(text))
            .map(|index| index + 1)
    }

    /// Resolve a 1-based slot inside this import.
    fn resolve(&self, local_sid: usize, sid: usize) -> SymbolToken {
        match self.table.as_ref().and_then(|t| t.text(local_sid)) {
            Some(text) => SymbolToken::known(text, sid),
            None => SymbolToken::imported_unknown(sid, ImportLocation::new(&*self.name, local_sid)),
        }
    }
}

/// The system table followed by the imports of a local table, in
/// declaration order. Shared between a table and the tables appended to it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportList {
    imports: Vec<ImportedTable>,
}

impl ImportList {
    #[must_use]
    pub fn new(imports: Vec<ImportedTable>) -> Self {
        Self { imports }
    }

    #[must_use]
    pub fn imports(&self) -> &[ImportedTable] {
        &self.imports
    }

    /// Largest SID covered by the system table and all imports, saturating
    /// at `usize::MAX`.
    #[must_use]
    pub fn max_id(&self) -> usize {
        self.imports
            .iter()
            .fold(SYSTEM_MAX_ID, |total, import| total.saturating_add(import.max_id))
    }

    /// Resolve a SID in `1..=max_id()`; `None` above that.
    fn resolve(&self, sid: usize) -> Option<SymbolToken> {
        if let Some(text) = system_symbols::text(sid) {
            return Some(SymbolToken::known(text, sid));
        }
        let mut base = SYSTEM_MAX_ID;
        for import in &self.imports {
            if sid - base <= import.max_id {
                return Some(import.resolve(sid - base, sid));
            }
            base = base.saturating_add(import.max_id);
        }
        None
    }
}

/// A local symbol table snapshot.
///
/// Never mutated after construction. Appending builds a new snapshot that
/// shares the import list and carries a fresh local symbol list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSymbolTable {
    imports: Arc<ImportList>,
    symbols: Arc<[Option<String>]>,
    appended: bool,
}

impl LocalSymbolTable {
    #[must_use]
    pub fn imports(&self) -> &Arc<ImportList> {
        &self.imports
    }

    #[must_use]
    pub fn symbols(&self) -> &[Option<String>] {
        &self.symbols
    }

    /// Whether this snapshot extended a previous local table.
    #[must_use]
    pub fn is_appended(&self) -> bool {
        self.appended
    }
}

/// The symbol table in effect at some point of a stream.
///
/// Cloning is cheap; a snapshot handed out earlier stays valid after the
/// stream installs a new table.
///
/// SIDs are assigned by concatenation:
///
/// ```text
/// 1 ..= 9                system symbols
/// 10 ..= 9+m1            first import (m1 = its declared max_id)
/// ...                    further imports
/// imports_max+1 ..       local symbols, in declaration order
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SymbolTable {
    #[default]
    System,
    Local(Arc<LocalSymbolTable>),
}

impl SymbolTable {
    /// A table that replaces whatever came before.
    #[must_use]
    pub fn local(imports: Arc<ImportList>, symbols: Vec<Option<String>>) -> Self {
        Self::Local(Arc::new(LocalSymbolTable {
            imports,
            symbols: symbols.into(),
            appended: false,
        }))
    }

    /// A new snapshot extending this one's local symbols.
    ///
    /// Appending to the system table is the same as declaring a local
    /// table without imports.
    #[must_use]
    pub fn append(&self, symbols: Vec<Option<String>>) -> Self {
        match self {
            Self::System => Self::Local(Arc::new(LocalSymbolTable {
                imports: Arc::new(ImportList::default()),
                symbols: symbols.into(),
                appended: true,
            })),
            Self::Local(local) => {
                let combined: Vec<Option<String>> =
                    local.symbols.iter().cloned().chain(symbols).collect();
                Self::Local(Arc::new(LocalSymbolTable {
                    imports: Arc::clone(&local.imports),
                    symbols: combined.into(),
                    appended: true,
                }))
            }
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }

    #[must_use]
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Local(local) if local.appended)
    }

    /// The import list; empty for the system table.
    #[must_use]
    pub fn imports(&self) -> Arc<ImportList> {
        match self {
            Self::System => Arc::new(ImportList::default()),
            Self::Local(local) => Arc::clone(&local.imports),
        }
    }

    #[must_use]
    pub fn local_symbols(&self) -> &[Option<String>] {
        match self {
            Self::System => &[],
            Self::Local(local) => &local.symbols,
        }
    }

    /// Number of symbols declared locally (including slots without text).
    #[must_use]
    pub fn declared_symbol_count(&self) -> usize {
        self.local_symbols().len()
    }

    #[must_use]
    pub fn max_id(&self) -> usize {
        match self {
            Self::System => SYSTEM_MAX_ID,
            Self::Local(local) => local.imports.max_id().saturating_add(local.symbols.len()),
        }
    }

    /// Resolve a SID to a token.
    ///
    /// # Errors
    ///
    /// [`TypeError::UnknownSymbol`] when `sid` exceeds [`max_id`](Self::max_id).
    pub fn resolve(&self, sid: usize) -> Result<SymbolToken, TypeError> {
        if sid == 0 {
            return Ok(SymbolToken::unknown());
        }
        let out_of_range = || TypeError::UnknownSymbol {
            sid,
            max_id: self.max_id(),
        };
        match self {
            Self::System => system_symbols::text(sid)
                .map(|text| SymbolToken::known(text, sid))
                .ok_or_else(out_of_range),
            Self::Local(local) => {
                let imports_max = local.imports.max_id();
                if sid <= imports_max {
                    return local.imports.resolve(sid).ok_or_else(out_of_range);
                }
                match local.symbols.get(sid - imports_max - 1) {
                    Some(Some(text)) => Ok(SymbolToken::known(text.as_str(), sid)),
                    Some(None) => Ok(SymbolToken::unknown()),
                    None => Err(out_of_range()),
                }
            }
        }
    }

    /// Resolve and require text.
    ///
    /// # Errors
    ///
    /// [`TypeError::UnknownSymbol`] when out of range. Known-range SIDs
    /// without text yield `Ok(None)`.
    pub fn text(&self, sid: usize) -> Result<Option<String>, TypeError> {
        self.resolve(sid).map(|token| token.text)
    }

    /// Lowest SID whose text equals `text`, searching in SID order.
    ///
    /// Only slots that carry text are visited, so a large declared import
    /// `max_id` costs nothing.
    #[must_use]
    pub fn sid_for_text(&self, text: &str) -> Option<usize> {
        if let Some(sid) = system_symbols::sid(text) {
            return Some(sid);
        }
        let Self::Local(local) = self else {
            return None;
        };
        let mut base = SYSTEM_MAX_ID;
        for import in local.imports.imports() {
            if let Some(slot) = import.slot_of(text) {
                return base.checked_add(slot);
            }
            base = base.saturating_add(import.max_id);
        }
        local
            .symbols
            .iter()
            .position(|symbol| symbol.as_deref() == Some(text))
            .and_then(|index| base.checked_add(index + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo_import(max_id: usize, texts: &[&str]) -> ImportedTable {
        let table = SharedSymbolTable::from_texts("foo", 1, texts.iter().copied());
        ImportedTable::new("foo", 1, max_id, Some(Arc::new(table)))
    }

    fn local(imports: Vec<ImportedTable>, symbols: &[&str]) -> SymbolTable {
        SymbolTable::local(
            Arc::new(ImportList::new(imports)),
            symbols.iter().map(|s| Some((*s).to_owned())).collect(),
        )
    }

    #[test]
    fn system_table() {
        let table = SymbolTable::System;
        assert_eq!(table.max_id(), 9);
        assert_eq!(table.resolve(4).unwrap().text(), Some("name"));
        assert_eq!(table.resolve(0).unwrap(), SymbolToken::unknown());
        assert!(matches!(
            table.resolve(10).unwrap_err(),
            TypeError::UnknownSymbol { sid: 10, max_id: 9 }
        ));
    }

    #[test]
    fn import_tail_beyond_catalog_table() {
        // foo declares max_id 4; the catalog knows two symbols.
        let table = local(vec![foo_import(4, &["a", "b"])], &[]);
        assert_eq!(table.max_id(), 13);
        assert_eq!(table.resolve(10).unwrap().text(), Some("a"));
        assert_eq!(table.resolve(11).unwrap().text(), Some("b"));

        let third = table.resolve(12).unwrap();
        assert_eq!(third.text, None);
        assert_eq!(third.sid, 12);
        assert_eq!(third.import_location, Some(ImportLocation::new("foo", 3)));

        let fourth = table.resolve(13).unwrap();
        assert_eq!(fourth.import_location, Some(ImportLocation::new("foo", 4)));
    }

    #[test]
    fn catalog_table_truncated_to_max_id() {
        let table = local(vec![foo_import(1, &["a", "b", "c"])], &["local"]);
        assert_eq!(table.max_id(), 11);
        assert_eq!(table.resolve(10).unwrap().text(), Some("a"));
        // The next SID is already local.
        assert_eq!(table.resolve(11).unwrap().text(), Some("local"));
    }

    #[test]
    fn substitute_import() {
        let import = ImportedTable::new("missing", 2, 3, None);
        assert!(import.is_substitute());
        let table = local(vec![import], &["x"]);
        let token = table.resolve(11).unwrap();
        assert_eq!(token.import_location, Some(ImportLocation::new("missing", 2)));
        assert_eq!(table.resolve(13).unwrap().text(), Some("x"));
    }

    #[test]
    fn imports_concatenate_in_order() {
        let bar = ImportedTable::new(
            "bar",
            1,
            2,
            Some(Arc::new(SharedSymbolTable::from_texts("bar", 1, ["p", "q"]))),
        );
        let table = local(vec![foo_import(2, &["a", "b"]), bar], &["z"]);
        let texts: Vec<_> = (10..=14)
            .map(|sid| table.resolve(sid).unwrap().text)
            .collect();
        assert_eq!(
            texts,
            ["a", "b", "p", "q", "z"].map(|s| Some(s.to_owned())).to_vec()
        );
    }

    #[test]
    fn local_slot_without_text_is_sid_zero() {
        let table = SymbolTable::local(Arc::new(ImportList::default()), vec![None, Some("b".into())]);
        assert_eq!(table.resolve(10).unwrap(), SymbolToken::unknown());
        assert_eq!(table.resolve(11).unwrap().text(), Some("b"));
    }

    #[test]
    fn append_shares_imports_and_keeps_old_snapshot() {
        let first = local(vec![foo_import(2, &["a", "b"])], &["A"]);
        let second = first.append(vec![Some("B".into())]);

        assert!(second.is_appended());
        assert_eq!(second.declared_symbol_count(), 2);
        assert_eq!(second.resolve(13).unwrap().text(), Some("B"));
        assert!(Arc::ptr_eq(&first.imports(), &second.imports()));

        // The earlier snapshot is untouched.
        assert_eq!(first.max_id(), 12);
        assert!(first.resolve(13).is_err());
    }

    #[test]
    fn huge_import_max_ids_saturate() {
        let table = local(
            vec![foo_import(usize::MAX / 2 + 1, &["a"]), foo_import(usize::MAX / 2 + 1, &["b"])],
            &["z"],
        );
        assert_eq!(table.max_id(), usize::MAX);
        assert_eq!(table.resolve(10).unwrap().text(), Some("a"));
        let tail = table.resolve(usize::MAX).unwrap();
        assert_eq!(tail.text, None);
        assert_eq!(tail.import_location.map(|l| l.table_name), Some("foo".to_owned()));
        assert_eq!(table.sid_for_text("a"), Some(10));
        assert_eq!(table.sid_for_text("b"), Some(SYSTEM_MAX_ID + usize::MAX / 2 + 2));
        assert_eq!(table.sid_for_text("z"), None);
    }

    #[test]
    fn append_to_system() {
        let table = SymbolTable::System.append(vec![Some("A".into())]);
        assert_eq!(table.max_id(), 10);
        assert_eq!(table.sid_for_text("A"), Some(10));
        assert_eq!(table.sid_for_text("symbols"), Some(7));
    }
}
