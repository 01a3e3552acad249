//! Symbol table resolution.
//!
//! The resolver holds the stream's current symbol table and replaces it
//! as system values go by:
//!
//! ```text
//!   version marker ─────────────────────────▶ System
//!   $ion_symbol_table::{imports:[...], ...} ─▶ Local(system + imports + symbols)
//!   $ion_symbol_table::{imports:$ion_symbol_table, symbols:[...]}
//!                                           ─▶ Local(current + symbols)
//! ```
//!
//! Tables are immutable snapshots; a snapshot handed out earlier stays
//! valid after later appends.

use std::io::Read;
use std::sync::Arc;

use ion_types::system_symbols::{
    IMPORTS, ION_SYMBOL_TABLE, MAX_ID, NAME, SYMBOLS, SYSTEM_MAX_ID, SYSTEM_TABLE_NAME, VERSION,
};
use ion_types::{Catalog, ImportList, ImportedTable, IonType, SymbolTable, SymbolToken};
use ion_wire::TypeCode;
use ion_wire::varint::decode_uint;
use tracing::{debug, trace_span};

use crate::cursor::{BinaryCursor, CursorListener, Event, OversizedValue};
use crate::error::DecodeError;

/// Whether the cursor sits on a local symbol table declaration: a
/// non-null top-level struct whose first annotation is `$ion_symbol_table`.
pub fn is_symbol_table<R: Read, L: CursorListener>(cursor: &BinaryCursor<R, L>) -> bool {
    cursor.depth() == 0
        && cursor.ion_type() == Some(IonType::Struct)
        && !cursor.is_null()
        && cursor.annotation_sids().first() == Some(&ION_SYMBOL_TABLE)
}

/// Whether a skipped oversized value could have been a symbol table.
///
/// When the header was too large to parse the type is unknown; the
/// annotation alone decides then.
#[must_use]
pub fn might_be_symbol_table(value: &OversizedValue) -> bool {
    value.depth == 0
        && value
            .annotation_sids
            .as_ref()
            .is_some_and(|sids| sids.first() == Some(&ION_SYMBOL_TABLE))
        && matches!(value.ion_type, None | Some(IonType::Struct))
}

/// An `imports` entry as declared, before the catalog is consulted.
#[derive(Debug)]
struct ImportDecl {
    name: String,
    version: u32,
    max_id: Option<usize>,
}

enum Imports {
    Append,
    Reset(Vec<ImportDecl>),
}

/// Tracks the current symbol table of one stream.
///
/// The owner decides what counts as a system value and calls in:
///
/// | Seen in the stream                  | Call                                        |
/// |-------------------------------------|---------------------------------------------|
/// | version marker                      | [`reset`](Self::reset)                      |
/// | struct annotated `$ion_symbol_table` | [`read_symbol_table`](Self::read_symbol_table) |
/// | oversized table that was skipped    | [`invalidate`](Self::invalidate)            |
/// | symbol ID in a value                | [`resolve`](Self::resolve)                  |
///
/// Shared tables named by `imports` are looked up in the catalog once,
/// when the declaring table is read.
pub struct SymbolTableResolver {
    catalog: Arc<dyn Catalog>,
    current: SymbolTable,
    invalidated: bool,
}

impl std::fmt::Debug for SymbolTableResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTableResolver")
            .field("current", &self.current)
            .field("invalidated", &self.invalidated)
            .finish_non_exhaustive()
    }
}

impl SymbolTableResolver {
    /// A resolver starting from the system table.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            current: SymbolTable::System,
            invalidated: false,
        }
    }

    /// The table symbol IDs resolve against right now. Cloning it is
    /// cheap and the clone survives later changes.
    #[must_use]
    pub fn current(&self) -> &SymbolTable {
        &self.current
    }

    /// Back to the system table, as after a version marker.
    pub fn reset(&mut self) {
        self.current = SymbolTable::System;
        self.invalidated = false;
    }

    /// Mark local symbols as unknowable until the next reset.
    pub fn invalidate(&mut self) {
        debug!("symbol table invalidated");
        self.invalidated = true;
    }

    /// Whether local symbols are currently unknowable.
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    /// Resolve a SID against the current table.
    ///
    /// # Errors
    ///
    /// [`DecodeError::SymbolTableInvalidated`] for SIDs above the system
    /// range while invalidated; otherwise out-of-range SIDs fail with
    /// [`TypeError::UnknownSymbol`](ion_types::TypeError::UnknownSymbol).
    pub fn resolve(&self, sid: usize) -> Result<SymbolToken, DecodeError> {
        if self.invalidated && sid > SYSTEM_MAX_ID {
            return Err(DecodeError::SymbolTableInvalidated { sid });
        }
        Ok(self.current.resolve(sid)?)
    }

    /// Read the symbol table struct the cursor is positioned on and make
    /// it current. The value must already be filled; the cursor is left
    /// just past it.
    ///
    /// # Errors
    ///
    /// [`DecodeError::DuplicateSymbolTableField`],
    /// [`DecodeError::MissingImportMaxId`], [`DecodeError::SymbolIdOverflow`],
    /// [`DecodeError::InvalidUtf8`] and any cursor error.
    pub fn read_symbol_table<R: Read, L: CursorListener>(
        &mut self,
        cursor: &mut BinaryCursor<R, L>,
    ) -> Result<&SymbolTable, DecodeError> {
        let _span = trace_span!("symbol_table").entered();

        let mut imports = None;
        let mut symbols = None;
        cursor.step_into_container()?;
        while next_child(cursor)? {
            match cursor.field_sid() {
                Some(IMPORTS) => {
                    if imports.is_some() {
                        return Err(DecodeError::DuplicateSymbolTableField { field: "imports" });
                    }
                    imports = Some(read_imports(cursor)?);
                }
                Some(SYMBOLS) => {
                    if symbols.is_some() {
                        return Err(DecodeError::DuplicateSymbolTableField { field: "symbols" });
                    }
                    symbols = Some(read_symbols(cursor)?);
                }
                _ => {}
            }
        }
        cursor.step_out_of_container()?;

        let symbols = symbols.unwrap_or_default();
        let (kind, table) = match imports {
            Some(Imports::Append) if !self.current.is_system() => {
                checked_max_id(self.current.max_id(), &[], symbols.len())?;
                ("append", self.current.append(symbols))
            }
            Some(Imports::Reset(decls)) => {
                let imports = decls
                    .into_iter()
                    .map(|decl| self.resolve_import(decl))
                    .collect::<Result<Vec<_>, _>>()?;
                checked_max_id(SYSTEM_MAX_ID, &imports, symbols.len())?;
                self.invalidated = false;
                ("reset", SymbolTable::local(Arc::new(ImportList::new(imports)), symbols))
            }
            _ => {
                self.invalidated = false;
                ("reset", SymbolTable::local(Arc::default(), symbols))
            }
        };
        debug!(kind, max_id = table.max_id(), "symbol table installed");
        self.current = table;
        Ok(&self.current)
    }

    fn resolve_import(&self, decl: ImportDecl) -> Result<ImportedTable, DecodeError> {
        let table = self.catalog.lookup(&decl.name, decl.version);
        let max_id = match (decl.max_id, &table) {
            (Some(max_id), _) => max_id,
            (None, Some(table)) if table.version() == decl.version => table.max_id(),
            (None, _) => {
                return Err(DecodeError::MissingImportMaxId {
                    name: decl.name,
                    version: decl.version,
                });
            }
        };
        Ok(ImportedTable::new(decl.name, decl.version, max_id, table))
    }
}

/// The max id of a table built on `base` from `imports` and `local`
/// symbols, refusing totals past `usize::MAX`.
fn checked_max_id(base: usize, imports: &[ImportedTable], local: usize) -> Result<usize, DecodeError> {
    imports
        .iter()
        .try_fold(base, |total, import| total.checked_add(import.max_id()))
        .and_then(|total| total.checked_add(local))
        .ok_or(DecodeError::SymbolIdOverflow)
}

/// Advance to the next child of a filled container; `false` at its end.
fn next_child<R: Read, L: CursorListener>(cursor: &mut BinaryCursor<R, L>) -> Result<bool, DecodeError> {
    match cursor.next_value()? {
        Event::StartScalar | Event::StartContainer => Ok(true),
        Event::EndContainer => Ok(false),
        _ => Err(DecodeError::UnexpectedEof {
            position: cursor.total_offset(),
        }),
    }
}

fn is_non_null<R: Read, L: CursorListener>(cursor: &BinaryCursor<R, L>, ion_type: IonType) -> bool {
    cursor.ion_type() == Some(ion_type) && !cursor.is_null()
}

fn read_imports<R: Read, L: CursorListener>(
    cursor: &mut BinaryCursor<R, L>,
) -> Result<Imports, DecodeError> {
    if is_non_null(cursor, IonType::Symbol) {
        let sid = decode_uint(cursor.value_bytes()?).ok();
        if sid == Some(ION_SYMBOL_TABLE as u64) {
            return Ok(Imports::Append);
        }
        return Ok(Imports::Reset(Vec::new()));
    }
    if !is_non_null(cursor, IonType::List) {
        return Ok(Imports::Reset(Vec::new()));
    }

    let mut decls = Vec::new();
    cursor.step_into_container()?;
    while next_child(cursor)? {
        if is_non_null(cursor, IonType::Struct)
            && let Some(decl) = read_import(cursor)?
        {
            decls.push(decl);
        }
    }
    cursor.step_out_of_container()?;
    Ok(Imports::Reset(decls))
}

/// One `{name, version, max_id}` struct; `None` when the name is unusable.
fn read_import<R: Read, L: CursorListener>(
    cursor: &mut BinaryCursor<R, L>,
) -> Result<Option<ImportDecl>, DecodeError> {
    let mut name = None;
    let mut version = None;
    let mut max_id = None;

    cursor.step_into_container()?;
    while next_child(cursor)? {
        match cursor.field_sid() {
            Some(NAME) if is_non_null(cursor, IonType::String) => {
                name = Some(read_text(cursor)?.to_owned());
            }
            Some(VERSION) => version = read_int(cursor)?,
            Some(MAX_ID) => max_id = read_int(cursor)?,
            _ => {}
        }
    }
    cursor.step_out_of_container()?;

    let Some(name) = name.filter(|n| !n.is_empty() && n != SYSTEM_TABLE_NAME) else {
        return Ok(None);
    };
    let version = version
        .filter(|(_, negative)| !negative)
        .and_then(|(magnitude, _)| u32::try_from(magnitude).ok())
        .unwrap_or(1)
        .max(1);
    let max_id = max_id
        .filter(|(_, negative)| !negative)
        .and_then(|(magnitude, _)| usize::try_from(magnitude).ok());
    Ok(Some(ImportDecl {
        name,
        version,
        max_id,
    }))
}

fn read_symbols<R: Read, L: CursorListener>(
    cursor: &mut BinaryCursor<R, L>,
) -> Result<Vec<Option<String>>, DecodeError> {
    let mut symbols = Vec::new();
    if !is_non_null(cursor, IonType::List) {
        return Ok(symbols);
    }
    cursor.step_into_container()?;
    while next_child(cursor)? {
        if is_non_null(cursor, IonType::String) {
            symbols.push(Some(read_text(cursor)?.to_owned()));
        } else {
            symbols.push(None);
        }
    }
    cursor.step_out_of_container()?;
    Ok(symbols)
}

fn read_text<'a, R: Read, L: CursorListener>(cursor: &'a BinaryCursor<R, L>) -> Result<&'a str, DecodeError> {
    let bytes = cursor.value_bytes()?;
    std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 {
        position: cursor.value_start().unwrap_or_default(),
    })
}

/// A non-null int as magnitude and sign; `None` for anything else.
fn read_int<R: Read, L: CursorListener>(
    cursor: &BinaryCursor<R, L>,
) -> Result<Option<(u64, bool)>, DecodeError> {
    if !is_non_null(cursor, IonType::Int) {
        return Ok(None);
    }
    let negative = cursor
        .type_descriptor()
        .is_some_and(|d| d.code == TypeCode::NegativeInt);
    Ok(decode_uint(cursor.value_bytes()?).ok().map(|m| (m, negative)))
}

#[cfg(test)]
mod tests {
    use ion_encoder::{BinaryWriter, ImportDecl as Import, LocalTableDecl};
    use ion_types::{ImportLocation, MemoryCatalog, SharedSymbolTable};

    use super::*;

    fn resolver_with(tables: &[SharedSymbolTable]) -> SymbolTableResolver {
        let catalog = MemoryCatalog::new();
        for table in tables {
            catalog.insert(table.clone());
        }
        SymbolTableResolver::new(Arc::new(catalog))
    }

    /// Read every symbol table in `bytes` into `resolver`.
    fn apply(resolver: &mut SymbolTableResolver, bytes: &[u8]) -> Result<(), DecodeError> {
        let mut cursor = BinaryCursor::from_bytes(bytes);
        loop {
            match cursor.next_value()? {
                Event::NeedsData => return Ok(()),
                _ if is_symbol_table(&cursor) => {
                    assert_eq!(cursor.fill_value()?, Event::ValueReady);
                    resolver.read_symbol_table(&mut cursor)?;
                }
                _ => {}
            }
        }
    }

    fn text(resolver: &SymbolTableResolver, sid: usize) -> Option<String> {
        resolver.resolve(sid).unwrap().text
    }

    #[test]
    fn local_symbols_follow_the_system_table() {
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::with_symbols(["a", "b"]))
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        assert_eq!(text(&resolver, 4).as_deref(), Some("name"));
        assert_eq!(text(&resolver, 10).as_deref(), Some("a"));
        assert_eq!(text(&resolver, 11).as_deref(), Some("b"));
        assert!(resolver.resolve(12).is_err());
    }

    #[test]
    fn import_tail_resolves_to_its_location() {
        let foo = SharedSymbolTable::from_texts("foo", 1, ["x", "y"]);
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::default().import(Import::new("foo", 1, 4)))
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[foo]);
        apply(&mut resolver, &bytes).unwrap();

        assert_eq!(text(&resolver, 10).as_deref(), Some("x"));
        assert_eq!(text(&resolver, 11).as_deref(), Some("y"));
        let tail = resolver.resolve(12).unwrap();
        assert_eq!(tail.text, None);
        assert_eq!(tail.import_location, Some(ImportLocation::new("foo", 3)));
        assert_eq!(
            resolver.resolve(13).unwrap().import_location,
            Some(ImportLocation::new("foo", 4))
        );
    }

    #[test]
    fn unknown_import_is_all_unknown_text() {
        let bytes = BinaryWriter::new()
            .symbol_table(
                &LocalTableDecl::with_symbols(["local"]).import(Import::new("missing", 2, 3)),
            )
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        assert_eq!(
            resolver.resolve(11).unwrap().import_location,
            Some(ImportLocation::new("missing", 2))
        );
        assert_eq!(text(&resolver, 13).as_deref(), Some("local"));
    }

    #[test]
    fn import_without_max_id_needs_an_exact_catalog_match() {
        let decl = Import {
            name: "foo".into(),
            version: Some(2),
            max_id: None,
        };
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::default().import(decl))
            .finish()
            .unwrap();

        let mut resolver = resolver_with(&[SharedSymbolTable::from_texts("foo", 2, ["p", "q"])]);
        apply(&mut resolver, &bytes).unwrap();
        assert_eq!(resolver.current().max_id(), SYSTEM_MAX_ID + 2);

        let mut resolver = resolver_with(&[SharedSymbolTable::from_texts("foo", 1, ["p"])]);
        assert!(matches!(
            apply(&mut resolver, &bytes),
            Err(DecodeError::MissingImportMaxId { version: 2, .. })
        ));
    }

    #[test]
    fn append_extends_and_ivm_resets() {
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::with_symbols(["A"]))
            .symbol_table(&LocalTableDecl::with_symbols(["B"]).appending())
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        assert_eq!(text(&resolver, 11).as_deref(), Some("B"));
        assert_eq!(resolver.current().declared_symbol_count(), 2);

        resolver.reset();
        assert!(resolver.current().is_system());
        assert!(resolver.resolve(10).is_err());
    }

    #[test]
    fn append_onto_system_is_a_reset() {
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::with_symbols(["only"]).appending())
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        assert!(!resolver.current().is_appended());
        assert_eq!(text(&resolver, 10).as_deref(), Some("only"));
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let mut body = BinaryWriter::new();
        body.annotate(ION_SYMBOL_TABLE)
            .start_struct()
            .field(SYMBOLS)
            .start_list()
            .end_container()
            .field(SYMBOLS)
            .start_list()
            .end_container()
            .end_container();
        let bytes = body.finish().unwrap();
        let mut resolver = resolver_with(&[]);
        assert!(matches!(
            apply(&mut resolver, &bytes),
            Err(DecodeError::DuplicateSymbolTableField { field: "symbols" })
        ));
    }

    #[test]
    fn duplicate_imports_are_rejected() {
        let mut body = BinaryWriter::new();
        body.annotate(ION_SYMBOL_TABLE)
            .start_struct()
            .field(IMPORTS)
            .symbol_id(ION_SYMBOL_TABLE)
            .field(SYMBOLS)
            .start_list()
            .string("a")
            .end_container()
            .field(IMPORTS)
            .start_list()
            .end_container()
            .end_container();
        let bytes = body.finish().unwrap();
        let mut resolver = resolver_with(&[]);
        assert!(matches!(
            apply(&mut resolver, &bytes),
            Err(DecodeError::DuplicateSymbolTableField { field: "imports" })
        ));
        assert!(resolver.current().is_system());
    }

    #[test]
    fn import_sizes_past_usize_max_are_rejected() {
        let huge = BinaryWriter::new()
            .symbol_table(
                &LocalTableDecl::with_symbols(["a"]).import(Import::new("foo", 1, usize::MAX)),
            )
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        assert!(matches!(
            apply(&mut resolver, &huge),
            Err(DecodeError::SymbolIdOverflow)
        ));
        assert!(resolver.current().is_system());

        let half = usize::MAX / 2 + 1;
        let pair = BinaryWriter::new()
            .symbol_table(
                &LocalTableDecl::default()
                    .import(Import::new("foo", 1, half))
                    .import(Import::new("bar", 1, half)),
            )
            .finish()
            .unwrap();
        assert!(matches!(
            apply(&mut resolver, &pair),
            Err(DecodeError::SymbolIdOverflow)
        ));
    }

    #[test]
    fn append_past_usize_max_is_rejected() {
        let bytes = BinaryWriter::new()
            .symbol_table(
                &LocalTableDecl::default().import(Import::new("foo", 1, usize::MAX - SYSTEM_MAX_ID)),
            )
            .symbol_table(&LocalTableDecl::with_symbols(["a"]).appending())
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        assert!(matches!(
            apply(&mut resolver, &bytes),
            Err(DecodeError::SymbolIdOverflow)
        ));
        assert_eq!(resolver.current().max_id(), usize::MAX);
    }

    #[test]
    fn non_string_symbols_take_a_slot_without_text() {
        let mut w = BinaryWriter::new();
        w.annotate(ION_SYMBOL_TABLE)
            .start_struct()
            .field(SYMBOLS)
            .start_list()
            .int(5)
            .string("s")
            .null(IonType::String)
            .end_container()
            .field(99)
            .string("ignored")
            .end_container();
        let bytes = w.finish().unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        assert_eq!(text(&resolver, 10), None);
        assert_eq!(text(&resolver, 11).as_deref(), Some("s"));
        assert_eq!(text(&resolver, 12), None);
        assert_eq!(resolver.resolve(12).unwrap().sid, 0);
    }

    #[test]
    fn invalidation_blocks_local_symbols_until_reset() {
        let bytes = BinaryWriter::new()
            .symbol_table(&LocalTableDecl::with_symbols(["a"]))
            .finish()
            .unwrap();
        let mut resolver = resolver_with(&[]);
        apply(&mut resolver, &bytes).unwrap();
        resolver.invalidate();
        assert!(matches!(
            resolver.resolve(10),
            Err(DecodeError::SymbolTableInvalidated { sid: 10 })
        ));
        assert_eq!(text(&resolver, 3).as_deref(), Some("$ion_symbol_table"));

        apply(&mut resolver, &bytes).unwrap();
        assert!(!resolver.is_invalidated());
        assert_eq!(text(&resolver, 10).as_deref(), Some("a"));
    }

    #[test]
    fn oversized_classification() {
        let value = |annotations: Option<Vec<usize>>, ion_type| OversizedValue {
            depth: 0,
            annotation_sids: annotations,
            ion_type,
            start: 0,
            end: 100,
        };
        assert!(might_be_symbol_table(&value(Some(vec![3]), Some(IonType::Struct))));
        assert!(might_be_symbol_table(&value(Some(vec![3]), None)));
        assert!(!might_be_symbol_table(&value(Some(vec![3]), Some(IonType::String))));
        assert!(!might_be_symbol_table(&value(Some(vec![10, 3]), Some(IonType::Struct))));
        assert!(!might_be_symbol_table(&value(None, None)));
    }
}
