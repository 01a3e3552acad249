use ion_types::system_symbols::{IMPORTS, ION_SYMBOL_TABLE, MAX_ID, NAME, SYMBOLS, VERSION};
use ion_wire::{SignedMagnitude, TypeCode};

use crate::value_writer::{
    write_int, write_null, write_symbol_id, write_symbol_table_struct, write_value, write_var_uint,
};

/// One entry of a local symbol table's `imports` list.
///
/// `version` and `max_id` are optional on the wire; leaving them out is
/// how tests exercise the reader's defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportDecl {
    pub name: String,
    pub version: Option<u32>,
    pub max_id: Option<usize>,
}

impl ImportDecl {
    pub fn new(name: impl Into<String>, version: u32, max_id: usize) -> Self {
        Self {
            name: name.into(),
            version: Some(version),
            max_id: Some(max_id),
        }
    }
}

/// What the `imports` field of a declaration says.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TableImports {
    /// No `imports` field: the table replaces the current one.
    #[default]
    None,
    /// `imports: $ion_symbol_table`: extend the current table.
    Append,
    /// `imports: [...]`: replace, starting from these shared tables.
    List(Vec<ImportDecl>),
}

/// A local symbol table declaration, ready to be written to a stream.
///
/// ```text
/// $ion_symbol_table::{
///   imports: [ {name: "foo", version: 1, max_id: 4} ],   // or $ion_symbol_table
///   symbols: [ "a", "b" ],
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalTableDecl {
    pub imports: TableImports,
    pub symbols: Vec<Option<String>>,
}

impl LocalTableDecl {
    /// A table with local symbols and no imports.
    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            imports: TableImports::None,
            symbols: symbols.into_iter().map(|s| Some(s.into())).collect(),
        }
    }

    /// Switch this declaration to append mode.
    #[must_use]
    pub fn appending(mut self) -> Self {
        self.imports = TableImports::Append;
        self
    }

    /// Add a shared-table import, switching to list mode if needed.
    #[must_use]
    pub fn import(mut self, decl: ImportDecl) -> Self {
        match &mut self.imports {
            TableImports::List(list) => list.push(decl),
            _ => self.imports = TableImports::List(vec![decl]),
        }
        self
    }

    /// Append the annotated struct encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();

        match &self.imports {
            TableImports::None => {}
            TableImports::Append => {
                write_var_uint(&mut body, IMPORTS as u64);
                write_symbol_id(&mut body, ION_SYMBOL_TABLE);
            }
            TableImports::List(imports) => {
                let mut list = Vec::new();
                for import in imports {
                    import.encode(&mut list);
                }
                write_var_uint(&mut body, IMPORTS as u64);
                write_value(&mut body, TypeCode::List, &list);
            }
        }

        if !self.symbols.is_empty() {
            let mut list = Vec::new();
            for symbol in &self.symbols {
                match symbol {
                    Some(text) => write_value(&mut list, TypeCode::String, text.as_bytes()),
                    None => write_null(&mut list, TypeCode::NullOrPad),
                }
            }
            write_var_uint(&mut body, SYMBOLS as u64);
            write_value(&mut body, TypeCode::List, &list);
        }

        let mut encoded = Vec::with_capacity(body.len() + 4);
        write_value(&mut encoded, TypeCode::Struct, &body);
        write_symbol_table_struct(out, &encoded);
    }
}

impl ImportDecl {
    fn encode(&self, out: &mut Vec<u8>) {
        let mut body = Vec::new();
        write_var_uint(&mut body, NAME as u64);
        write_value(&mut body, TypeCode::String, self.name.as_bytes());
        if let Some(version) = self.version {
            write_var_uint(&mut body, VERSION as u64);
            write_int(&mut body, SignedMagnitude::new(u64::from(version), false));
        }
        if let Some(max_id) = self.max_id {
            write_var_uint(&mut body, MAX_ID as u64);
            write_int(&mut body, SignedMagnitude::new(max_id as u64, false));
        }
        write_value(out, TypeCode::Struct, &body);
    }
}
