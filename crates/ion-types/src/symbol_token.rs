/// Where a symbol with unknown text came from: the name of the imported
/// shared table and the 1-based position of the slot within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImportLocation {
    pub table_name: String,
    pub sid: usize,
}

impl ImportLocation {
    pub fn new(table_name: impl Into<String>, sid: usize) -> Self {
        Self {
            table_name: table_name.into(),
            sid,
        }
    }
}

/// A resolved symbol.
///
/// When `text` is `None` the symbol is either SID 0 (or a local slot
/// declared without text, which resolves the same way) or a slot of an
/// import whose shared table does not provide text; `import_location` is
/// only set in the second case.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolToken {
    pub text: Option<String>,
    pub sid: usize,
    pub import_location: Option<ImportLocation>,
}

impl SymbolToken {
    pub fn known(text: impl Into<String>, sid: usize) -> Self {
        Self {
            text: Some(text.into()),
            sid,
            import_location: None,
        }
    }

    /// SID 0, or a local slot without text.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            text: None,
            sid: 0,
            import_location: None,
        }
    }

    #[must_use]
    pub fn imported_unknown(sid: usize, location: ImportLocation) -> Self {
        Self {
            text: None,
            sid,
            import_location: Some(location),
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl std::fmt::Display for SymbolToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.text, &self.import_location) {
            (Some(text), _) => f.write_str(text),
            (None, Some(location)) => write!(f, "${}#{}", location.table_name, location.sid),
            (None, None) => write!(f, "${}", self.sid),
        }
    }
}
