/// A named, versioned shared symbol table as held by a catalog.
///
/// Slots may lack text (`None`); they still occupy a SID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SharedSymbolTable {
    name: String,
    version: u32,
    symbols: Vec<Option<String>>,
}

impl SharedSymbolTable {
    pub fn new(name: impl Into<String>, version: u32, symbols: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            version: version.max(1),
            symbols,
        }
    }

    /// Convenience for tables where every slot has text.
    pub fn from_texts<I, S>(name: impl Into<String>, version: u32, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, version, texts.into_iter().map(|t| Some(t.into())).collect())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of slots, which is the table's own max id.
    #[must_use]
    pub fn max_id(&self) -> usize {
        self.symbols.len()
    }

    /// Text of the 1-based slot `sid`, if the slot exists and has text.
    #[must_use]
    pub fn text(&self, sid: usize) -> Option<&str> {
        sid.checked_sub(1)
            .and_then(|i| self.symbols.get(i))
            .and_then(Option::as_deref)
    }

    #[must_use]
    pub fn symbols(&self) -> &[Option<String>] {
        &self.symbols
    }
}
