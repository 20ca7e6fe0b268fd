//! Label bookkeeping shared by both assembler passes.

use std::collections::HashMap;

/// Identifies a symbol within a single [SymbolTable].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct SymbolId(usize);

/// Everything known about a single label.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    id: SymbolId,
    label: String,
    address: Option<u16>,
    defined: Option<usize>,
    references: Vec<usize>,
}

impl SymbolInfo {
    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The address assigned in the first pass, or `None` if the label is only referenced.
    pub fn address(&self) -> Option<u16> {
        self.address
    }

    /// Source line of the definition.
    pub fn defined(&self) -> Option<usize> {
        self.defined
    }

    /// Source lines referencing the label.
    pub fn references(&self) -> &[usize] {
        &self.references
    }
}

/// Mapping from label names to instruction slot addresses.
///
/// Symbols are kept in the order they were first seen, so iterating a table is deterministic.
#[derive(Default, Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<SymbolInfo>,
    by_label: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    fn get_or_create(&mut self, label: &str) -> SymbolId {
        if let Some(id) = self.by_label.get(label) {
            return *id;
        }

        let id = SymbolId(self.symbols.len());

        self.symbols.push(SymbolInfo {
            id,
            label: label.to_string(),
            address: None,
            defined: None,
            references: Vec::new(),
        });

        self.by_label.insert(label.to_string(), id);

        id
    }

    /// Defines `label` at `address`.
    ///
    /// # Returns
    /// The id of the new symbol, or `Err` with the id of the existing symbol if the label has
    /// already been defined.
    pub fn define_symbol(&mut self, line: usize, label: &str, address: u16) -> Result<SymbolId, SymbolId> {
        let id = self.get_or_create(label);
        let symbol = &mut self.symbols[id.0];

        if symbol.defined.is_some() {
            return Err(id);
        }

        symbol.defined = Some(line);
        symbol.address = Some(address);

        Ok(id)
    }

    /// Records a use of `label` on `line`. The label does not need to be defined.
    pub fn reference_symbol(&mut self, line: usize, label: &str) -> SymbolId {
        let id = self.get_or_create(label);
        self.symbols[id.0].references.push(line);
        id
    }

    pub fn get_symbol(&self, id: SymbolId) -> &SymbolInfo {
        &self.symbols[id.0]
    }

    pub fn get_symbol_by_label<S: AsRef<str>>(&self, label: S) -> Option<&SymbolInfo> {
        self.by_label
            .get(label.as_ref())
            .map(|id| &self.symbols[id.0])
    }

    /// Returns the address of a defined label.
    pub fn address_of<S: AsRef<str>>(&self, label: S) -> Option<u16> {
        self.get_symbol_by_label(label).and_then(SymbolInfo::address)
    }

    /// Iterates over the defined symbols in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.iter().filter(|symbol| symbol.defined.is_some())
    }

    /// Number of defined symbols.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds the defined label closest to `label`, for "did you mean" hints.
    pub fn suggest(&self, label: &str) -> Option<&str> {
        crate::utils::closest(label, self.iter().map(SymbolInfo::label))
    }
}
