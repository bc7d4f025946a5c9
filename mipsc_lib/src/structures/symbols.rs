//! The scope tree and symbol storage shared by the semantic analyzer,
//! the IR generator and the MIPS back end.
//!
//! Scopes get dense integer IDs in creation order, starting at 1 for
//! the global scope. The IR generator re-walks the tree and consumes
//! the same IDs in the same order, which is why [`SymbolTable::scope_by_id`]
//! must be cheap. Symbols are referred to by [`SymbolId`] handles
//! (scope id + slot index) instead of references, so IR operands can
//! point back into the table without borrowing it.

use std::collections::HashMap;

use vec1::Vec1;

pub type ScopeId = u32;

/// A reference into a [`SymbolTable`]. Valid for as long as the table
/// it came from is alive; symbols are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId {
    pub scope: ScopeId,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    ConstInt,
    Int,
    StaticInt,
    ConstIntArray,
    IntArray,
    StaticIntArray,
    IntFunc,
    VoidFunc,
}

impl SymbolKind {
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            SymbolKind::ConstIntArray | SymbolKind::IntArray | SymbolKind::StaticIntArray
        )
    }

    pub fn is_const(&self) -> bool {
        matches!(self, SymbolKind::ConstInt | SymbolKind::ConstIntArray)
    }

    pub fn is_static(&self) -> bool {
        matches!(self, SymbolKind::StaticInt | SymbolKind::StaticIntArray)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, SymbolKind::IntFunc | SymbolKind::VoidFunc)
    }

    /// The name used in `symbol.txt` and `table.txt`.
    pub fn type_name(&self) -> &'static str {
        match self {
            SymbolKind::ConstInt => "ConstInt",
            SymbolKind::Int => "Int",
            SymbolKind::StaticInt => "StaticInt",
            SymbolKind::ConstIntArray => "ConstIntArray",
            SymbolKind::IntArray => "IntArray",
            SymbolKind::StaticIntArray => "StaticIntArray",
            SymbolKind::IntFunc => "IntFunc",
            SymbolKind::VoidFunc => "VoidFunc",
        }
    }
}

/// Parameter descriptor stored on function symbols, in declaration
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    pub is_array: bool,
}

/// A single named binding with its storage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Owning scope.
    pub scope: ScopeId,
    /// Declaration line.
    pub line: u32,
    pub is_param: bool,
    /// Byte offset from the top of the owning function's local region;
    /// 0 for globals. The back end adds its own base offset.
    pub offset: i32,
    /// Byte size. Array parameters are pointers: always 4.
    pub size: i32,
    /// Data-section label for globals, statics and functions.
    pub label: Option<String>,
    /// Function symbols only: total byte size of params + non-static
    /// locals, filled in when the analyzer finishes the body.
    pub stack_frame_size: i32,
    /// Declared array length, -1 if not an array.
    pub array_len: i32,
    /// Constant scalar value (consts; also globals for `.data` emission).
    pub value: i32,
    /// Constant array initializer values.
    pub array_init: Vec<i32>,
    /// Function symbols only.
    pub params: Vec<ParamInfo>,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, scope: ScopeId, line: u32) -> Self {
        let name = name.into();
        // Globals live in `.data` under their own name.
        let label = (scope == SymbolTable::GLOBAL_SCOPE).then(|| name.clone());
        Self {
            name,
            kind,
            scope,
            line,
            is_param: false,
            offset: 0,
            size: 4,
            label,
            stack_frame_size: 0,
            array_len: -1,
            value: 0,
            array_init: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn is_array(&self) -> bool {
        self.kind.is_array()
    }

    pub fn is_function(&self) -> bool {
        self.kind.is_function()
    }

    /// Bytes this symbol occupies in its frame or data segment.
    pub fn byte_size(&self) -> i32 {
        if self.is_param && self.is_array() {
            return 4;
        }
        if self.is_array() {
            return self.array_len.max(1) * 4;
        }
        4
    }

    /// Value of `self.array_init[index]`, defaulting to 0 for the
    /// uninitialized tail.
    pub fn array_element_value(&self, index: i32) -> i32 {
        if index >= 0 && (index as usize) < self.array_init.len() {
            self.array_init[index as usize]
        } else {
            0
        }
    }
}

/// One lexical scope: insertion-ordered symbols plus a name index.
#[derive(Debug)]
pub struct Scope {
    id: ScopeId,
    symbols: Vec<Symbol>,
    by_name: HashMap<String, u32>,
}

impl Scope {
    fn new(id: ScopeId) -> Self {
        Self {
            id,
            symbols: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.by_name.get(name).map(|&index| SymbolId {
            scope: self.id,
            index,
        })
    }

    /// Symbols in declaration order.
    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| {
            (
                SymbolId {
                    scope: self.id,
                    index: i as u32,
                },
                s,
            )
        })
    }
}

/// All scopes, indexed by ID, plus the active scope stack used during
/// walks. The stack always contains at least the global scope.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    stack: Vec1<ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub const GLOBAL_SCOPE: ScopeId = 1;

    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(Self::GLOBAL_SCOPE)],
            stack: Vec1::new(Self::GLOBAL_SCOPE),
        }
    }

    /// Creates a scope with the next dense ID and makes it the current
    /// scope.
    pub fn enter_scope(&mut self) -> ScopeId {
        let id = self.scopes.len() as ScopeId + 1;
        self.scopes.push(Scope::new(id));
        self.stack.push(id);
        id
    }

    pub fn exit_scope(&mut self) {
        self.stack
            .pop()
            .expect("symbol table: attempted to exit the global scope");
    }

    pub fn current_scope_id(&self) -> ScopeId {
        *self.stack.last()
    }

    pub fn scope_by_id(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id as usize - 1)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Inserts into the scope named by `symbol.scope` (not necessarily
    /// the top of the stack). Fails if the name already exists there.
    pub fn add_symbol(&mut self, symbol: Symbol) -> Result<SymbolId, SymbolId> {
        let scope = self
            .scopes
            .get_mut(symbol.scope as usize - 1)
            .expect("symbol table: symbol names an unknown scope");
        if let Some(existing) = scope.find(&symbol.name) {
            return Err(existing);
        }
        let index = scope.symbols.len() as u32;
        scope.by_name.insert(symbol.name.clone(), index);
        scope.symbols.push(symbol);
        Ok(SymbolId {
            scope: scope.id,
            index,
        })
    }

    /// Walks the active stack inner-to-outer and returns the first
    /// symbol with this name.
    pub fn find_symbol(&self, name: &str) -> Option<SymbolId> {
        self.stack
            .iter()
            .rev()
            .find_map(|&id| self.scopes[id as usize - 1].find(name))
    }

    /// Looks only in the current scope.
    pub fn find_in_current_scope(&self, name: &str) -> Option<SymbolId> {
        self.scopes[self.current_scope_id() as usize - 1].find(name)
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.scopes[id.scope as usize - 1].symbols[id.index as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.scopes[id.scope as usize - 1].symbols[id.index as usize]
    }

    /// Every symbol across every scope, sorted by (scope, line).
    pub fn all_symbols(&self) -> Vec<&Symbol> {
        let mut all: Vec<&Symbol> = self.scopes.iter().flat_map(|s| s.symbols.iter()).collect();
        all.sort_by_key(|s| (s.scope, s.line));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(table: &SymbolTable, name: &str, kind: SymbolKind, line: u32) -> Symbol {
        Symbol::new(name, kind, table.current_scope_id(), line)
    }

    #[test]
    fn global_scope_is_one() {
        let table = SymbolTable::new();
        assert_eq!(table.current_scope_id(), SymbolTable::GLOBAL_SCOPE);
    }

    #[test]
    fn dense_monotonic_scope_ids() {
        let mut table = SymbolTable::new();
        assert_eq!(table.enter_scope(), 2);
        assert_eq!(table.enter_scope(), 3);
        table.exit_scope();
        table.exit_scope();
        // A sibling scope continues the sequence even after exits.
        assert_eq!(table.enter_scope(), 4);
        assert!(table.scope_by_id(3).is_some());
    }

    #[test]
    fn redefinition_in_same_scope_fails() {
        let mut table = SymbolTable::new();
        let a = sym(&table, "a", SymbolKind::Int, 1);
        let id = table.add_symbol(a.clone()).unwrap();
        assert_eq!(table.add_symbol(a), Err(id));
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut table = SymbolTable::new();
        let outer = table.add_symbol(sym(&table, "a", SymbolKind::Int, 1)).unwrap();
        table.enter_scope();
        let inner = table
            .add_symbol(sym(&table, "a", SymbolKind::ConstInt, 2))
            .unwrap();
        assert_eq!(table.find_symbol("a"), Some(inner));
        table.exit_scope();
        assert_eq!(table.find_symbol("a"), Some(outer));
    }

    #[test]
    fn add_targets_the_scope_named_by_the_symbol() {
        let mut table = SymbolTable::new();
        table.enter_scope();
        // A function symbol belongs to the global scope even while the
        // walk sits inside the function's own scope.
        let f = Symbol::new("f", SymbolKind::IntFunc, SymbolTable::GLOBAL_SCOPE, 3);
        let id = table.add_symbol(f).unwrap();
        assert_eq!(id.scope, SymbolTable::GLOBAL_SCOPE);
        assert_eq!(table.find_symbol("f"), Some(id));
    }

    #[test]
    fn all_symbols_sorted_by_scope_then_line() {
        let mut table = SymbolTable::new();
        table.add_symbol(sym(&table, "g2", SymbolKind::Int, 5)).unwrap();
        table.add_symbol(sym(&table, "g1", SymbolKind::Int, 1)).unwrap();
        table.enter_scope();
        table.add_symbol(sym(&table, "l", SymbolKind::Int, 3)).unwrap();
        let names: Vec<&str> = table.all_symbols().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["g1", "g2", "l"]);
    }

    #[test]
    fn array_param_is_a_pointer() {
        let mut sym = Symbol::new("arr", SymbolKind::IntArray, 2, 1);
        sym.array_len = 10;
        assert_eq!(sym.byte_size(), 40);
        sym.is_param = true;
        assert_eq!(sym.byte_size(), 4);
    }
}
