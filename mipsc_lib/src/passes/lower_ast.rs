//! Lowering from the AST to the three-address IR.
//!
//! This is a *second* walk over the program: the semantic analyzer has
//! already created every scope and assigned dense IDs in visit order,
//! so instead of replaying its name-resolution rules this walk consumes
//! scope IDs in the same monotonic order and lands in exactly the
//! scopes the analyzer built. A divergence between the two walks is a
//! compiler bug and panics.
//!
//! Only run on a clean build: lowering assumes every name resolves and
//! every function has complete layout information.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::ast::*;
use crate::ir::{FrameInfo, FrameSlot, Instr, IrModule, Opcode, Operand};
use crate::symbols::{ScopeId, SymbolId, SymbolTable};

/// Fixed space below `$fp` for the saved `$ra`, saved `$fp` and one
/// reserved word; the analyzer's offsets start below it.
const BASE_OFFSET: i32 = 12;

pub fn build_ir_from_ast(unit: &CompUnit, table: &SymbolTable) -> IrModule {
    let mut lowerer = Lowerer::new(table);
    lowerer.visit_comp_unit(unit);
    IrModule {
        instrs: lowerer.instrs,
        string_constants: lowerer.string_constants,
        frames: lowerer.frames,
    }
}

struct Lowerer<'t> {
    table: &'t SymbolTable,
    instrs: Vec<Instr>,
    string_constants: Vec<(String, String)>,
    frames: HashMap<String, FrameInfo>,
    /// Key into `frames` while inside a function definition.
    current_frame: Option<String>,

    temp_counter: u32,
    label_counter: u32,
    string_counter: u32,

    /// The replay walk's own scope stack and ID cursor.
    iter_scope_id: ScopeId,
    scope_stack: Vec<ScopeId>,

    /// Symbols whose declaration point has been passed. Lookup skips
    /// inactive symbols, which is what makes `int a = a + 1;` resolve
    /// the right-hand `a` to an outer binding.
    active: HashSet<SymbolId>,

    break_stack: Vec<String>,
    continue_stack: Vec<String>,
}

impl<'t> Lowerer<'t> {
    fn new(table: &'t SymbolTable) -> Self {
        let mut lowerer = Self {
            table,
            instrs: Vec::new(),
            string_constants: Vec::new(),
            frames: HashMap::new(),
            current_frame: None,
            temp_counter: 0,
            label_counter: 0,
            string_counter: 0,
            iter_scope_id: 0,
            scope_stack: Vec::new(),
            active: HashSet::new(),
            break_stack: Vec::new(),
            continue_stack: Vec::new(),
        };
        // Consume the global scope and activate everything in it.
        lowerer.enter_scope();
        let global = table.scope_by_id(SymbolTable::GLOBAL_SCOPE).unwrap();
        for (id, _) in global.symbols() {
            lowerer.active.insert(id);
        }
        lowerer
    }

    // === plumbing ===

    fn emit(&mut self, op: Opcode, result: Option<Operand>, arg1: Option<Operand>, arg2: Option<Operand>) {
        self.instrs.push(Instr::new(op, result, arg1, arg2));
    }

    fn emit_label(&mut self, label: &str) {
        self.emit(Opcode::Label, Some(Operand::Label(label.to_owned())), None, None);
    }

    fn new_label(&mut self) -> String {
        let label = format!("L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    /// Allocates a fresh temporary and registers its home slot at the
    /// current end of the enclosing function's frame.
    fn new_temp(&mut self) -> Operand {
        let n = self.temp_counter;
        self.temp_counter += 1;
        if let Some(frame) = self.current_frame_mut() {
            let name = format!("t{n}");
            let offset = frame.frame_size;
            frame.slots.insert(
                name.clone(),
                FrameSlot {
                    name,
                    offset,
                    size: 4,
                    is_param: false,
                    is_temp: true,
                },
            );
            frame.frame_size += 4;
        }
        Operand::Temp(n)
    }

    fn current_frame_mut(&mut self) -> Option<&mut FrameInfo> {
        let key = self.current_frame.as_ref()?;
        self.frames.get_mut(key)
    }

    fn add_string_constant(&mut self, content: String) -> String {
        let label = format!("str_{}", self.string_counter);
        self.string_counter += 1;
        self.string_constants.push((label.clone(), content));
        label
    }

    fn enter_scope(&mut self) {
        self.iter_scope_id += 1;
        if self.table.scope_by_id(self.iter_scope_id).is_none() {
            panic!(
                "lowering walked into scope {} which the analyzer never created",
                self.iter_scope_id
            );
        }
        trace!("lowering enters scope {}", self.iter_scope_id);
        self.scope_stack.push(self.iter_scope_id);
    }

    fn exit_scope(&mut self) {
        self.scope_stack.pop();
    }

    /// Inner-to-outer lookup ignoring the active set. Used at
    /// definition sites, where the symbol exists but is not yet active.
    fn lookup_any(&self, name: &str) -> Option<SymbolId> {
        self.scope_stack
            .iter()
            .rev()
            .find_map(|&id| self.table.scope_by_id(id).unwrap().find(name))
    }

    /// Inner-to-outer lookup skipping symbols whose declaration has
    /// not been passed yet; the search continues outward past them.
    fn get_var(&self, name: &str) -> Option<SymbolId> {
        for &scope_id in self.scope_stack.iter().rev() {
            if let Some(id) = self.table.scope_by_id(scope_id).unwrap().find(name) {
                if self.active.contains(&id) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Mangled IR name: globals keep their source name, statics use
    /// their data label, other locals get a `_<scope>` suffix so
    /// shadowed names cannot collide.
    fn mangled_name(&self, id: SymbolId) -> String {
        let symbol = self.table.symbol(id);
        if symbol.scope == SymbolTable::GLOBAL_SCOPE {
            return symbol.name.clone();
        }
        if symbol.kind.is_static() {
            return symbol
                .label
                .clone()
                .unwrap_or_else(|| format!("static_{}_{}", symbol.name, symbol.scope));
        }
        format!("{}_{}", symbol.name, symbol.scope)
    }

    fn var_operand(&self, id: SymbolId) -> Operand {
        Operand::Var {
            name: self.mangled_name(id),
            symbol: id,
        }
    }

    // === declarations ===

    fn visit_comp_unit(&mut self, unit: &CompUnit) {
        for item in &unit.items {
            match item {
                Item::Decl(decl) => self.visit_decl(decl),
                Item::Func(func) => self.visit_func_def(func),
                Item::Main(main) => self.visit_main_def(main),
            }
        }
    }

    fn visit_decl(&mut self, decl: &Decl) {
        for def in &decl.defs {
            self.visit_var_def(def);
        }
    }

    fn visit_var_def(&mut self, def: &VarDef) {
        let id = self
            .lookup_any(&def.ident)
            .unwrap_or_else(|| panic!("lowering: `{}` missing from the symbol table", def.ident));
        let symbol = self.table.symbol(id);
        let var_op = self.var_operand(id);

        let is_global = symbol.scope == SymbolTable::GLOBAL_SCOPE;
        let is_static = symbol.kind.is_static();

        // Locals claim a frame slot keyed by mangled name; symbols of
        // the function's own scope were registered at function entry,
        // this covers the nested-block ones.
        if !is_global && !is_static {
            let offset = symbol.offset + BASE_OFFSET;
            let size = symbol.byte_size();
            let is_param = symbol.is_param;
            if let Some(frame) = self.current_frame_mut() {
                let name = var_op.to_string();
                frame.slots.entry(name.clone()).or_insert(FrameSlot {
                    name,
                    offset,
                    size,
                    is_param,
                    is_temp: false,
                });
            }
        }

        // Globals and statics are materialized in `.data`, not in code.
        if is_global || is_static {
            self.active.insert(id);
            return;
        }

        if symbol.is_array() {
            let array_len = symbol.array_len;
            let init = match &def.init {
                Some(InitVal::List(values)) => Some(values),
                Some(InitVal::Single(_)) | None => None,
            };
            if let Some(values) = init {
                let mut index = 0;
                for expr in values {
                    let value = self.visit_expr(expr);
                    self.emit(
                        Opcode::Store,
                        Some(value),
                        Some(var_op.clone()),
                        Some(Operand::Imm(index * 4)),
                    );
                    index += 1;
                }
                // An initializer zero-fills the uninitialized tail.
                while index < array_len {
                    self.emit(
                        Opcode::Store,
                        Some(Operand::Imm(0)),
                        Some(var_op.clone()),
                        Some(Operand::Imm(index * 4)),
                    );
                    index += 1;
                }
            }
        } else if let Some(init) = &def.init {
            let expr = match init {
                InitVal::Single(expr) => Some(expr),
                InitVal::List(values) => values.first(),
            };
            if let Some(expr) = expr {
                let value = self.visit_expr(expr);
                self.emit(Opcode::Assign, Some(var_op), Some(value), None);
            }
        }

        // Only now does the name become visible to later code.
        self.active.insert(id);
    }

    // === functions ===

    fn visit_func_def(&mut self, func: &FuncDef) {
        self.emit_label(&func.ident);
        self.emit(Opcode::FuncEntry, None, None, None);
        self.begin_function(&func.ident);
        self.visit_block(&func.body, true);
        self.emit(Opcode::FuncExit, None, None, None);
        self.exit_scope();
        self.current_frame = None;
    }

    fn visit_main_def(&mut self, main: &MainDef) {
        self.emit_label("main");
        self.emit(Opcode::FuncEntry, None, None, None);
        self.begin_function("main");
        self.visit_block(&main.body, true);
        self.emit(Opcode::FuncExit, None, None, None);
        self.exit_scope();
        self.current_frame = None;
    }

    /// Enters the function's scope and builds its frame table from the
    /// analyzer's layout: every non-static symbol of the function scope
    /// gets a slot at `analyzer offset + BASE_OFFSET`, parameters are
    /// listed in offset order, and the frame starts at
    /// `stack_frame_size + BASE_OFFSET` so temporaries append cleanly.
    fn begin_function(&mut self, name: &str) {
        let func_id = self
            .lookup_any(name)
            .unwrap_or_else(|| panic!("lowering: function `{}` missing from the symbol table", name));
        let frame_size = self.table.symbol(func_id).stack_frame_size + BASE_OFFSET;

        self.enter_scope();
        let scope = *self.scope_stack.last().unwrap();

        let mut frame = FrameInfo {
            func_name: name.to_owned(),
            frame_size,
            params: Vec::new(),
            slots: HashMap::new(),
        };

        for (id, symbol) in self.table.scope_by_id(scope).unwrap().symbols() {
            if symbol.kind.is_static() {
                continue;
            }
            if symbol.is_param {
                // Parameters are live from the first instruction on.
                self.active.insert(id);
            }
            let mangled = format!("{}_{}", symbol.name, symbol.scope);
            frame.slots.insert(
                mangled.clone(),
                FrameSlot {
                    name: mangled.clone(),
                    offset: symbol.offset + BASE_OFFSET,
                    size: symbol.byte_size(),
                    is_param: symbol.is_param,
                    is_temp: false,
                },
            );
            if symbol.is_param {
                frame.params.push(mangled);
            }
        }
        // Declaration order == offset order; sorting pins the
        // `$a0..$a3` binding even if the map iteration ever changes.
        frame
            .params
            .sort_by_key(|p| frame.slots[p].offset);

        debug!(
            "function `{name}`: frame starts at {} bytes, {} params",
            frame.frame_size,
            frame.params.len()
        );
        self.frames.insert(name.to_owned(), frame);
        self.current_frame = Some(name.to_owned());
    }

    // === statements ===

    fn visit_block(&mut self, block: &Block, is_function_body: bool) {
        if !is_function_body {
            self.enter_scope();
        }
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.visit_decl(decl),
                BlockItem::Stmt(stmt) => self.visit_stmt(stmt),
            }
        }
        if !is_function_body {
            self.exit_scope();
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value, .. } => self.lower_assign(target, value),
            Stmt::Expr(expr) => {
                if let Some(expr) = expr {
                    self.visit_expr(expr);
                }
            }
            Stmt::Block(block) => self.visit_block(block, false),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.lower_if(cond, then_branch, else_branch.as_deref()),
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => self.lower_for(init.as_ref(), cond.as_ref(), step.as_ref(), body),
            Stmt::Break { .. } => {
                if let Some(target) = self.break_stack.last().cloned() {
                    self.emit(Opcode::Jump, Some(Operand::Label(target)), None, None);
                }
            }
            Stmt::Continue { .. } => {
                if let Some(target) = self.continue_stack.last().cloned() {
                    self.emit(Opcode::Jump, Some(Operand::Label(target)), None, None);
                }
            }
            Stmt::Return { value, .. } => {
                let result = value.as_ref().map(|expr| self.visit_expr(expr));
                self.emit(Opcode::Ret, result, None, None);
            }
            Stmt::Printf { format, args, .. } => self.lower_printf(format, args),
        }
    }

    fn lower_assign(&mut self, target: &LVal, value: &Expr) {
        let lhs = self.visit_lval(target, true);
        let rhs = self.visit_expr(value);
        if lhs.is_temp() {
            // The L-value lowered to an element address.
            self.emit(Opcode::Store, Some(rhs), Some(lhs), Some(Operand::Imm(0)));
        } else {
            self.emit(Opcode::Assign, Some(lhs), Some(rhs), None);
        }
    }

    fn lower_if(&mut self, cond: &Cond, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        let l_true = self.new_label();
        let l_false = self.new_label();
        let l_next = self.new_label();

        if else_branch.is_some() {
            self.visit_cond(cond, &l_true, &l_false);
        } else {
            self.visit_cond(cond, &l_true, &l_next);
        }
        self.emit_label(&l_true);
        self.visit_stmt(then_branch);
        if let Some(else_branch) = else_branch {
            self.emit(Opcode::Jump, Some(Operand::Label(l_next.clone())), None, None);
            self.emit_label(&l_false);
            self.visit_stmt(else_branch);
        }
        self.emit_label(&l_next);
    }

    fn lower_for(
        &mut self,
        init: Option<&ForStmt>,
        cond: Option<&Cond>,
        step: Option<&ForStmt>,
        body: &Stmt,
    ) {
        let l_start = self.new_label();
        let l_body = self.new_label();
        let l_step = self.new_label();
        let l_end = self.new_label();

        if let Some(init) = init {
            self.visit_for_stmt(init);
        }
        self.emit_label(&l_start);
        match cond {
            Some(cond) => self.visit_cond(cond, &l_body, &l_end),
            None => self.emit(Opcode::Jump, Some(Operand::Label(l_body.clone())), None, None),
        }
        self.emit_label(&l_body);

        self.break_stack.push(l_end.clone());
        self.continue_stack.push(l_step.clone());
        self.visit_stmt(body);
        self.break_stack.pop();
        self.continue_stack.pop();

        self.emit_label(&l_step);
        if let Some(step) = step {
            self.visit_for_stmt(step);
        }
        let back = if cond.is_some() { &l_start } else { &l_body };
        self.emit(Opcode::Jump, Some(Operand::Label(back.clone())), None, None);
        self.emit_label(&l_end);
    }

    fn visit_for_stmt(&mut self, for_stmt: &ForStmt) {
        for (target, value) in &for_stmt.assigns {
            self.lower_assign(target, value);
        }
    }

    /// Walks the format string left to right: literal runs (with `\n`
    /// recognized) intern a string constant and print as one
    /// `printstr`; each `%d` consumes the next pre-computed argument.
    fn lower_printf(&mut self, format: &str, args: &[Expr]) {
        let values: Vec<Operand> = args.iter().map(|arg| self.visit_expr(arg)).collect();

        let raw = format.trim_matches('"');
        let chars: Vec<char> = raw.chars().collect();
        let mut buffer = String::new();
        let mut arg_index = 0;
        let mut i = 0;
        while i < chars.len() {
            if chars[i] == '%' && chars.get(i + 1) == Some(&'d') {
                if !buffer.is_empty() {
                    let label = self.add_string_constant(std::mem::take(&mut buffer));
                    self.emit(Opcode::PrintStr, Some(Operand::Label(label)), None, None);
                }
                if let Some(value) = values.get(arg_index) {
                    self.emit(Opcode::PrintInt, Some(value.clone()), None, None);
                    arg_index += 1;
                }
                i += 2;
            } else if chars[i] == '\\' && chars.get(i + 1) == Some(&'n') {
                buffer.push('\n');
                i += 2;
            } else {
                buffer.push(chars[i]);
                i += 1;
            }
        }
        if !buffer.is_empty() {
            let label = self.add_string_constant(buffer);
            self.emit(Opcode::PrintStr, Some(Operand::Label(label)), None, None);
        }
    }

    // === expressions ===

    fn visit_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Number(v) => Operand::Imm(*v),
            Expr::LVal(lval) => self.visit_lval(lval, false),
            Expr::Call { ident, args, .. } => self.lower_call(ident, args),
            Expr::Unary { op, operand } => {
                let src = self.visit_expr(operand);
                match op {
                    UnaryOp::Plus => src,
                    UnaryOp::Neg => {
                        let result = self.new_temp();
                        self.emit(Opcode::Neg, Some(result.clone()), Some(src), None);
                        result
                    }
                    UnaryOp::Not => {
                        let result = self.new_temp();
                        self.emit(Opcode::Not, Some(result.clone()), Some(src), None);
                        result
                    }
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.visit_expr(lhs);
                let right = self.visit_expr(rhs);
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Sub => Opcode::Sub,
                    BinaryOp::Mul => Opcode::Mul,
                    BinaryOp::Div => Opcode::Div,
                    BinaryOp::Mod => Opcode::Mod,
                    BinaryOp::Lt => Opcode::Lt,
                    BinaryOp::Gt => Opcode::Gt,
                    BinaryOp::Le => Opcode::Le,
                    BinaryOp::Ge => Opcode::Ge,
                    BinaryOp::Eq => Opcode::Eq,
                    BinaryOp::Ne => Opcode::Neq,
                };
                let result = self.new_temp();
                self.emit(opcode, Some(result.clone()), Some(left), Some(right));
                result
            }
        }
    }

    fn lower_call(&mut self, ident: &str, args: &[Expr]) -> Operand {
        if ident == "getint" {
            let result = self.new_temp();
            self.emit(Opcode::GetInt, Some(result.clone()), None, None);
            return result;
        }
        // Each argument is pushed as soon as it is computed, so a
        // nested call cannot clobber already-evaluated arguments.
        for arg in args {
            let value = self.visit_expr(arg);
            self.emit(Opcode::Param, Some(value), None, None);
        }
        let result = self.new_temp();
        self.emit(
            Opcode::Call,
            Some(result.clone()),
            Some(Operand::Label(ident.to_owned())),
            None,
        );
        result
    }

    /// L-value lowering with a polarity flag.
    ///
    /// Value mode returns an operand holding the value; address mode
    /// returns either the plain symbol (scalars are written directly by
    /// `assign`) or a temporary holding the element address (the caller
    /// emits the `store`). A bare array name always yields its address.
    fn visit_lval(&mut self, lval: &LVal, is_address: bool) -> Operand {
        let id = self
            .get_var(&lval.ident)
            .unwrap_or_else(|| panic!("lowering: `{}` did not resolve to an active symbol", lval.ident));
        let sym_op = self.var_operand(id);

        if let Some(index) = &lval.index {
            let index = self.visit_expr(index);
            let offset = self.new_temp();
            self.emit(
                Opcode::Mul,
                Some(offset.clone()),
                Some(index),
                Some(Operand::Imm(4)),
            );
            let addr = self.new_temp();
            self.emit(
                Opcode::GetAddr,
                Some(addr.clone()),
                Some(sym_op),
                Some(offset),
            );
            if is_address {
                addr
            } else {
                let value = self.new_temp();
                self.emit(
                    Opcode::Load,
                    Some(value.clone()),
                    Some(addr),
                    Some(Operand::Imm(0)),
                );
                value
            }
        } else if self.table.symbol(id).is_array() {
            let addr = self.new_temp();
            self.emit(
                Opcode::GetAddr,
                Some(addr.clone()),
                Some(sym_op),
                Some(Operand::Imm(0)),
            );
            addr
        } else {
            sym_op
        }
    }

    // === short-circuit conditions ===

    /// Lowers a condition into label-directed control flow. The two
    /// continuation labels are parameters, not state.
    fn visit_cond(&mut self, cond: &Cond, true_label: &str, false_label: &str) {
        match cond {
            Cond::Or(lhs, rhs) => {
                let check_rhs = self.new_label();
                self.visit_cond(lhs, true_label, &check_rhs);
                self.emit_label(&check_rhs);
                self.visit_cond(rhs, true_label, false_label);
            }
            Cond::And(lhs, rhs) => {
                let check_rhs = self.new_label();
                self.visit_cond(lhs, &check_rhs, false_label);
                self.emit_label(&check_rhs);
                self.visit_cond(rhs, true_label, false_label);
            }
            Cond::Expr(expr) => {
                let value = self.visit_expr(expr);
                self.emit(
                    Opcode::Beqz,
                    Some(value),
                    Some(Operand::Label(false_label.to_owned())),
                    None,
                );
                self.emit(
                    Opcode::Jump,
                    Some(Operand::Label(true_label.to_owned())),
                    None,
                    None,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{analyze, lex, parse};

    fn lower(source: &str) -> IrModule {
        let tokens = lex::lex(source);
        assert!(tokens.is_clean(), "lexer diagnostics in test input");
        let res = tokens.and_then(parse::parse);
        assert!(res.is_clean(), "parser diagnostics in test input");
        let unit = res.into_value();
        let sema = analyze::analyze(&unit);
        assert!(sema.is_clean(), "semantic diagnostics in test input");
        build_ir_from_ast(&unit, sema.value())
    }

    fn text_lines(module: &IrModule) -> Vec<String> {
        module.instrs.iter().map(|i| i.to_string()).collect()
    }

    #[test]
    fn short_circuit_or_shape() {
        let module = lower(
            "int main() {\n    int a;\n    int b;\n    a = 1;\n    b = 0;\n    if (a || b) a = 2;\n    return a;\n}",
        );
        let lines = text_lines(&module);
        // Expected order per the short-circuit contract: eval a,
        // BEQZ -> L_rhs, JUMP -> L_true, L_rhs:, eval b,
        // BEQZ -> L_next, JUMP -> L_true, L_true:, body, L_next:.
        let beqz_a = lines.iter().position(|l| l == "BEQZ a_2, L3, -").unwrap();
        assert_eq!(lines[beqz_a + 1], "JUMP L0, -, -");
        assert_eq!(lines[beqz_a + 2], "L3:");
        assert_eq!(lines[beqz_a + 3], "BEQZ b_2, L2, -");
        assert_eq!(lines[beqz_a + 4], "JUMP L0, -, -");
        assert_eq!(lines[beqz_a + 5], "L0:");
    }

    #[test]
    fn indexed_lvalue_store_and_load() {
        let module = lower(
            "int main() {\n    int a[10];\n    int i;\n    i = 1;\n    a[i] = 5;\n    return a[i];\n}",
        );
        let lines = text_lines(&module);
        // a[i] = 5 → MUL t, i, #4; GET_ADDR t', a, t; STORE #5, t', #0
        let mul = lines.iter().position(|l| l.starts_with("MUL t0, i_2, #4")).unwrap();
        assert_eq!(lines[mul + 1], "GET_ADDR t1, a_2, t0");
        assert_eq!(lines[mul + 2], "STORE #5, t1, #0");
        // reading a[i] loads through a fresh address temp
        assert!(lines.iter().any(|l| l.starts_with("LOAD t4, t3, #0")));
    }

    #[test]
    fn for_loop_label_discipline() {
        let module = lower(
            "int main() {\n    int i;\n    int s;\n    s = 0;\n    for (i = 0; i < 3; i = i + 1) {\n        s = s + i;\n    }\n    return s;\n}",
        );
        let lines = text_lines(&module);
        // L0 start, L1 body, L2 step, L3 end; condition branches to
        // body/end, the backedge jumps to start.
        assert!(lines.contains(&"L0:".to_owned()));
        assert!(lines.contains(&"BEQZ t0, L3, -".to_owned()));
        let step = lines.iter().position(|l| l == "L2:").unwrap();
        // step label, i+1 into a temp, write-back, backedge, end label.
        assert_eq!(lines[step + 3], "JUMP L0, -, -");
        assert_eq!(lines[step + 4], "L3:");
    }

    #[test]
    fn break_and_continue_target_the_right_labels() {
        let module = lower(
            "int main() {\n    int i;\n    for (i = 0; i < 9; i = i + 1) {\n        if (i == 2) { continue; }\n        if (i == 5) { break; }\n    }\n    return i;\n}",
        );
        let lines = text_lines(&module);
        // continue → step label (L2), break → end label (L3).
        assert!(lines.contains(&"JUMP L2, -, -".to_owned()));
        assert!(lines.contains(&"JUMP L3, -, -".to_owned()));
    }

    #[test]
    fn printf_interleaves_strings_and_ints() {
        let module = lower(
            "int main() {\n    printf(\"a=%d, b=%d\\n\", 1, 2);\n    return 0;\n}",
        );
        let lines = text_lines(&module);
        assert_eq!(module.string_constants.len(), 3);
        assert_eq!(module.string_constants[0].1, "a=");
        assert_eq!(module.string_constants[1].1, ", b=");
        assert_eq!(module.string_constants[2].1, "\n");
        let first = lines.iter().position(|l| l == "PRINTSTR str_0, -, -").unwrap();
        assert_eq!(lines[first + 1], "PRINTINT #1, -, -");
        assert_eq!(lines[first + 2], "PRINTSTR str_1, -, -");
        assert_eq!(lines[first + 3], "PRINTINT #2, -, -");
        assert_eq!(lines[first + 4], "PRINTSTR str_2, -, -");
    }

    #[test]
    fn shadowed_initializer_reads_outer_binding() {
        let module = lower("int a = 7;\nint main() {\n    int a = a + 1;\n    return a;\n}");
        let lines = text_lines(&module);
        // The ADD reads the global `a`, the ASSIGN writes the local.
        assert!(lines.iter().any(|l| l.starts_with("ADD t0, a, #1")));
        assert!(lines.iter().any(|l| l == "ASSIGN a_2, t0"));
    }

    #[test]
    fn frame_table_has_params_locals_and_temps() {
        let module = lower(
            "int f(int a, int b) {\n    int c;\n    c = a + b;\n    return c;\n}\nint main() { return f(1, 2); }",
        );
        let frame = &module.frames["f"];
        assert_eq!(frame.params, ["a_2", "b_2"]);
        assert_eq!(frame.slots["a_2"].offset, 12);
        assert_eq!(frame.slots["b_2"].offset, 16);
        assert_eq!(frame.slots["c_2"].offset, 20);
        // base 12 + frame 12 = 24, then one temp for a+b.
        assert!(frame.slots["t0"].is_temp);
        assert_eq!(frame.slots["t0"].offset, 24);
        assert_eq!(frame.frame_size, 28);
        assert_eq!(frame.frame_size % 4, 0);
    }

    #[test]
    fn temps_are_unique_and_monotonic() {
        let module = lower(
            "int main() {\n    int x;\n    x = 1 + 2 * 3 - 4;\n    return x;\n}",
        );
        let mut seen = Vec::new();
        for instr in &module.instrs {
            if let Some(Operand::Temp(n)) = &instr.result {
                if instr.op.defines_result() {
                    seen.push(*n);
                }
            }
        }
        let mut sorted = seen.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(seen, sorted);
    }

    #[test]
    #[should_panic(expected = "missing from the symbol table")]
    fn scope_divergence_panics() {
        // Hand-build a table whose scopes do not match the walk.
        let table = SymbolTable::new();
        let unit = CompUnit {
            items: vec![Item::Main(MainDef {
                body: Block {
                    items: vec![BlockItem::Stmt(Stmt::Block(Block {
                        items: vec![],
                        line: 2,
                        end_line: 2,
                    }))],
                    line: 1,
                    end_line: 3,
                },
                line: 1,
            })],
        };
        build_ir_from_ast(&unit, &table);
    }
}
