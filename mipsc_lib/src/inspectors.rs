//! Human-readable dumps of intermediate structures: the AST tree, the
//! formatted symbol table, the compact symbol list and the per-function
//! stack frame layout.

use std::fmt::Write;

use crate::ast::*;
use crate::ir::IrModule;
use crate::symbols::{Symbol, SymbolTable};

// === tree.txt ===

pub fn inspect_ast(unit: &CompUnit) -> String {
    let mut w = TreeWriter::default();
    w.node(0, "CompUnit", 0, "");
    for item in &unit.items {
        match item {
            Item::Decl(decl) => w.decl(1, decl),
            Item::Func(func) => w.func(1, func),
            Item::Main(main) => w.main(1, main),
        }
    }
    w.out
}

#[derive(Default)]
struct TreeWriter {
    out: String,
}

impl TreeWriter {
    fn node(&mut self, depth: usize, name: &str, line: u32, value: &str) {
        let indent = "  ".repeat(depth);
        let _ = write!(self.out, "{indent}|- {name}");
        if line > 0 {
            let _ = write!(self.out, " (Line: {line})");
        }
        if !value.is_empty() {
            let shown = value.replace('\n', "\\n");
            let _ = write!(self.out, " [Value: {shown}]");
        }
        self.out.push('\n');
    }

    fn decl(&mut self, depth: usize, decl: &Decl) {
        let name = match (decl.is_const, decl.is_static) {
            (true, _) => "ConstDecl",
            (false, true) => "StaticVarDecl",
            (false, false) => "VarDecl",
        };
        self.node(depth, name, decl.line, "");
        for def in &decl.defs {
            self.node(depth + 1, "VarDef", def.line, &def.ident);
            if let Some(len) = &def.array_len {
                self.node(depth + 2, "ArrayLen", 0, "");
                self.expr(depth + 3, len);
            }
            match &def.init {
                Some(InitVal::Single(expr)) => {
                    self.node(depth + 2, "InitVal", 0, "");
                    self.expr(depth + 3, expr);
                }
                Some(InitVal::List(values)) => {
                    self.node(depth + 2, "InitValList", 0, "");
                    for expr in values {
                        self.expr(depth + 3, expr);
                    }
                }
                None => {}
            }
        }
    }

    fn func(&mut self, depth: usize, func: &FuncDef) {
        let kind = if func.returns_int { "int" } else { "void" };
        self.node(depth, "FuncDef", func.line, &format!("{kind} {}", func.ident));
        for param in &func.params {
            let value = if param.is_array {
                format!("{}[]", param.ident)
            } else {
                param.ident.clone()
            };
            self.node(depth + 1, "FuncFParam", param.line, &value);
        }
        self.block(depth + 1, &func.body);
    }

    fn main(&mut self, depth: usize, main: &MainDef) {
        self.node(depth, "MainFuncDef", main.line, "");
        self.block(depth + 1, &main.body);
    }

    fn block(&mut self, depth: usize, block: &Block) {
        self.node(depth, "Block", block.line, "");
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.decl(depth + 1, decl),
                BlockItem::Stmt(stmt) => self.stmt(depth + 1, stmt),
            }
        }
    }

    fn stmt(&mut self, depth: usize, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value, line } => {
                self.node(depth, "AssignStmt", *line, "");
                self.lval(depth + 1, target);
                self.expr(depth + 1, value);
            }
            Stmt::Expr(None) => self.node(depth, "EmptyStmt", 0, ""),
            Stmt::Expr(Some(expr)) => {
                self.node(depth, "ExpStmt", 0, "");
                self.expr(depth + 1, expr);
            }
            Stmt::Block(block) => self.block(depth, block),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                line,
            } => {
                self.node(depth, "IfStmt", *line, "");
                self.cond(depth + 1, cond);
                self.stmt(depth + 1, then_branch);
                if let Some(else_branch) = else_branch {
                    self.node(depth + 1, "Else", 0, "");
                    self.stmt(depth + 2, else_branch);
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                line,
            } => {
                self.node(depth, "ForLoop", *line, "");
                if let Some(init) = init {
                    self.for_stmt(depth + 1, "ForInit", init);
                }
                if let Some(cond) = cond {
                    self.cond(depth + 1, cond);
                }
                if let Some(step) = step {
                    self.for_stmt(depth + 1, "ForStep", step);
                }
                self.stmt(depth + 1, body);
            }
            Stmt::Break { line } => self.node(depth, "BreakStmt", *line, ""),
            Stmt::Continue { line } => self.node(depth, "ContinueStmt", *line, ""),
            Stmt::Return { value, line } => {
                self.node(depth, "ReturnStmt", *line, "");
                if let Some(value) = value {
                    self.expr(depth + 1, value);
                }
            }
            Stmt::Printf { format, args, line } => {
                self.node(depth, "PrintfStmt", *line, format);
                for arg in args {
                    self.expr(depth + 1, arg);
                }
            }
        }
    }

    fn for_stmt(&mut self, depth: usize, name: &str, for_stmt: &ForStmt) {
        self.node(depth, name, for_stmt.line, "");
        for (target, value) in &for_stmt.assigns {
            self.lval(depth + 1, target);
            self.expr(depth + 1, value);
        }
    }

    fn cond(&mut self, depth: usize, cond: &Cond) {
        match cond {
            Cond::Or(lhs, rhs) => {
                self.node(depth, "LOrExp", 0, "||");
                self.cond(depth + 1, lhs);
                self.cond(depth + 1, rhs);
            }
            Cond::And(lhs, rhs) => {
                self.node(depth, "LAndExp", 0, "&&");
                self.cond(depth + 1, lhs);
                self.cond(depth + 1, rhs);
            }
            Cond::Expr(expr) => self.expr(depth, expr),
        }
    }

    fn lval(&mut self, depth: usize, lval: &LVal) {
        self.node(depth, "LVal", lval.line, &lval.ident);
        if let Some(index) = &lval.index {
            self.expr(depth + 1, index);
        }
    }

    fn expr(&mut self, depth: usize, expr: &Expr) {
        match expr {
            Expr::Number(v) => self.node(depth, "Number", 0, &v.to_string()),
            Expr::LVal(lval) => self.lval(depth, lval),
            Expr::Call { ident, args, line } => {
                self.node(depth, "Call", *line, ident);
                for arg in args {
                    self.expr(depth + 1, arg);
                }
            }
            Expr::Unary { op, operand } => {
                let name = match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                self.node(depth, "UnaryExp", 0, name);
                self.expr(depth + 1, operand);
            }
            Expr::Binary { op, lhs, rhs } => {
                let name = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Mod => "%",
                    BinaryOp::Lt => "<",
                    BinaryOp::Gt => ">",
                    BinaryOp::Le => "<=",
                    BinaryOp::Ge => ">=",
                    BinaryOp::Eq => "==",
                    BinaryOp::Ne => "!=",
                };
                self.node(depth, "BinaryExp", 0, name);
                self.expr(depth + 1, lhs);
                self.expr(depth + 1, rhs);
            }
        }
    }
}

// === table.txt ===

/// Formatted symbol table with storage layout, one section per scope.
/// `main` is omitted, matching the established dump format.
pub fn format_symbol_table(table: &SymbolTable) -> String {
    let all = table.all_symbols();
    let mut out = String::new();
    out.push_str("========== Symbol Table (with MIPS layout) ==========\n");
    let _ = writeln!(out, "Total symbols: {}\n", all.len());

    let mut current_scope = 0;
    for symbol in &all {
        if symbol.name == "main" && symbol.is_function() {
            continue;
        }
        if symbol.scope != current_scope {
            current_scope = symbol.scope;
            let kind = if current_scope == SymbolTable::GLOBAL_SCOPE {
                "global"
            } else {
                "local"
            };
            let _ = writeln!(out, "\n--- Scope {current_scope} ({kind}) ---");
        }
        format_symbol(&mut out, symbol);
    }

    out.push_str("\nSymbols per scope:\n");
    let mut counts: Vec<(u32, usize)> = Vec::new();
    for symbol in &all {
        match counts.iter_mut().find(|(scope, _)| *scope == symbol.scope) {
            Some((_, n)) => *n += 1,
            None => counts.push((symbol.scope, 1)),
        }
    }
    for (scope, count) in counts {
        let _ = writeln!(out, "  scope {scope}: {count} symbol(s)");
    }
    out.push_str("============================\n");
    out
}

fn format_symbol(out: &mut String, symbol: &Symbol) {
    let _ = writeln!(out, "  {}:", symbol.name);
    let _ = writeln!(out, "    type: {}", symbol.kind.type_name());
    let _ = writeln!(out, "    line: {}", symbol.line);
    let _ = writeln!(out, "    size: {} bytes", symbol.size);

    if symbol.is_function() {
        let _ = writeln!(out, "    stack frame size: {}", symbol.stack_frame_size);
    } else if symbol.scope == SymbolTable::GLOBAL_SCOPE || symbol.kind.is_static() {
        let label = symbol.label.as_deref().unwrap_or(&symbol.name);
        let _ = writeln!(out, "    data label: {label} (.data)");
    } else {
        let _ = writeln!(out, "    stack offset: {} (from $fp)", symbol.offset);
    }
    let _ = writeln!(out, "    parameter: {}", if symbol.is_param { "yes" } else { "no" });

    if symbol.is_array() {
        let len = if symbol.array_len > 0 {
            symbol.array_len.to_string()
        } else {
            "unknown".to_owned()
        };
        let _ = writeln!(out, "    array length: {len}");
        if !symbol.array_init.is_empty() {
            let values: Vec<String> = symbol.array_init.iter().map(i32::to_string).collect();
            let _ = writeln!(out, "    initializer: [{}]", values.join(", "));
        }
    }
    if symbol.kind.is_const() && !symbol.is_array() {
        let _ = writeln!(out, "    value: {}", symbol.value);
    }
    if symbol.is_function() && !symbol.params.is_empty() {
        let _ = writeln!(out, "    parameters ({}):", symbol.params.len());
        for (i, param) in symbol.params.iter().enumerate() {
            let kind = if param.is_array { "array" } else { "int" };
            let _ = writeln!(out, "      {}. {}: {kind}", i + 1, param.name);
        }
    }
    out.push('\n');
}

// === symbol.txt ===

/// One line per symbol: `<scope> <name> <typeName>`, sorted by scope
/// then declaration line.
pub fn compact_symbol_list(table: &SymbolTable) -> String {
    let mut out = String::new();
    for symbol in table.all_symbols() {
        let _ = writeln!(out, "{} {} {}", symbol.scope, symbol.name, symbol.kind.type_name());
    }
    out
}

// === mips_stack_layout.txt ===

/// Diagnostic dump of the `.data` residents and every function's frame
/// layout, sorted by offset.
pub fn format_stack_layout(table: &SymbolTable, module: &IrModule) -> String {
    let mut out = String::new();

    out.push_str("=== Globals and statics (.data) ===\n");
    let mut any = false;
    for symbol in table.all_symbols() {
        let is_global = symbol.scope == SymbolTable::GLOBAL_SCOPE;
        if symbol.is_function() || !(is_global || symbol.kind.is_static()) {
            continue;
        }
        any = true;
        let label = symbol.label.as_deref().unwrap_or(&symbol.name);
        let place = if is_global {
            "Global".to_owned()
        } else {
            format!("Static (scope {})", symbol.scope)
        };
        let _ = writeln!(
            out,
            "    {:<16} {:<24} {:<6} {:<16} {place}",
            symbol.name,
            label,
            symbol.size,
            symbol.kind.type_name()
        );
    }
    if !any {
        out.push_str("    (none)\n");
    }
    out.push('\n');

    out.push_str("=== Stack frame layout per function ===\n");
    out.push_str("Offsets are relative to $fp; the emitted address is -offset($fp).\n\n");

    let mut names: Vec<&String> = module.frames.keys().collect();
    names.sort();
    for name in names {
        let frame = &module.frames[name];
        let _ = writeln!(out, "Function: {name}");
        let _ = writeln!(out, "  Total frame size: {} bytes", frame.frame_size);
        let _ = writeln!(out, "    {:<16} {:<8} {:<8} Kind", "Name", "Offset", "Size");
        let _ = writeln!(out, "    {:<16} {:<8} {:<8} System", "$ra", 4, 4);
        let _ = writeln!(out, "    {:<16} {:<8} {:<8} System", "$fp (old)", 8, 4);

        let mut slots: Vec<_> = frame.slots.values().collect();
        slots.sort_by_key(|slot| slot.offset);
        for slot in slots {
            let kind = if slot.is_param {
                "Param"
            } else if slot.is_temp {
                "Temp"
            } else {
                "Local"
            };
            let _ = writeln!(
                out,
                "    {:<16} {:<8} {:<8} {kind}",
                slot.name, slot.offset, slot.size
            );
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{analyze, lex, lower_ast, parse};

    fn pipeline(source: &str) -> (CompUnit, SymbolTable, IrModule) {
        let res = lex::lex(source).and_then(parse::parse);
        assert!(res.is_clean());
        let unit = res.into_value();
        let sema = analyze::analyze(&unit);
        assert!(sema.is_clean());
        let table = sema.into_value();
        let module = lower_ast::build_ir_from_ast(&unit, &table);
        (unit, table, module)
    }

    #[test]
    fn tree_dump_nests_by_indentation() {
        let (unit, _, _) = pipeline("int main() {\n    int a = 1;\n    return a;\n}");
        let tree = inspect_ast(&unit);
        assert!(tree.starts_with("|- CompUnit"));
        assert!(tree.contains("  |- MainFuncDef (Line: 1)"));
        assert!(tree.contains("|- VarDef (Line: 2) [Value: a]"));
        assert!(tree.contains("|- ReturnStmt (Line: 3)"));
    }

    #[test]
    fn compact_list_is_scope_then_line_ordered() {
        let (_, table, _) = pipeline(
            "int g;\nint f(int p) { return p; }\nint main() { int x; x = 0; return x; }",
        );
        let list = compact_symbol_list(&table);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines[0], "1 g Int");
        assert_eq!(lines[1], "1 f IntFunc");
        assert_eq!(lines[2], "1 main IntFunc");
        assert_eq!(lines[3], "2 p Int");
        assert_eq!(lines[4], "3 x Int");
    }

    #[test]
    fn table_dump_shows_layout_and_skips_main() {
        let (_, table, _) = pipeline("int g = 4;\nint main() { return g; }");
        let dump = format_symbol_table(&table);
        assert!(dump.contains("--- Scope 1 (global) ---"));
        assert!(dump.contains("data label: g (.data)"));
        assert!(!dump.contains("  main:\n"));
    }

    #[test]
    fn stack_layout_lists_frame_slots_in_offset_order() {
        let (_, table, module) =
            pipeline("int f(int a) {\n    int b;\n    b = a + 1;\n    return b;\n}\nint main() { return f(2); }");
        let dump = format_stack_layout(&table, &module);
        let f_section = &dump[dump.find("Function: f").unwrap()..];
        let a_pos = f_section.find("a_2").unwrap();
        let b_pos = f_section.find("b_2").unwrap();
        let t_pos = f_section.find("t0").unwrap();
        assert!(a_pos < b_pos && b_pos < t_pos);
        assert!(f_section.contains("Param"));
        assert!(f_section.contains("Temp"));
    }
}
