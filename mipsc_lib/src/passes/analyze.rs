//! Semantic analysis: populates the symbol table (scopes, storage
//! layout, labels, constant values) and reports the `b`–`m` family of
//! diagnostics.
//!
//! Scope IDs are handed out densely in visit order; the IR generator
//! later replays the same walk and consumes the same IDs, so any
//! change to the scope entry rules here must be mirrored there.

use log::debug;

use crate::ast::*;
use crate::diagnostic::{AggregateResult, Code, Diagnostic};
use crate::symbols::{ParamInfo, Symbol, SymbolKind, SymbolTable};

pub fn analyze(unit: &CompUnit) -> AggregateResult<SymbolTable> {
    let mut analyzer = Analyzer::new();
    analyzer.visit_comp_unit(unit);
    AggregateResult::new(analyzer.table, analyzer.diagnostics)
}

struct Analyzer {
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    /// `Some(returns_int)` while inside a function definition.
    current_function: Option<bool>,
    loop_depth: u32,
    /// Running byte offset of the current function's local region.
    local_offset: i32,
}

impl Analyzer {
    fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            diagnostics: Vec::new(),
            current_function: None,
            loop_depth: 0,
            local_offset: 0,
        }
    }

    /// At most one diagnostic per source line.
    fn report(&mut self, line: u32, code: Code, message: impl Into<String>) {
        if self.diagnostics.iter().any(|d| d.line() == line) {
            return;
        }
        self.diagnostics.push(Diagnostic::new(line, code, message));
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
            self.visit_var_def(def, decl.is_const, decl.is_static);
        }
    }

    fn visit_var_def(&mut self, def: &VarDef, is_const: bool, is_static: bool) {
        // The initializer is checked (and its names resolved) before
        // the new symbol exists: `int a = a + 1;` reads the outer `a`.
        let mut init_values = Vec::new();
        match &def.init {
            Some(InitVal::Single(expr)) => {
                self.visit_expr(expr);
                init_values.push(self.eval_expr(expr).unwrap_or(0));
            }
            Some(InitVal::List(values)) => {
                for expr in values {
                    self.visit_expr(expr);
                    init_values.push(self.eval_expr(expr).unwrap_or(0));
                }
            }
            None => {}
        }

        let array_len = def.array_len.as_ref().map(|len_expr| {
            self.visit_expr(len_expr);
            self.eval_expr(len_expr).filter(|&v| v > 0).unwrap_or(-1)
        });

        let is_array = array_len.is_some();
        let kind = match (is_const, is_static, is_array) {
            (true, _, false) => SymbolKind::ConstInt,
            (true, _, true) => SymbolKind::ConstIntArray,
            (false, true, false) => SymbolKind::StaticInt,
            (false, true, true) => SymbolKind::StaticIntArray,
            (false, false, false) => SymbolKind::Int,
            (false, false, true) => SymbolKind::IntArray,
        };

        let scope = self.table.current_scope_id();
        let mut symbol = Symbol::new(&def.ident, kind, scope, def.line);
        if let Some(len) = array_len {
            symbol.array_len = len;
        }
        symbol.size = symbol.byte_size();

        let is_global = scope == SymbolTable::GLOBAL_SCOPE;
        if is_static && !is_global {
            symbol.label = Some(format!("static_{}_{}", def.ident, scope));
        }

        // Constant values survive into the table: const scalars for
        // folding, global/static initializers for `.data` emission.
        if is_array {
            if is_const || is_global || is_static {
                symbol.array_init = init_values;
            }
        } else if let Some(&value) = init_values.first() {
            symbol.value = value;
        }

        // Layout: non-static locals claim the next frame slot.
        if !is_global && !is_static {
            symbol.offset = self.local_offset;
            self.local_offset += symbol.size;
        }

        if self.table.add_symbol(symbol).is_err() {
            self.report(def.line, Code::Redefined, format!("`{}` is already defined", def.ident));
        }
    }

    // === functions ===

    fn visit_func_def(&mut self, func: &FuncDef) {
        let mut func_symbol = Symbol::new(
            &func.ident,
            if func.returns_int {
                SymbolKind::IntFunc
            } else {
                SymbolKind::VoidFunc
            },
            SymbolTable::GLOBAL_SCOPE,
            func.line,
        );

        self.current_function = Some(func.returns_int);
        self.local_offset = 0;

        // Parameters and the body share one scope.
        let scope = self.table.enter_scope();
        debug!("function `{}` gets scope {scope}", func.ident);

        for param in &func.params {
            let kind = if param.is_array {
                SymbolKind::IntArray
            } else {
                SymbolKind::Int
            };
            let mut symbol = Symbol::new(&param.ident, kind, scope, param.line);
            symbol.is_param = true;
            symbol.size = 4;
            symbol.offset = self.local_offset;
            self.local_offset += 4;
            if self.table.add_symbol(symbol).is_err() {
                self.report(
                    param.line,
                    Code::Redefined,
                    format!("parameter `{}` is already defined", param.ident),
                );
            }
            func_symbol.params.push(ParamInfo {
                name: param.ident.clone(),
                is_array: param.is_array,
            });
        }

        // Added after the parameters so their descriptors are complete,
        // but before the body so recursive calls resolve.
        let func_id = self.table.add_symbol(func_symbol);
        if func_id.is_err() {
            self.report(
                func.line,
                Code::Redefined,
                format!("function `{}` is already defined", func.ident),
            );
        }

        self.visit_block(&func.body, true);

        if func.returns_int && can_fall_through_block(&func.body) {
            self.report(
                func.body.end_line,
                Code::MissingReturn,
                format!("`{}` can reach the end of its body without returning", func.ident),
            );
        }

        if let Ok(id) = func_id {
            self.table.symbol_mut(id).stack_frame_size = self.local_offset;
        }
        self.table.exit_scope();
        self.current_function = None;
    }

    fn visit_main_def(&mut self, main: &MainDef) {
        let main_symbol = Symbol::new("main", SymbolKind::IntFunc, SymbolTable::GLOBAL_SCOPE, main.line);

        self.current_function = Some(true);
        self.local_offset = 0;

        let scope = self.table.enter_scope();
        debug!("`main` gets scope {scope}");

        let main_id = self.table.add_symbol(main_symbol);
        if main_id.is_err() {
            self.report(main.line, Code::Redefined, "`main` is already defined");
        }

        self.visit_block(&main.body, true);

        if can_fall_through_block(&main.body) {
            self.report(
                main.body.end_line,
                Code::MissingReturn,
                "`main` can reach the end of its body without returning",
            );
        }

        if let Ok(id) = main_id {
            self.table.symbol_mut(id).stack_frame_size = self.local_offset;
        }
        self.table.exit_scope();
        self.current_function = None;
    }

    // === statements ===

    fn visit_block(&mut self, block: &Block, is_function_body: bool) {
        if !is_function_body {
            self.table.enter_scope();
        }
        for item in &block.items {
            match item {
                BlockItem::Decl(decl) => self.visit_decl(decl),
                BlockItem::Stmt(stmt) => self.visit_stmt(stmt),
            }
        }
        if !is_function_body {
            self.table.exit_scope();
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value, line } => {
                self.check_assign_target(target, *line);
                self.visit_expr(value);
            }
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
            } => {
                self.visit_cond(cond);
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
                ..
            } => {
                if let Some(init) = init {
                    self.visit_for_stmt(init);
                }
                if let Some(cond) = cond {
                    self.visit_cond(cond);
                }
                if let Some(step) = step {
                    self.visit_for_stmt(step);
                }
                self.loop_depth += 1;
                self.visit_stmt(body);
                self.loop_depth -= 1;
            }
            Stmt::Break { line } | Stmt::Continue { line } => {
                if self.loop_depth == 0 {
                    self.report(*line, Code::JumpOutsideLoop, "`break`/`continue` outside of a loop");
                }
            }
            Stmt::Return { value, line } => {
                if let Some(value) = value {
                    self.visit_expr(value);
                    if self.current_function == Some(false) {
                        self.report(
                            *line,
                            Code::ValueReturnInVoid,
                            "`return` with a value in a void function",
                        );
                    }
                }
            }
            Stmt::Printf { format, args, line } => {
                let specifiers = format.matches("%d").count();
                if specifiers != args.len() {
                    self.report(
                        *line,
                        Code::PrintfArgMismatch,
                        format!("format expects {specifiers} arguments, {} given", args.len()),
                    );
                }
                for arg in args {
                    self.visit_expr(arg);
                }
            }
        }
    }

    fn visit_for_stmt(&mut self, for_stmt: &ForStmt) {
        for (target, value) in &for_stmt.assigns {
            self.check_assign_target(target, for_stmt.line);
            self.visit_expr(value);
        }
    }

    fn check_assign_target(&mut self, target: &LVal, line: u32) {
        match self.table.find_symbol(&target.ident) {
            None => {
                self.report(line, Code::Undefined, format!("`{}` is not defined", target.ident));
            }
            Some(id) => {
                if self.table.symbol(id).kind.is_const() {
                    self.report(
                        line,
                        Code::AssignToConst,
                        format!("cannot assign to constant `{}`", target.ident),
                    );
                }
            }
        }
        if let Some(index) = &target.index {
            self.visit_expr(index);
        }
    }

    // === expressions ===

    fn visit_cond(&mut self, cond: &Cond) {
        match cond {
            Cond::Or(lhs, rhs) | Cond::And(lhs, rhs) => {
                self.visit_cond(lhs);
                self.visit_cond(rhs);
            }
            Cond::Expr(expr) => self.visit_expr(expr),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(_) => {}
            Expr::LVal(lval) => {
                if self.table.find_symbol(&lval.ident).is_none() {
                    self.report(lval.line, Code::Undefined, format!("`{}` is not defined", lval.ident));
                }
                if let Some(index) = &lval.index {
                    self.visit_expr(index);
                }
            }
            Expr::Call { ident, args, line } => {
                self.check_call(ident, args, *line);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            Expr::Unary { operand, .. } => self.visit_expr(operand),
            Expr::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
        }
    }

    fn check_call(&mut self, ident: &str, args: &[Expr], line: u32) {
        // `getint` is built in: no declaration, no arguments.
        if ident == "getint" {
            if !args.is_empty() {
                self.report(line, Code::ArgCountMismatch, "`getint` takes no arguments");
            }
            return;
        }

        let Some(func_id) = self.table.find_symbol(ident) else {
            self.report(line, Code::Undefined, format!("`{ident}` is not defined"));
            return;
        };
        if !self.table.symbol(func_id).is_function() {
            self.report(line, Code::Undefined, format!("`{ident}` is not a function"));
            return;
        }

        let params = self.table.symbol(func_id).params.clone();
        if args.len() != params.len() {
            self.report(
                line,
                Code::ArgCountMismatch,
                format!("`{ident}` expects {} arguments, {} given", params.len(), args.len()),
            );
            return;
        }

        for (param, arg) in params.iter().zip(args) {
            let arg_shape = self.arg_shape(arg);
            let matches = if param.is_array {
                // An array parameter takes an array *name* only, and a
                // const array may not decay into a mutable view.
                matches!(arg_shape, ArgShape::Array { is_const: false })
            } else {
                !matches!(arg_shape, ArgShape::Array { .. })
            };
            if !matches {
                self.report(
                    line,
                    Code::ArgKindMismatch,
                    format!("argument kind mismatch in call to `{ident}`"),
                );
                return;
            }
        }
    }

    /// Shape of an actual argument, as far as array-vs-scalar matching
    /// is concerned.
    fn arg_shape(&self, arg: &Expr) -> ArgShape {
        match arg {
            Expr::LVal(lval) => {
                if lval.index.is_some() {
                    return ArgShape::Scalar;
                }
                match self.table.find_symbol(&lval.ident) {
                    Some(id) => {
                        let symbol = self.table.symbol(id);
                        if symbol.is_array() {
                            ArgShape::Array {
                                is_const: symbol.kind.is_const(),
                            }
                        } else {
                            ArgShape::Scalar
                        }
                    }
                    None => ArgShape::Scalar,
                }
            }
            Expr::Unary { operand, .. } => self.arg_shape(operand),
            _ => ArgShape::Scalar,
        }
    }

    // === compile-time evaluation ===

    /// Evaluates a constant expression, if it is one. Wrapping
    /// arithmetic; division by zero simply fails the evaluation.
    fn eval_expr(&self, expr: &Expr) -> Option<i32> {
        match expr {
            Expr::Number(v) => Some(*v),
            Expr::Unary { op, operand } => {
                let v = self.eval_expr(operand)?;
                Some(match op {
                    UnaryOp::Plus => v,
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => (v == 0) as i32,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                Some(match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div => {
                        if b == 0 {
                            return None;
                        }
                        a.wrapping_div(b)
                    }
                    BinaryOp::Mod => {
                        if b == 0 {
                            return None;
                        }
                        a.wrapping_rem(b)
                    }
                    BinaryOp::Lt => (a < b) as i32,
                    BinaryOp::Gt => (a > b) as i32,
                    BinaryOp::Le => (a <= b) as i32,
                    BinaryOp::Ge => (a >= b) as i32,
                    BinaryOp::Eq => (a == b) as i32,
                    BinaryOp::Ne => (a != b) as i32,
                })
            }
            Expr::LVal(lval) => {
                let id = self.table.find_symbol(&lval.ident)?;
                let symbol = self.table.symbol(id);
                if !symbol.kind.is_const() {
                    return None;
                }
                match &lval.index {
                    None if !symbol.is_array() => Some(symbol.value),
                    Some(index) if symbol.is_array() => {
                        let i = self.eval_expr(index)?;
                        Some(symbol.array_element_value(i))
                    }
                    _ => None,
                }
            }
            Expr::Call { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgShape {
    Scalar,
    Array { is_const: bool },
}

// === missing-return analysis ===

/// `true` if execution can reach the end of the block without passing
/// a `return`. Conservative: loops are assumed skippable, an `if`
/// without `else` always falls through.
fn can_fall_through_block(block: &Block) -> bool {
    for item in &block.items {
        if let BlockItem::Stmt(stmt) = item {
            if !can_fall_through(stmt) {
                return false;
            }
        }
    }
    true
}

fn can_fall_through(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } => false,
        Stmt::Block(block) => can_fall_through_block(block),
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => match else_branch {
            Some(else_branch) => can_fall_through(then_branch) || can_fall_through(else_branch),
            None => true,
        },
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{lex, parse};

    fn analyze_src(source: &str) -> AggregateResult<SymbolTable> {
        lex::lex(source).and_then(parse::parse).and_then(|unit| analyze(&unit))
    }

    fn codes(source: &str) -> Vec<(u32, Code)> {
        analyze_src(source)
            .diagnostics()
            .map(|d| (d.line(), d.code()))
            .collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let res = analyze_src(
            "int g = 2;\nint add(int a, int b) { return a + b; }\nint main() { return add(g, 3); }",
        );
        assert!(res.is_clean());
    }

    #[test]
    fn redefinition_and_shadowing() {
        assert_eq!(
            codes("int main() {\n    int a;\n    int a;\n    { int a; }\n    a = 1;\n    return 0;\n}"),
            [(3, Code::Redefined)]
        );
    }

    #[test]
    fn undefined_name_is_code_c() {
        assert_eq!(
            codes("int main() {\n    x = 3;\n    return 0;\n}"),
            [(2, Code::Undefined)]
        );
    }

    #[test]
    fn assign_to_const_is_code_h() {
        assert_eq!(
            codes("int main() {\n    const int c = 1;\n    c = 2;\n    return 0;\n}"),
            [(3, Code::AssignToConst)]
        );
    }

    #[test]
    fn missing_return_reported_at_closing_brace() {
        assert_eq!(
            codes("int main(){int x;\nx=1;\n}"),
            [(3, Code::MissingReturn)]
        );
    }

    #[test]
    fn if_else_that_always_returns_is_enough() {
        let src = "int f(int x) {\n    if (x > 0) return 1;\n    else return 0;\n}\nint main() { return f(1); }";
        assert!(codes(src).is_empty());
        let src_no_else = "int f(int x) {\n    if (x > 0) return 1;\n}\nint main() { return f(1); }";
        assert_eq!(codes(src_no_else), [(3, Code::MissingReturn)]);
    }

    #[test]
    fn void_return_value_is_code_f() {
        assert_eq!(
            codes("void f() {\n    return 1;\n}\nint main() { f(); return 0; }"),
            [(2, Code::ValueReturnInVoid)]
        );
    }

    #[test]
    fn arg_count_and_kind() {
        assert_eq!(
            codes("int f(int a) { return a; }\nint main() {\n    return f(1, 2);\n}"),
            [(3, Code::ArgCountMismatch)]
        );
        assert_eq!(
            codes("int f(int a[]) { return a[0]; }\nint main() {\n    int x;\n    x = 0;\n    return f(x);\n}"),
            [(5, Code::ArgKindMismatch)]
        );
        // A const array may not be passed as a mutable array argument.
        assert_eq!(
            codes("int f(int a[]) { return a[0]; }\nconst int c[2] = {1, 2};\nint main() {\n    return f(c);\n}"),
            [(4, Code::ArgKindMismatch)]
        );
    }

    #[test]
    fn break_outside_loop_is_code_m() {
        assert_eq!(
            codes("int main() {\n    break;\n    return 0;\n}"),
            [(2, Code::JumpOutsideLoop)]
        );
    }

    #[test]
    fn printf_specifier_count_is_code_l() {
        assert_eq!(
            codes("int main() {\n    printf(\"%d %d\\n\", 1);\n    return 0;\n}"),
            [(2, Code::PrintfArgMismatch)]
        );
    }

    #[test]
    fn layout_params_then_locals() {
        let res = analyze_src(
            "int f(int a, int b) {\n    int c;\n    int arr[3];\n    c = a + b;\n    return c + arr[0];\n}\nint main() { return f(1, 2); }",
        );
        assert!(res.is_clean());
        let table = res.into_value();
        let f = table.symbol(table.find_symbol("f").unwrap());
        // 2 params (8) + scalar (4) + 3-element array (12).
        assert_eq!(f.stack_frame_size, 24);
        let scope = table.scope_by_id(2).unwrap();
        let offsets: Vec<(String, i32)> = scope
            .symbols()
            .map(|(_, s)| (s.name.clone(), s.offset))
            .collect();
        assert_eq!(
            offsets,
            [
                ("a".to_owned(), 0),
                ("b".to_owned(), 4),
                ("c".to_owned(), 8),
                ("arr".to_owned(), 12)
            ]
        );
    }

    #[test]
    fn declaration_precedes_use_for_initializers() {
        // The inner `a`'s initializer reads the outer `a`; no diagnostics.
        let res = analyze_src("int a = 1;\nint main() {\n    int a = a + 1;\n    return a;\n}");
        assert!(res.is_clean());
    }

    #[test]
    fn static_gets_scoped_label_and_no_frame_slot() {
        let res = analyze_src("int main() {\n    static int s = 5;\n    s = s + 1;\n    return s;\n}");
        assert!(res.is_clean());
        let table = res.into_value();
        let s = table.symbol(table.scope_by_id(2).unwrap().find("s").unwrap());
        assert_eq!(s.label.as_deref(), Some("static_s_2"));
        let main = table.symbol(table.find_symbol("main").unwrap());
        assert_eq!(main.stack_frame_size, 0);
    }

    #[test]
    fn const_values_are_recorded() {
        let res = analyze_src(
            "const int n = 3 * 4;\nconst int a[2] = {n, n + 1};\nint g = a[1];\nint main() { return n; }",
        );
        assert!(res.is_clean());
        let table = res.into_value();
        assert_eq!(table.symbol(table.find_symbol("n").unwrap()).value, 12);
        assert_eq!(table.symbol(table.find_symbol("a").unwrap()).array_init, [12, 13]);
        assert_eq!(table.symbol(table.find_symbol("g").unwrap()).value, 13);
    }
}
