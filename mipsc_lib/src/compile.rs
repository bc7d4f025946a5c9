//! The staged pipeline: lex → parse → analyze → lower → optimize →
//! MIPS, producing every dump artifact as an in-memory string. File
//! placement is the binary's business.

use std::fmt::Write;

use crate::codegen;
use crate::diagnostic::{sort_and_dedup, Diagnostic};
use crate::inspectors;
use crate::passes;

pub struct CompileOpts {
    optimize: bool,
}

pub struct CompileOptsBuilder {
    optimize: bool,
}

impl Default for CompileOptsBuilder {
    fn default() -> Self {
        Self { optimize: true }
    }
}

impl CompileOptsBuilder {
    /// Optimization on, which is the shipping configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn build(self) -> CompileOpts {
        CompileOpts {
            optimize: self.optimize,
        }
    }
}

/// Everything a compilation run produces. `tree` and `table` always
/// exist; `errors` is present exactly when diagnostics were collected,
/// and the middle/back-end artifacts exactly when they were not (the
/// lowering stages require an intact symbol table).
pub struct Artifacts {
    pub diagnostics: Vec<Diagnostic>,
    pub tree: String,
    pub table: String,
    pub errors: Option<String>,
    pub symbols: Option<String>,
    pub ir: Option<String>,
    pub stack_layout: Option<String>,
    pub ir_optimized: Option<String>,
    pub mips: Option<String>,
}

pub fn compile(source: &str, opts: &CompileOpts) -> Artifacts {
    let ast = passes::lex::lex(source).and_then(passes::parse::parse);
    let result = ast.and_then(|unit| passes::analyze::analyze(&unit).map(|table| (unit, table)));

    let ((unit, table), diagnostics) = result.into_parts();
    let diagnostics = sort_and_dedup(diagnostics);

    let tree = inspectors::inspect_ast(&unit);
    let table_dump = inspectors::format_symbol_table(&table);

    if !diagnostics.is_empty() {
        let mut errors = String::new();
        for d in &diagnostics {
            let _ = writeln!(errors, "{} {}", d.line(), d.code());
        }
        return Artifacts {
            diagnostics,
            tree,
            table: table_dump,
            errors: Some(errors),
            symbols: None,
            ir: None,
            stack_layout: None,
            ir_optimized: None,
            mips: None,
        };
    }

    let symbols = inspectors::compact_symbol_list(&table);

    let module = passes::lower_ast::build_ir_from_ast(&unit, &table);
    let ir = module.to_text();

    let (module, ir_optimized) = if opts.optimize {
        let optimized = passes::optimize::optimize(module, &table);
        let text = optimized.to_text();
        (optimized, Some(text))
    } else {
        (module, None)
    };

    let stack_layout = inspectors::format_stack_layout(&table, &module);
    let mips = codegen::mips::build_from_ir(&module, &table);

    Artifacts {
        diagnostics,
        tree,
        table: table_dump,
        errors: None,
        symbols: Some(symbols),
        ir: Some(ir),
        stack_layout: Some(stack_layout),
        ir_optimized,
        mips: Some(mips),
    }
}
