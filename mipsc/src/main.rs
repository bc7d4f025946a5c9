mod cli;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use mipsc_lib::compile::compile;

fn main() -> Result<()> {
    env_logger::init();
    let args = cli::Args::parse();

    let source = cli::read_input_source(&args)?;
    let opts = cli::extract_compile_opts(&args);

    let artifacts = compile(source.source(), &opts);

    if !artifacts.diagnostics.is_empty() {
        report::eprint_diagnostics(&artifacts.diagnostics, &source);
    }

    write_artifact("tree.txt", Some(&artifacts.tree))?;
    write_artifact("table.txt", Some(&artifacts.table))?;
    write_artifact("error.txt", artifacts.errors.as_deref())?;
    write_artifact("symbol.txt", artifacts.symbols.as_deref())?;
    write_artifact("ir.txt", artifacts.ir.as_deref())?;
    write_artifact("mips_stack_layout.txt", artifacts.stack_layout.as_deref())?;
    write_artifact("testfilei_opt_after.txt", artifacts.ir_optimized.as_deref())?;
    write_artifact("mips.txt", artifacts.mips.as_deref())?;

    info!(
        "compilation finished with {} diagnostic(s)",
        artifacts.diagnostics.len()
    );
    // Diagnostics are an output, not a failure: only a missing input
    // file changes the exit code.
    Ok(())
}

fn write_artifact(name: &str, content: Option<&str>) -> Result<()> {
    let Some(content) = content else { return Ok(()) };
    std::fs::write(name, content).with_context(|| format!("Failed to write `{name}`"))
}
