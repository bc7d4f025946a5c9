use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use codespan_reporting::files::SimpleFile;

use mipsc_lib::compile::{CompileOpts, CompileOptsBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SkippablePasses {
    Optimize,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The input source file.
    #[arg(default_value = "testfile.txt")]
    input_path: PathBuf,

    /// Zero or more passes to skip.
    #[arg(long = "skip", value_name = "PASS", value_enum)]
    skips: Vec<SkippablePasses>,
}

pub fn read_input_source(args: &Args) -> anyhow::Result<SimpleFile<String, String>> {
    let path = &args.input_path;
    if !path.exists() {
        bail!("Input file `{}` doesn't exist", path.display());
    }
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file `{}`", path.display()))?;
    Ok(SimpleFile::new(
        path.file_name().unwrap().to_string_lossy().into_owned(),
        source,
    ))
}

pub fn extract_compile_opts(args: &Args) -> CompileOpts {
    CompileOptsBuilder::new()
        .optimize(!args.skips.contains(&SkippablePasses::Optimize))
        .build()
}
