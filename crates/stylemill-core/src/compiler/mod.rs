//! The compile capability consumed by the middleware.

mod imports;
mod sass_cli;

pub use sass_cli::SassCommandCompiler;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::config::OutputStyle;
use crate::errors::CompileError;

/// Everything a compiler needs to build one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerInput {
    pub file: PathBuf,
    /// Where the compiled text will be written or served from
    pub out_file: PathBuf,
    /// Import search path, starting with the source's own directory
    pub include_paths: Vec<PathBuf>,
    pub indented_syntax: bool,
    pub output_style: OutputStyle,
    /// Map file the compiled text should reference, when maps are written
    pub source_map: Option<PathBuf>,
    /// Whether map data should be produced at all
    pub want_map: bool,
}

/// Successful compile result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub css: String,
    pub map: Option<String>,
    /// Every file the source transitively included, in discovery order
    pub included_files: Vec<PathBuf>,
}

#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, input: &CompilerInput) -> Result<CompileOutput, CompileError>;
}
