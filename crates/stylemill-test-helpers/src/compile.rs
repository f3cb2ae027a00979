//! A small stand-in compiler for tests
//!
//! Understands only `@import "name"` lines. Imports are resolved the way a
//! real style-sheet compiler does it: `name.scss` then `_name.scss`, first
//! next to the importing file, then along the include paths. Imported text
//! is inlined once per file; everything else is copied through unchanged.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylemill_core::compiler::{CompileOutput, Compiler, CompilerInput};
use stylemill_core::errors::CompileError;
use stylemill_core::fs::FileSystem;
use stylemill_core::sourcemap::with_mapping_url;

pub struct ImportScanningCompiler {
    fs: Arc<dyn FileSystem>,
}

#[derive(Default)]
struct Expansion {
    css: String,
    included: Vec<PathBuf>,
}

impl ImportScanningCompiler {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    fn expand<'a>(
        &'a self,
        file: &'a Path,
        input: &'a CompilerInput,
        state: &'a mut Expansion,
    ) -> BoxFuture<'a, Result<(), CompileError>> {
        Box::pin(async move {
            let text = self.fs.read_to_string(file).await.map_err(|e| {
                CompileError::unlocated(file, format!("Can't read stylesheet: {}", e))
            })?;

            for (index, line) in text.lines().enumerate() {
                let Some((name, column)) = import_target(line) else {
                    state.css.push_str(line);
                    state.css.push('\n');
                    continue;
                };

                let Some(found) = self.locate(name, file, input).await else {
                    return Err(CompileError::new(
                        file,
                        index as u32 + 1,
                        column,
                        format!("Can't find stylesheet to import: {}", name),
                    ));
                };

                if found != input.file && !state.included.contains(&found) {
                    state.included.push(found.clone());
                    self.expand(&found, input, state).await?;
                }
            }
            Ok(())
        })
    }

    async fn locate(&self, name: &str, importer: &Path, input: &CompilerInput) -> Option<PathBuf> {
        let extension = if input.indented_syntax { "sass" } else { "scss" };
        let relative = Path::new(name);
        let file_name = relative.file_name()?.to_string_lossy().into_owned();
        let partial = relative.with_file_name(format!("_{}", file_name));

        let search = importer
            .parent()
            .into_iter()
            .chain(input.include_paths.iter().map(PathBuf::as_path));
        for dir in search {
            for candidate in [relative, partial.as_path()] {
                let path = dir.join(candidate).with_extension(extension);
                if self.fs.exists(&path).await {
                    return Some(path);
                }
            }
        }
        None
    }
}

/// `@import "name";` yields `("name", column of the opening quote)`
fn import_target(line: &str) -> Option<(&str, u32)> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix("@import")?;
    let open = line.find('"')?;
    let close = line[open + 1..].find('"')? + open + 1;
    if rest.trim().is_empty() {
        return None;
    }
    Some((&line[open + 1..close], open as u32 + 1))
}

#[async_trait]
impl Compiler for ImportScanningCompiler {
    async fn compile(&self, input: &CompilerInput) -> Result<CompileOutput, CompileError> {
        let mut state = Expansion::default();
        self.expand(&input.file, input, &mut state).await?;

        let map = input.want_map.then(|| {
            let sources: Vec<String> = std::iter::once(&input.file)
                .chain(state.included.iter())
                .map(|p| format!("file://{}", p.display()))
                .collect();
            let file = input
                .out_file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            json!({
                "version": 3,
                "file": file,
                "sources": sources,
                "names": [],
                "mappings": "",
            })
            .to_string()
        });

        let css = match input.source_map.as_deref().and_then(Path::file_name) {
            Some(name) => with_mapping_url(&state.css, &name.to_string_lossy()),
            None => state.css,
        };

        Ok(CompileOutput {
            css,
            map,
            included_files: state.included,
        })
    }
}
