use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;
use url::Url;

use super::{imports, CompileOutput, Compiler, CompilerInput};
use crate::config::OutputStyle;
use crate::errors::CompileError;
use crate::fs::RealFileSystem;
use crate::resolve::map_path_for;
use crate::sourcemap::{strip_mapping_comment, with_mapping_url};

/// Compiler that shells out to the dart-sass executable
///
/// Each compile runs in a scratch directory so the executable never writes
/// next to the real output. The included files are the union of the map's
/// `sources` and a scan of the load rules, since a partial that only
/// defines functions or variables never shows up in the map.
#[derive(Debug, Clone)]
pub struct SassCommandCompiler {
    program: PathBuf,
}

impl Default for SassCommandCompiler {
    fn default() -> Self {
        Self {
            program: PathBuf::from("sass"),
        }
    }
}

impl SassCommandCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Compiler for SassCommandCompiler {
    async fn compile(&self, input: &CompilerInput) -> Result<CompileOutput, CompileError> {
        let scratch = tempfile::tempdir().map_err(|e| {
            CompileError::unlocated(
                &input.file,
                format!("failed to create scratch directory: {}", e),
            )
        })?;
        let out = scratch.path().join("out.css");

        let mut command = Command::new(&self.program);
        command
            .arg(format!("--style={}", sass_style(input.output_style)))
            .arg("--source-map")
            .arg("--source-map-urls=absolute")
            .arg("--no-error-css");
        for path in &input.include_paths {
            command.arg(format!("--load-path={}", path.display()));
        }
        command.arg(&input.file).arg(&out);
        debug!("Running {:?}", command);

        let output = command.output().await.map_err(|e| {
            CompileError::unlocated(
                &input.file,
                format!("failed to run {}: {}", self.program.display(), e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.trim().is_empty() {
                return Err(CompileError::unlocated(
                    &input.file,
                    format!("{} exited with {}", self.program.display(), output.status),
                ));
            }
            return Err(parse_sass_error(&stderr, &input.file));
        }

        let css = tokio::fs::read_to_string(&out).await.map_err(|e| {
            CompileError::unlocated(&input.file, format!("failed to read compiled output: {}", e))
        })?;
        let map = tokio::fs::read_to_string(map_path_for(&out))
            .await
            .ok()
            .map(|m| retarget_map(&m, &input.out_file));

        let entry = canonical(&input.file).await;
        let mut included = map
            .as_deref()
            .map(|m| included_files(m, &entry))
            .unwrap_or_default();
        let scanned =
            imports::loaded_files(&RealFileSystem, &input.file, &input.include_paths).await;
        for path in scanned {
            let path = canonical(&path).await;
            if path != entry && !included.contains(&path) {
                included.push(path);
            }
        }

        let css = match input.source_map.as_deref().and_then(Path::file_name) {
            Some(name) => with_mapping_url(&css, &name.to_string_lossy()),
            None => format!("{}\n", strip_mapping_comment(&css)),
        };

        Ok(CompileOutput {
            css,
            map: if input.want_map { map } else { None },
            included_files: included,
        })
    }
}

fn sass_style(style: OutputStyle) -> &'static str {
    match style {
        OutputStyle::Compressed => "compressed",
        OutputStyle::Nested | OutputStyle::Expanded | OutputStyle::Compact => "expanded",
    }
}

#[derive(Deserialize)]
struct MapSources {
    #[serde(default)]
    sources: Vec<String>,
}

async fn canonical(path: &Path) -> PathBuf {
    tokio::fs::canonicalize(path)
        .await
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Point the map's `file` at the real output instead of the scratch file
fn retarget_map(map: &str, out_file: &Path) -> String {
    let (Ok(mut value), Some(name)) = (
        serde_json::from_str::<serde_json::Value>(map),
        out_file.file_name(),
    ) else {
        return map.to_string();
    };
    match value.as_object_mut() {
        Some(fields) => {
            let name = name.to_string_lossy().into_owned();
            fields.insert("file".to_string(), serde_json::Value::String(name));
            value.to_string()
        }
        None => map.to_string(),
    }
}

/// Files listed in a source map's `sources`, minus the entry file itself
fn included_files(map: &str, entry: &Path) -> Vec<PathBuf> {
    let Ok(parsed) = serde_json::from_str::<MapSources>(map) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for source in parsed.sources {
        let Some(path) = Url::parse(&source)
            .ok()
            .and_then(|url| url.to_file_path().ok())
        else {
            continue;
        };
        if path != entry && !files.contains(&path) {
            files.push(path);
        }
    }
    files
}

/// Extract message and location from dart-sass error output
///
/// ```text
/// Error: Undefined variable.
///   ╷
/// 3 │   color: $nope;
///   │          ^^^^^
///   ╵
///   styles/a.scss 3:10  root stylesheet
/// ```
fn parse_sass_error(stderr: &str, file: &Path) -> CompileError {
    let message = stderr
        .lines()
        .find_map(|line| line.trim().strip_prefix("Error: "))
        .unwrap_or_else(|| stderr.trim())
        .to_string();

    for line in stderr.lines() {
        let mut parts = line.split_whitespace();
        let (Some(path), Some(position)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Some((line_no, column)) = position.split_once(':') else {
            continue;
        };
        if let (Ok(line_no), Ok(column)) = (line_no.parse::<u32>(), column.parse::<u32>()) {
            return CompileError::new(path, line_no, column, message);
        }
    }

    CompileError::unlocated(file, message)
}
