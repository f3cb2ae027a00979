//! Mock implementations for testing

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stylemill_core::compiler::{CompileOutput, Compiler, CompilerInput};
use stylemill_core::errors::CompileError;
use stylemill_core::hooks::{Hooks, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub key: String,
    pub value: String,
}

/// Collects everything passed to the log and error hooks
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install recording callbacks on `hooks`
    pub fn attach(&self, hooks: Hooks) -> Hooks {
        let entries = self.entries.clone();
        let errors = self.errors.clone();
        hooks
            .with_log(move |severity, key, value, _| {
                entries.lock().unwrap().push(LogEntry {
                    severity,
                    key: key.to_string(),
                    value: value.to_string(),
                });
            })
            .with_error(move |err| errors.lock().unwrap().push(err.to_string()))
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Values logged under `key`, in order
    pub fn values(&self, key: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.value.clone())
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

/// A compiler returning canned results
///
/// Every call is counted and its input kept, so tests can assert exactly
/// how often and with what the middleware compiled.
#[derive(Debug, Default)]
pub struct ScriptedCompiler {
    result: Mutex<Option<Result<CompileOutput, CompileError>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<CompilerInput>>,
}

impl ScriptedCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Compile to `css`, reporting `includes` as the import set
    pub fn returning(css: &str, includes: &[PathBuf]) -> Arc<Self> {
        let compiler = Self::default();
        compiler.set_output(CompileOutput {
            css: css.to_string(),
            map: None,
            included_files: includes.to_vec(),
        });
        Arc::new(compiler)
    }

    pub fn set_output(&self, output: CompileOutput) {
        *self.result.lock().unwrap() = Some(Ok(output));
    }

    pub fn set_includes(&self, includes: &[PathBuf]) {
        let mut result = self.result.lock().unwrap();
        let mut output = match result.take() {
            Some(Ok(output)) => output,
            _ => CompileOutput::default(),
        };
        output.included_files = includes.to_vec();
        *result = Some(Ok(output));
    }

    pub fn set_map(&self, map: &str) {
        let mut result = self.result.lock().unwrap();
        let mut output = match result.take() {
            Some(Ok(output)) => output,
            _ => CompileOutput::default(),
        };
        output.map = Some(map.to_string());
        *result = Some(Ok(output));
    }

    pub fn fail_with(&self, err: CompileError) {
        *self.result.lock().unwrap() = Some(Err(err));
    }

    /// Hold every compile for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<CompilerInput> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compiler for ScriptedCompiler {
    async fn compile(&self, input: &CompilerInput) -> Result<CompileOutput, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(input.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.result.lock().unwrap().clone();
        result.unwrap_or_else(|| {
            Ok(CompileOutput {
                css: format!("/* {} */\n", input.file.display()),
                ..CompileOutput::default()
            })
        })
    }
}


/// Stand-in for the dart-sass executable, written into `dir`
///
/// Accepts the same arguments `SassCommandCompiler` passes. It writes a
/// fixed rule headed by a `/* <style> */` comment to the output path, plus
/// a map beside it whose only source is the entry file. That matches what
/// dart-sass emits when nothing from a loaded partial reaches the output.
#[cfg(unix)]
pub fn fake_sass(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = indoc::indoc! {r#"
        #!/bin/sh
        style=expanded
        for arg; do
          case "$arg" in
            --style=*) style="${arg#--style=}" ;;
          esac
          input="$out"
          out="$arg"
        done
        case "$input" in
          /*) source="$input" ;;
          *) source="$PWD/$input" ;;
        esac
        printf '/* %s */\na {\n  color: red;\n}\n\n/*# sourceMappingURL=out.css.map */\n' "$style" > "$out"
        printf '{"version":3,"file":"out.css","sources":["file://%s"],"names":[],"mappings":"AAAA"}\n' "$source" > "$out.map"
    "#};

    let path = dir.join("fake-sass");
    std::fs::write(&path, script).expect("write fake sass");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake sass executable");
    path
}
