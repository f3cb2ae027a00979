use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::cache::ImportLedger;
use crate::compiler::{CompileOutput, Compiler, CompilerInput};
use crate::config::MiddlewareConfig;
use crate::errors::MiddlewareError;
use crate::fs::FileSystem;
use crate::hooks::Hooks;
use crate::resolve::ResolvedPaths;
use crate::sourcemap;

/// One in-flight compile for a single request
#[derive(Debug)]
pub struct CompileJob {
    pub request_path: String,
    pub source: PathBuf,
    pub output: PathBuf,
    pub source_map: Option<PathBuf>,
    error: Option<MiddlewareError>,
}

impl CompileJob {
    pub fn new(paths: ResolvedPaths) -> Self {
        Self {
            request_path: paths.request_path,
            source: paths.source,
            output: paths.output,
            source_map: paths.source_map,
            error: None,
        }
    }

    /// Keep the first failure; later ones were already reported to the hooks
    pub fn record_error(&mut self, err: MiddlewareError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn error(&self) -> Option<&MiddlewareError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<MiddlewareError> {
        self.error.take()
    }
}

/// How a compile job finished
#[derive(Debug)]
pub enum Rendered {
    /// The source vanished between the staleness check and the compile
    SourceMissing,
    /// Compiled text kept in memory for a direct response
    InMemory(CompileOutput),
    /// Artifacts written (or attempted) on disk
    Written {
        output: PathBuf,
        source_map: Option<PathBuf>,
    },
}

/// Runs the compiler and persists its artifacts
pub struct CompileOrchestrator<'a> {
    fs: &'a dyn FileSystem,
    compiler: &'a dyn Compiler,
    ledger: &'a ImportLedger,
    config: &'a MiddlewareConfig,
    hooks: &'a Hooks,
}

impl<'a> CompileOrchestrator<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        compiler: &'a dyn Compiler,
        ledger: &'a ImportLedger,
        config: &'a MiddlewareConfig,
        hooks: &'a Hooks,
    ) -> Self {
        Self {
            fs,
            compiler,
            ledger,
            config,
            hooks,
        }
    }

    /// Compile the job's source and deliver the result
    ///
    /// The ledger entry is cleared before compiling and only restored on
    /// success, so a failed compile is retried by the next request. Write
    /// failures are recorded on the job instead of failing the call.
    pub async fn run(&self, job: &mut CompileJob) -> Result<Rendered, MiddlewareError> {
        if !self.fs.exists(&job.source).await {
            self.hooks.debug("skip", job.source.display());
            return Ok(Rendered::SourceMissing);
        }

        self.ledger.clear(&job.source);

        let input = self.compiler_input(job);
        self.hooks.debug("render", job.source.display());
        let mut output = match self.compiler.compile(&input).await {
            Ok(output) => output,
            Err(e) => {
                let err = MiddlewareError::from(e);
                self.hooks.error(&err);
                return Err(err);
            }
        };

        self.ledger
            .record(job.source.clone(), output.included_files.clone());

        if self.config.source_map_embed {
            if let Some(map) = &output.map {
                output.css = sourcemap::embed(&output.css, map);
            }
        }

        if self.config.response {
            return Ok(Rendered::InMemory(output));
        }

        let source_map = self.write_artifacts(job, &output).await;
        Ok(Rendered::Written {
            output: job.output.clone(),
            source_map,
        })
    }

    fn compiler_input(&self, job: &CompileJob) -> CompilerInput {
        let mut include_paths: Vec<PathBuf> = job
            .source
            .parent()
            .map(Path::to_path_buf)
            .into_iter()
            .collect();
        include_paths.extend(self.config.include_paths.iter().cloned());

        CompilerInput {
            file: job.source.clone(),
            out_file: job.output.clone(),
            include_paths,
            indented_syntax: self.config.indented_syntax,
            output_style: self.config.output_style,
            source_map: job.source_map.clone(),
            want_map: job.source_map.is_some() || self.config.source_map_embed,
        }
    }

    /// Write the compiled text and the map side by side
    ///
    /// Both branches always run to completion; a failure in one never
    /// blocks the other. Returns the map path when a map write was attempted.
    async fn write_artifacts(
        &self,
        job: &mut CompileJob,
        output: &CompileOutput,
    ) -> Option<PathBuf> {
        let map_target = match (&job.source_map, &output.map) {
            (Some(path), Some(map)) => Some((path.clone(), map.as_str())),
            (Some(path), None) => {
                debug!("Compiler returned no map for {:?}", path);
                None
            }
            (None, _) => None,
        };

        let css_branch = self.write_artifact(&job.output, output.css.as_bytes());
        let map_branch = async {
            match &map_target {
                Some((path, map)) => self.write_artifact(path, map.as_bytes()).await,
                None => Ok(()),
            }
        };

        let (css_result, map_result) = tokio::join!(css_branch, map_branch);
        for result in [css_result, map_result] {
            if let Err(err) = result {
                job.record_error(err);
            }
        }

        map_target.map(|(path, _)| path)
    }

    async fn write_artifact(&self, path: &Path, contents: &[u8]) -> Result<(), MiddlewareError> {
        let result = self.create_parent(path).await;
        let result = match result {
            Ok(()) => self
                .fs
                .write(path, contents)
                .await
                .map_err(|source| MiddlewareError::Write {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(err) => Err(err),
        };

        match &result {
            Ok(()) => self.hooks.debug("write", path.display()),
            Err(err) => {
                warn!("Degraded write for {:?}: {}", path, err);
                self.hooks.error(err);
            }
        }
        result
    }

    async fn create_parent(&self, path: &Path) -> Result<(), MiddlewareError> {
        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        self.fs
            .create_dir_all(parent)
            .await
            .map_err(|source| MiddlewareError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
    }
}
