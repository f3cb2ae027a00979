use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cache::{Decision, ImportLedger, StaleReason, StalenessDecider};
use crate::compiler::{CompileOutput, Compiler, SassCommandCompiler};
use crate::config::MiddlewareConfig;
use crate::errors::{ConfigError, MiddlewareError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::hooks::Hooks;
use crate::http::{Outcome, Request, StyleResponse};
use crate::orchestrator::{CompileJob, CompileOrchestrator, Rendered};
use crate::resolve::PathResolver;

/// What happened to a request, in more detail than [`Outcome`]
#[derive(Debug)]
pub enum Disposition {
    /// Not a read of a `.css` path under the prefix
    NotApplicable,
    /// No source file exists for the requested output
    SourceMissing,
    /// The output on disk is up to date
    Fresh,
    /// Compiled and kept in memory for a direct response
    Served {
        style: CompileOutput,
        reason: StaleReason,
    },
    /// Compiled and written to the output directory
    Written {
        output: PathBuf,
        source_map: Option<PathBuf>,
        reason: StaleReason,
        /// First write failure, if either artifact could not be written
        error: Option<MiddlewareError>,
    },
}

/// Request-time style-sheet build cache
///
/// Each instance owns its import ledger; two instances never share
/// dependency knowledge even when they point at the same directories.
pub struct StyleMiddleware {
    config: Arc<MiddlewareConfig>,
    resolver: PathResolver,
    ledger: Arc<ImportLedger>,
    file_system: Arc<dyn FileSystem>,
    compiler: Arc<dyn Compiler>,
    hooks: Hooks,
}

impl StyleMiddleware {
    /// Create a middleware with production dependencies
    pub fn new(config: MiddlewareConfig) -> Result<Self, ConfigError> {
        let hooks = Hooks::new(&config);
        Self::with_dependencies(
            config,
            Arc::new(RealFileSystem::new()),
            Arc::new(SassCommandCompiler::new()),
            hooks,
        )
    }

    /// Create a middleware with custom dependencies
    pub fn with_dependencies(
        config: MiddlewareConfig,
        file_system: Arc<dyn FileSystem>,
        compiler: Arc<dyn Compiler>,
        hooks: Hooks,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = PathResolver::new(&config);

        Ok(Self {
            config: Arc::new(config),
            resolver,
            ledger: Arc::new(ImportLedger::new()),
            file_system,
            compiler,
            hooks,
        })
    }

    pub fn config(&self) -> &Arc<MiddlewareConfig> {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<ImportLedger> {
        &self.ledger
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Bring the output for `request` up to date and report what was done
    ///
    /// Stat and compile failures are returned as errors after being passed
    /// to the error hook. Write failures do not fail the call; they are
    /// carried in [`Disposition::Written`].
    pub async fn process(&self, request: &Request) -> Result<Disposition, MiddlewareError> {
        let Some(paths) = self.resolver.resolve(&request.method, &request.path) else {
            return Ok(Disposition::NotApplicable);
        };

        self.hooks.debug("source", paths.source.display());
        self.hooks.debug("dest", paths.output.display());

        let decision = StalenessDecider::new(self.file_system.as_ref(), &self.ledger)
            .force(self.config.force)
            .decide(&paths.source, &paths.output)
            .await;

        let reason = match decision {
            Ok(Decision::Compile(reason)) => reason,
            Ok(Decision::UpToDate) => {
                self.hooks.debug("fresh", paths.output.display());
                return Ok(Disposition::Fresh);
            }
            Ok(Decision::SourceMissing) => {
                self.hooks.debug("skip", paths.source.display());
                return Ok(Disposition::SourceMissing);
            }
            Err(err) => {
                self.hooks.error(&err);
                return Err(err);
            }
        };

        self.hooks.debug("stale", &reason);
        info!("Compiling {} ({})", paths.request_path, reason);

        let mut job = CompileJob::new(paths);
        let orchestrator = CompileOrchestrator::new(
            self.file_system.as_ref(),
            self.compiler.as_ref(),
            &self.ledger,
            &self.config,
            &self.hooks,
        );

        let disposition = match orchestrator.run(&mut job).await? {
            Rendered::SourceMissing => Disposition::SourceMissing,
            Rendered::InMemory(style) => Disposition::Served { style, reason },
            Rendered::Written { output, source_map } => Disposition::Written {
                output,
                source_map,
                reason,
                error: job.take_error(),
            },
        };
        Ok(disposition)
    }

    /// Handle one request the way a host framework's middleware chain expects
    pub async fn handle(&self, request: &Request) -> Outcome {
        match self.process(request).await {
            Ok(Disposition::Served { style, .. }) => {
                Outcome::Respond(StyleResponse::css(style.css, self.config.max_age))
            }
            Ok(Disposition::Written { error, .. }) => Outcome::Next(error),
            Ok(_) => Outcome::Next(None),
            Err(err) => Outcome::Next(Some(err)),
        }
    }
}

impl std::fmt::Debug for StyleMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleMiddleware")
            .field("config", &self.config)
            .field("ledger_entries", &self.ledger.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}
