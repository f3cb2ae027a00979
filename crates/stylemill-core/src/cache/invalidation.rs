use futures::future::join_all;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use super::ImportLedger;
use crate::errors::MiddlewareError;
use crate::fs::FileSystem;

/// Why a compile was scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Force mode recompiles every request
    Forced,
    /// The ledger has no include list for the source
    NotInLedger,
    OutputMissing,
    SourceNewer,
    /// An include was modified at or after the output
    IncludeChanged(PathBuf),
    /// An include could not be stat'ed and is assumed changed
    IncludeUnreadable(PathBuf),
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::NotInLedger => write!(f, "no recorded imports"),
            StaleReason::OutputMissing => write!(f, "output missing"),
            StaleReason::SourceNewer => write!(f, "source changed"),
            StaleReason::IncludeChanged(path) => write!(f, "{} changed", path.display()),
            StaleReason::IncludeUnreadable(path) => {
                write!(f, "{} unreadable, assuming changed", path.display())
            }
        }
    }
}

/// Outcome of a staleness check for one requested artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Compile(StaleReason),
    UpToDate,
    /// The source could not be stat'ed; there is nothing to compile
    SourceMissing,
}

/// Decides whether a compiled output must be rebuilt
///
/// Staleness is purely timestamp based: an output is stale when its source
/// is strictly newer, or when any recorded include was modified at or after
/// the output.
pub struct StalenessDecider<'a> {
    fs: &'a dyn FileSystem,
    ledger: &'a ImportLedger,
    force: bool,
}

impl<'a> StalenessDecider<'a> {
    pub fn new(fs: &'a dyn FileSystem, ledger: &'a ImportLedger) -> Self {
        Self {
            fs,
            ledger,
            force: false,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub async fn decide(&self, source: &Path, output: &Path) -> Result<Decision, MiddlewareError> {
        if self.force {
            return Ok(Decision::Compile(StaleReason::Forced));
        }

        let Some(includes) = self.ledger.includes(source) else {
            return Ok(Decision::Compile(StaleReason::NotInLedger));
        };

        let source_mtime = match self.fs.modified(source).await {
            Ok(mtime) => mtime,
            Err(e) => {
                debug!("Source {:?} unreadable: {}", source, e);
                return Ok(Decision::SourceMissing);
            }
        };

        let output_mtime = match self.fs.modified(output).await {
            Ok(mtime) => mtime,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Decision::Compile(StaleReason::OutputMissing));
            }
            Err(source) => {
                return Err(MiddlewareError::Stat {
                    path: output.to_path_buf(),
                    source,
                });
            }
        };

        if source_mtime > output_mtime {
            return Ok(Decision::Compile(StaleReason::SourceNewer));
        }

        Ok(match self.changed_include(&includes, output_mtime).await {
            Some(reason) => Decision::Compile(reason),
            None => Decision::UpToDate,
        })
    }

    /// Stat every include concurrently and report the first changed one
    ///
    /// All stats run to completion before the answer is known. A failed stat
    /// counts as a change: serving stale output is worse than an extra
    /// compile.
    pub async fn changed_include(
        &self,
        includes: &[PathBuf],
        output_mtime: SystemTime,
    ) -> Option<StaleReason> {
        let checks = includes.iter().map(|include| async move {
            match self.fs.modified(include).await {
                Ok(mtime) if mtime >= output_mtime => {
                    Some(StaleReason::IncludeChanged(include.clone()))
                }
                Ok(_) => None,
                Err(e) => {
                    debug!("Include {:?} unreadable: {}", include, e);
                    Some(StaleReason::IncludeUnreadable(include.clone()))
                }
            }
        });

        join_all(checks).await.into_iter().flatten().next()
    }
}
