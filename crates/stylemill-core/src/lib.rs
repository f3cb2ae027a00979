//! Request-time build cache for compiled style sheets.
//!
//! [`StyleMiddleware`] sits in front of a static file handler. For every
//! read of a `.css` path it finds the matching source, decides whether the
//! compiled output is stale, and recompiles when it is. Dependency
//! knowledge lives in an in-memory [`ImportLedger`], so the first request
//! for each style sheet after startup always compiles.

#[cfg(feature = "axum")]
pub mod adapters;
pub mod cache;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod fs;
pub mod hooks;
pub mod http;
pub mod middleware;
pub mod orchestrator;
pub mod resolve;
pub mod sourcemap;

pub use cache::{Decision, ImportLedger, StaleReason, StalenessDecider};
pub use compiler::{CompileOutput, Compiler, CompilerInput, SassCommandCompiler};
pub use config::{ConfigOverrides, MiddlewareConfig, OutputStyle};
pub use errors::{CompileError, ConfigError, MiddlewareError};
pub use fs::{FileSystem, MockFileSystem, RealFileSystem};
pub use hooks::{Hooks, Severity};
pub use http::{Outcome, Request, StyleResponse};
pub use middleware::{Disposition, StyleMiddleware};
pub use orchestrator::{CompileJob, CompileOrchestrator, Rendered};
pub use resolve::{PathResolver, ResolvedPaths};
