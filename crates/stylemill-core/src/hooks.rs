use std::fmt;
use std::sync::Arc;

use crate::config::MiddlewareConfig;
use crate::errors::MiddlewareError;

/// Log entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "debug"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Receives `(severity, key, value, extra)` log entries
pub type LogHook = Arc<dyn Fn(Severity, &str, &str, Option<&str>) + Send + Sync>;

/// Receives every error the middleware reports
pub type ErrorHook = Arc<dyn Fn(&MiddlewareError) + Send + Sync>;

/// Log and error callbacks for one middleware instance
///
/// Without custom hooks, entries go to `tracing`: debug entries only when
/// the `debug` flag is set, error entries always. The default error hook
/// formats the error and routes it through the log hook.
#[derive(Clone)]
pub struct Hooks {
    debug: bool,
    beep_on_error: bool,
    log: Option<LogHook>,
    error: Option<ErrorHook>,
}

impl Hooks {
    pub fn new(config: &MiddlewareConfig) -> Self {
        Self {
            debug: config.debug,
            beep_on_error: config.beep_on_error,
            log: None,
            error: None,
        }
    }

    pub fn with_log<F>(mut self, hook: F) -> Self
    where
        F: Fn(Severity, &str, &str, Option<&str>) + Send + Sync + 'static,
    {
        self.log = Some(Arc::new(hook));
        self
    }

    pub fn with_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MiddlewareError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(hook));
        self
    }

    pub fn log(&self, severity: Severity, key: &str, value: &str, extra: Option<&str>) {
        match &self.log {
            Some(hook) => hook(severity, key, value, extra),
            None => trace_entry(self.debug, severity, key, value, extra),
        }
    }

    pub fn debug(&self, key: &str, value: impl fmt::Display) {
        self.log(Severity::Debug, key, &value.to_string(), None);
    }

    pub fn error(&self, err: &MiddlewareError) {
        match &self.error {
            Some(hook) => hook(err),
            None => {
                let message = self.format_error(err);
                self.log(Severity::Error, "error", &message, None);
            }
        }
    }

    /// Human-readable error text, with a leading bell when beep-on-error is set
    pub fn format_error(&self, err: &MiddlewareError) -> String {
        let bell = if self.beep_on_error { "\x07" } else { "" };
        format!("{}{}", bell, err)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("debug", &self.debug)
            .field("beep_on_error", &self.beep_on_error)
            .field("custom_log", &self.log.is_some())
            .field("custom_error", &self.error.is_some())
            .finish()
    }
}

fn trace_entry(debug: bool, severity: Severity, key: &str, value: &str, extra: Option<&str>) {
    let extra = extra.unwrap_or("");
    match severity {
        Severity::Debug if debug => {
            tracing::debug!(target: "stylemill", "{}: {} {}", key, value, extra)
        }
        Severity::Debug => {}
        Severity::Error => tracing::error!(target: "stylemill", "{}: {} {}", key, value, extra),
    }
}
