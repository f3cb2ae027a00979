use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Extension of the artifacts this middleware produces
pub const OUTPUT_EXTENSION: &str = "css";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl OutputStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStyle::Nested => "nested",
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compact => "compact",
            OutputStyle::Compressed => "compressed",
        }
    }
}

/// Per-instance middleware configuration
///
/// Created once at startup and never mutated afterwards. Paths are used
/// exactly as given; relative paths resolve against the process working
/// directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiddlewareConfig {
    /// Directory holding the style-sheet sources
    pub src: PathBuf,

    /// Directory compiled output is written to (default: `src`)
    #[serde(default)]
    pub dest: Option<PathBuf>,

    /// Directory `src` and `dest` are re-rooted under
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// URL prefix stripped from request paths before mapping
    #[serde(default)]
    pub prefix: Option<String>,

    /// Recompile on every matching request
    #[serde(default)]
    pub force: bool,

    /// Emit debug-severity log entries
    #[serde(default)]
    pub debug: bool,

    /// Prefix error messages with a terminal bell
    #[serde(default)]
    pub beep_on_error: bool,

    /// Sources use the indented syntax (`.sass` instead of `.scss`)
    #[serde(default)]
    pub indented_syntax: bool,

    /// Write a `<output>.map` file next to each compiled output
    #[serde(default)]
    pub source_map: bool,

    /// Inline the source map into the compiled text as a data URI
    #[serde(default)]
    pub source_map_embed: bool,

    /// Serve compiled text directly instead of writing it to `dest`
    #[serde(default)]
    pub response: bool,

    /// `Cache-Control` max-age in seconds for served responses
    #[serde(default)]
    pub max_age: u64,

    #[serde(default)]
    pub output_style: OutputStyle,

    /// Extra directories searched for imports, after the source's own directory
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
}

impl MiddlewareConfig {
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: None,
            root: None,
            prefix: None,
            force: false,
            debug: false,
            beep_on_error: false,
            indented_syntax: false,
            source_map: false,
            source_map_embed: false,
            response: false,
            max_age: 0,
            output_style: OutputStyle::default(),
            include_paths: Vec::new(),
        }
    }

    /// Output directory, falling back to the source directory
    pub fn dest_dir(&self) -> &Path {
        self.dest.as_deref().unwrap_or(self.src.as_path())
    }

    pub fn source_extension(&self) -> &'static str {
        if self.indented_syntax {
            "sass"
        } else {
            "scss"
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("src must not be empty".to_string()));
        }
        if let Some(prefix) = &self.prefix {
            if !prefix.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "prefix '{}' must start with '/'",
                    prefix
                )));
            }
        }
        Ok(())
    }

    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str::<MiddlewareConfig>(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<MiddlewareConfig>(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Write a starter configuration to `path` as pretty JSON
    pub fn init_file(path: &Path, src: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let config = MiddlewareConfig::new(src);
        let json = serde_json::to_string_pretty(&config).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge command-line overrides into this configuration
    pub fn merge(&mut self, overrides: &ConfigOverrides) {
        if let Some(src) = &overrides.src {
            self.src = src.clone();
        }
        if let Some(dest) = &overrides.dest {
            self.dest = Some(dest.clone());
        }
        if let Some(root) = &overrides.root {
            self.root = Some(root.clone());
        }
        if let Some(prefix) = &overrides.prefix {
            self.prefix = Some(prefix.clone());
        }
        if let Some(force) = overrides.force {
            self.force = force;
        }
        if let Some(debug) = overrides.debug {
            self.debug = debug;
        }
        if let Some(beep) = overrides.beep_on_error {
            self.beep_on_error = beep;
        }
        if let Some(indented) = overrides.indented_syntax {
            self.indented_syntax = indented;
        }
        if let Some(source_map) = overrides.source_map {
            self.source_map = source_map;
        }
        if let Some(embed) = overrides.source_map_embed {
            self.source_map_embed = embed;
        }
        if let Some(response) = overrides.response {
            self.response = response;
        }
        if let Some(max_age) = overrides.max_age {
            self.max_age = max_age;
        }
        if let Some(style) = overrides.output_style {
            self.output_style = style;
        }
        if !overrides.include_paths.is_empty() {
            self.include_paths.extend(overrides.include_paths.iter().cloned());
        }
    }
}

/// Optional settings supplied on the command line, layered over a config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub src: Option<PathBuf>,
    pub dest: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub prefix: Option<String>,
    pub force: Option<bool>,
    pub debug: Option<bool>,
    pub beep_on_error: Option<bool>,
    pub indented_syntax: Option<bool>,
    pub source_map: Option<bool>,
    pub source_map_embed: Option<bool>,
    pub response: Option<bool>,
    pub max_age: Option<u64>,
    pub output_style: Option<OutputStyle>,
    pub include_paths: Vec<PathBuf>,
}
