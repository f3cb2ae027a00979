use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::{MiddlewareConfig, OUTPUT_EXTENSION};

/// Source and output locations for one style-sheet request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Request path after the prefix was stripped
    pub request_path: String,
    pub source: PathBuf,
    pub output: PathBuf,
    /// Sibling `<output>.map`, present when source-map files are enabled
    pub source_map: Option<PathBuf>,
}

/// Maps request URLs onto source and output files
///
/// Resolution is pure: it never touches the filesystem, and the same
/// request always yields the same paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    src: PathBuf,
    dest: PathBuf,
    root: Option<PathBuf>,
    prefix: Option<String>,
    source_extension: &'static str,
    source_map: bool,
}

impl PathResolver {
    pub fn new(config: &MiddlewareConfig) -> Self {
        let prefix = config
            .prefix
            .as_deref()
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty());

        Self {
            src: config.src.clone(),
            dest: config.dest_dir().to_path_buf(),
            root: config.root.clone(),
            prefix,
            source_extension: config.source_extension(),
            source_map: config.source_map && !config.response,
        }
    }

    /// Resolve a request, or `None` when it is not ours to handle
    pub fn resolve(&self, method: &str, url: &str) -> Option<ResolvedPaths> {
        if !is_read_method(method) {
            return None;
        }

        let path = url_path(url);
        let path = match &self.prefix {
            Some(prefix) => strip_url_prefix(path, prefix)?,
            None => path,
        };

        let suffix = format!(".{}", OUTPUT_EXTENSION);
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if !file_name.ends_with(&suffix) || file_name.len() == suffix.len() {
            return None;
        }

        let rel = relative_path(path)?;
        let (source_rel, output_rel, src_dir, dest_dir) = match &self.root {
            Some(root) => {
                let stripped = if self.dest.is_relative() {
                    rel.strip_prefix(normalized(&self.dest))
                        .ok()
                        .map(Path::to_path_buf)
                } else {
                    None
                };
                let rel = stripped.unwrap_or(rel);
                (
                    rel.with_extension(self.source_extension),
                    rel,
                    root.join(&self.src),
                    root.join(&self.dest),
                )
            }
            None => (
                rel.with_extension(self.source_extension),
                rel,
                self.src.clone(),
                self.dest.clone(),
            ),
        };

        let output = dest_dir.join(&output_rel);
        let source_map = self.source_map.then(|| map_path_for(&output));

        Some(ResolvedPaths {
            request_path: path.to_string(),
            source: src_dir.join(source_rel),
            output,
            source_map,
        })
    }
}

/// `<output>.map`
pub fn map_path_for(output: &Path) -> PathBuf {
    let mut map: OsString = output.as_os_str().to_owned();
    map.push(".map");
    PathBuf::from(map)
}

fn is_read_method(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}

/// Path portion of a request URL, without query string or fragment
fn url_path(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Strip `prefix` on a segment boundary
fn strip_url_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Relative filesystem path for a URL path; rejects `..` segments
fn relative_path(path: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => rel.push(s),
        }
    }
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel)
    }
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}
