//! Static scan of the files a style sheet loads.
//!
//! A source map only names files that produced output spans, so a partial
//! holding nothing but functions or variables used in expressions can be
//! missing from it. Walking the `@import`, `@use` and `@forward` rules
//! finds every loaded file regardless of what it contributed.

use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use crate::fs::FileSystem;

const EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Every file `entry` transitively loads, in discovery order
///
/// Loads that cannot be found on disk are skipped. The entry itself is
/// never part of the result.
pub async fn loaded_files(
    fs: &dyn FileSystem,
    entry: &Path,
    load_paths: &[PathBuf],
) -> Vec<PathBuf> {
    let entry = normalize(entry);
    let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
    seen.insert(entry.clone());

    let mut found = Vec::new();
    let mut queue = VecDeque::from([entry]);

    while let Some(file) = queue.pop_front() {
        let Ok(text) = fs.read_to_string(&file).await else {
            continue;
        };
        let indented = file.extension().is_some_and(|e| e == "sass");

        for url in load_urls(&text, indented) {
            let Some(path) = locate(fs, &url, &file, load_paths).await else {
                continue;
            };
            if seen.insert(path.clone()) {
                found.push(path.clone());
                queue.push_back(path);
            }
        }
    }
    found
}

/// Resolve one load URL the way dart-sass does
///
/// Tries the importing file's directory first, then each load path. Within
/// a directory: the exact name when it has an extension, otherwise
/// `name.ext` and `_name.ext`, then `name/index.ext` and `name/_index.ext`.
pub async fn locate(
    fs: &dyn FileSystem,
    url: &str,
    importer: &Path,
    load_paths: &[PathBuf],
) -> Option<PathBuf> {
    let candidates = candidates(Path::new(url))?;
    let dirs = importer
        .parent()
        .into_iter()
        .chain(load_paths.iter().map(PathBuf::as_path));

    for dir in dirs {
        for candidate in &candidates {
            let path = normalize(&dir.join(candidate));
            if fs.exists(&path).await {
                return Some(path);
            }
        }
    }
    None
}

fn candidates(relative: &Path) -> Option<Vec<PathBuf>> {
    let name = relative.file_name()?.to_string_lossy().into_owned();
    let partial = |file: &str| relative.with_file_name(format!("_{}", file));

    let has_extension = relative
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.contains(&e));
    if has_extension {
        return Some(vec![relative.to_path_buf(), partial(&name)]);
    }

    let mut out = Vec::new();
    for ext in EXTENSIONS {
        let file = format!("{}.{}", name, ext);
        out.push(relative.with_file_name(&file));
        out.push(partial(&file));
    }
    for ext in EXTENSIONS {
        out.push(relative.join(format!("index.{}", ext)));
        out.push(relative.join(format!("_index.{}", ext)));
    }
    Some(out)
}

/// Collapse `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// URLs named by load rules in `text`, skipping built-in modules, remote
/// URLs and plain-CSS imports
fn load_urls(text: &str, indented: bool) -> Vec<String> {
    let text = strip_comments(text);
    let mut urls = Vec::new();
    let mut rest = text.as_str();

    while let Some(at) = rest.find('@') {
        rest = &rest[at + 1..];
        let Some((rule, after)) = ["import", "use", "forward"].iter().find_map(|rule| {
            let after = rest.strip_prefix(rule)?;
            after.starts_with(char::is_whitespace).then_some((*rule, after))
        }) else {
            continue;
        };

        let end = if indented {
            after.find('\n')
        } else {
            after.find(|c: char| c == ';' || c == '{' || c == '}')
        }
        .unwrap_or(after.len());
        let arguments = &after[..end];
        rest = &after[end..];

        let mut named = quoted_strings(arguments);
        if named.is_empty() && indented && rule == "import" {
            named = arguments
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if rule != "import" {
            named.truncate(1);
        }

        urls.extend(named.into_iter().filter(|url| is_loadable(url, rule)));
    }
    urls
}

fn is_loadable(url: &str, rule: &str) -> bool {
    if url.starts_with("sass:") || url.starts_with("url(") || url.contains("://") {
        return false;
    }
    if url.starts_with("//") {
        return false;
    }
    !(rule == "import" && url.ends_with(".css"))
}

fn quoted_strings(arguments: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = arguments;
    while let Some(open) = rest.find(|c: char| c == '"' || c == '\'') {
        let quote = rest.as_bytes()[open] as char;
        let body = &rest[open + 1..];
        let Some(len) = body.find(quote) else {
            break;
        };
        out.push(body[..len].to_string());
        rest = &body[len + 1..];
    }
    out
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let block = rest.find("/*");
        let line = rest
            .match_indices("//")
            .map(|(i, _)| i)
            .find(|&i| !preceded_by_colon(rest, i));
        match (block, line) {
            (Some(b), l) if l.map_or(true, |l| b < l) => {
                out.push_str(&rest[..b]);
                match rest[b + 2..].find("*/") {
                    Some(close) => rest = &rest[b + 2 + close + 2..],
                    None => return out,
                }
            }
            (_, Some(l)) => {
                out.push_str(&rest[..l]);
                match rest[l..].find('\n') {
                    Some(nl) => rest = &rest[l + nl..],
                    None => return out,
                }
            }
            _ => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// `url(http://...)` and quoted remote URLs keep their `//`
fn preceded_by_colon(text: &str, index: usize) -> bool {
    text[..index].ends_with(':')
}
