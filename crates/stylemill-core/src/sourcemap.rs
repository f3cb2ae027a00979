use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const MAPPING_MARKER: &str = "/*# sourceMappingURL=";

/// Remove a trailing `sourceMappingURL` comment, if any
pub fn strip_mapping_comment(css: &str) -> &str {
    let trimmed = css.trim_end();
    match trimmed.rfind(MAPPING_MARKER) {
        Some(idx) if trimmed.ends_with("*/") => trimmed[..idx].trim_end(),
        _ => css,
    }
}

/// Replace any mapping comment with one pointing at `url`
pub fn with_mapping_url(css: &str, url: &str) -> String {
    let body = strip_mapping_comment(css);
    format!("{}\n\n{}{} */\n", body, MAPPING_MARKER, url)
}

/// Inline `map` into the compiled text as a base64 data URI
pub fn embed(css: &str, map: &str) -> String {
    let url = format!(
        "data:application/json;charset=utf-8;base64,{}",
        STANDARD.encode(map)
    );
    with_mapping_url(css, &url)
}
