use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylemill_core::{
    CompileError, Disposition, Hooks, MiddlewareConfig, MiddlewareError, MockFileSystem, Request,
    StaleReason, StyleMiddleware,
};
use stylemill_test_helpers::{fixtures, ImportScanningCompiler, RecordingHooks, ScriptedCompiler};

struct Harness {
    mw: StyleMiddleware,
    fs: Arc<MockFileSystem>,
    recorder: RecordingHooks,
}

fn with_scanner(config: MiddlewareConfig) -> Harness {
    let fs = Arc::new(MockFileSystem::new());
    let recorder = RecordingHooks::new();
    let hooks = recorder.attach(Hooks::new(&config));
    let compiler = Arc::new(ImportScanningCompiler::new(fs.clone()));
    let mw = StyleMiddleware::with_dependencies(config, fs.clone(), compiler, hooks).unwrap();
    Harness { mw, fs, recorder }
}

fn with_scripted(config: MiddlewareConfig, compiler: Arc<ScriptedCompiler>) -> Harness {
    let fs = Arc::new(MockFileSystem::new());
    let recorder = RecordingHooks::new();
    let hooks = recorder.attach(Hooks::new(&config));
    let mw = StyleMiddleware::with_dependencies(config, fs.clone(), compiler, hooks).unwrap();
    Harness { mw, fs, recorder }
}

fn site_tree(fs: &MockFileSystem) {
    fs.add_file("/app/styles/site.scss", fixtures::site_scss());
    fs.add_file("/app/styles/_vars.scss", fixtures::vars_scss());
    fs.add_file("/app/styles/_mixins.scss", fixtures::mixins_scss());
}

fn reason(disposition: &Disposition) -> Option<&StaleReason> {
    match disposition {
        Disposition::Served { reason, .. } | Disposition::Written { reason, .. } => Some(reason),
        _ => None,
    }
}

// ============================================================================
// Request scenarios
// ============================================================================

#[tokio::test]
async fn test_newer_source_recompiles_in_file_mode() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    h.fs.add_file("/app/styles/a.scss", fixtures::plain_scss());
    h.mw.process(&Request::get("/a.css")).await.unwrap();

    h.fs.touch("/app/styles/a.scss");
    let outcome = h.mw.handle(&Request::get("/a.css")).await;

    assert!(outcome.is_next());
    assert!(outcome.error().is_none());
    assert_eq!(h.fs.write_count("/app/styles/a.css"), 2);
}

#[tokio::test]
async fn test_newer_source_served_from_memory() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.response = true;
    let h = with_scanner(config);
    h.fs.add_file("/app/styles/a.scss", fixtures::plain_scss());

    let outcome = h.mw.handle(&Request::get("/a.css")).await;
    let response = outcome.response().expect("compiled response");

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Content-Type"), Some("text/css"));
    assert_eq!(response.header("Cache-Control"), Some("max-age=0"));
    assert!(response.body.contains("color: red;"));
    assert!(h.fs.writes().is_empty());
}

#[tokio::test]
async fn test_first_request_compiles_even_when_output_is_newer() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    h.fs.add_file("/app/styles/a.scss", fixtures::plain_scss());
    h.fs.add_file("/app/styles/a.css", "/* old build */");

    let disposition = h.mw.process(&Request::get("/a.css")).await.unwrap();

    assert_eq!(reason(&disposition), Some(&StaleReason::NotInLedger));
    assert!(h.fs.contents("/app/styles/a.css").unwrap().contains("color: red;"));
}

#[tokio::test]
async fn test_touched_partial_recompiles_entry() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    site_tree(&h.fs);
    h.mw.process(&Request::get("/site.css")).await.unwrap();

    let fresh = h.mw.process(&Request::get("/site.css")).await.unwrap();
    assert!(matches!(fresh, Disposition::Fresh));

    h.fs.touch("/app/styles/_vars.scss");
    let disposition = h.mw.process(&Request::get("/site.css")).await.unwrap();

    assert_eq!(
        reason(&disposition),
        Some(&StaleReason::IncludeChanged(PathBuf::from("/app/styles/_vars.scss")))
    );
    assert_eq!(h.fs.write_count("/app/styles/site.css"), 2);
}

#[tokio::test]
async fn test_prefix_scopes_requests() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.dest = Some(PathBuf::from("/app/public"));
    config.prefix = Some("/prefix".to_string());
    let h = with_scanner(config);
    h.fs.add_file("/app/styles/a.scss", fixtures::plain_scss());

    let skipped = h.mw.process(&Request::get("/other/a.css")).await.unwrap();
    assert!(matches!(skipped, Disposition::NotApplicable));

    let compiled = h.mw.process(&Request::get("/prefix/a.css")).await.unwrap();
    match compiled {
        Disposition::Written { output, .. } => {
            assert_eq!(output, PathBuf::from("/app/public/a.css"))
        }
        other => panic!("expected a written output, got {:?}", other),
    }
}

// ============================================================================
// Ledger behavior
// ============================================================================

#[tokio::test]
async fn test_repeat_requests_are_idempotent() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    site_tree(&h.fs);

    h.mw.process(&Request::get("/site.css")).await.unwrap();
    for _ in 0..3 {
        let disposition = h.mw.process(&Request::get("/site.css")).await.unwrap();
        assert!(matches!(disposition, Disposition::Fresh));
    }
    assert_eq!(h.fs.write_count("/app/styles/site.css"), 1);
}

#[tokio::test]
async fn test_ledger_records_transitive_includes() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    site_tree(&h.fs);
    h.mw.process(&Request::get("/site.css")).await.unwrap();

    assert_eq!(
        h.mw.ledger().includes(Path::new("/app/styles/site.scss")),
        Some(vec![
            PathBuf::from("/app/styles/_vars.scss"),
            PathBuf::from("/app/styles/_mixins.scss"),
        ])
    );
}

#[tokio::test]
async fn test_compile_error_is_retried_on_next_request() {
    let h = with_scanner(MiddlewareConfig::new("/app/styles"));
    h.fs.add_file("/app/styles/broken.scss", fixtures::broken_scss());

    let outcome = h.mw.handle(&Request::get("/broken.css")).await;
    match outcome.error() {
        Some(MiddlewareError::Compile(err)) => {
            assert_eq!(err.line, 2);
            assert_eq!(err.file, PathBuf::from("/app/styles/broken.scss"));
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert!(!h.mw.ledger().is_resolved(Path::new("/app/styles/broken.scss")));
    assert_eq!(h.recorder.error_count(), 1);

    h.fs.add_file("/app/styles/_nope.scss", "$x: 1;");
    let disposition = h.mw.process(&Request::get("/broken.css")).await.unwrap();
    assert_eq!(reason(&disposition), Some(&StaleReason::NotInLedger));
    assert!(h.mw.ledger().is_resolved(Path::new("/app/styles/broken.scss")));
}

#[tokio::test]
async fn test_missing_partial_forces_recompile() {
    let compiler = ScriptedCompiler::returning("a{}", &[PathBuf::from("/app/styles/_gone.scss")]);
    let h = with_scripted(MiddlewareConfig::new("/app/styles"), compiler.clone());
    h.fs.add_file("/app/styles/a.scss", "a {}");
    h.mw.process(&Request::get("/a.css")).await.unwrap();

    let disposition = h.mw.process(&Request::get("/a.css")).await.unwrap();
    assert_eq!(
        reason(&disposition),
        Some(&StaleReason::IncludeUnreadable(PathBuf::from("/app/styles/_gone.scss")))
    );
    assert_eq!(compiler.calls(), 2);
}

#[tokio::test]
async fn test_force_recompiles_every_time() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.force = true;
    let compiler = ScriptedCompiler::new();
    let h = with_scripted(config, compiler.clone());
    h.fs.add_file("/app/styles/a.scss", "a {}");

    for _ in 0..3 {
        let disposition = h.mw.process(&Request::get("/a.css")).await.unwrap();
        assert_eq!(reason(&disposition), Some(&StaleReason::Forced));
    }
    assert_eq!(compiler.calls(), 3);
}

// ============================================================================
// Request filtering
// ============================================================================

#[tokio::test]
async fn test_write_methods_are_ignored() {
    let compiler = ScriptedCompiler::new();
    let h = with_scripted(MiddlewareConfig::new("/app/styles"), compiler.clone());
    h.fs.add_file("/app/styles/a.scss", "a {}");

    for method in ["POST", "PUT", "DELETE"] {
        let disposition = h.mw.process(&Request::new(method, "/a.css")).await.unwrap();
        assert!(matches!(disposition, Disposition::NotApplicable));
    }
    let head = h.mw.process(&Request::new("HEAD", "/a.css")).await.unwrap();
    assert!(matches!(head, Disposition::Written { .. }));
    assert_eq!(compiler.calls(), 1);
}

#[tokio::test]
async fn test_missing_source_is_silent() {
    let compiler = ScriptedCompiler::new();
    let h = with_scripted(MiddlewareConfig::new("/app/styles"), compiler.clone());

    let outcome = h.mw.handle(&Request::get("/vendor/bootstrap.css")).await;
    assert!(outcome.is_next());
    assert!(outcome.error().is_none());
    assert_eq!(compiler.calls(), 0);
    assert_eq!(h.recorder.error_count(), 0);
}

#[tokio::test]
async fn test_vanished_source_after_first_build_is_skipped() {
    let compiler = ScriptedCompiler::new();
    let h = with_scripted(MiddlewareConfig::new("/app/styles"), compiler.clone());
    h.fs.add_file("/app/styles/a.scss", "a {}");
    h.mw.process(&Request::get("/a.css")).await.unwrap();

    h.fs.remove("/app/styles/a.scss");
    let disposition = h.mw.process(&Request::get("/a.css")).await.unwrap();
    assert!(matches!(disposition, Disposition::SourceMissing));
    assert_eq!(compiler.calls(), 1);
}

// ============================================================================
// Options
// ============================================================================

#[tokio::test]
async fn test_source_map_file_written_beside_output() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.dest = Some(PathBuf::from("/app/public/css"));
    config.source_map = true;
    let h = with_scanner(config);
    site_tree(&h.fs);

    let disposition = h.mw.process(&Request::get("/site.css")).await.unwrap();
    match disposition {
        Disposition::Written { source_map, error, .. } => {
            assert_eq!(source_map, Some(PathBuf::from("/app/public/css/site.css.map")));
            assert!(error.is_none());
        }
        other => panic!("expected a written output, got {:?}", other),
    }

    let css = h.fs.contents("/app/public/css/site.css").unwrap();
    assert!(css.ends_with("/*# sourceMappingURL=site.css.map */\n"));
    let map = h.fs.contents("/app/public/css/site.css.map").unwrap();
    assert!(map.contains("file:///app/styles/_vars.scss"));
}

#[tokio::test]
async fn test_indented_syntax_uses_sass_sources() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.indented_syntax = true;
    let h = with_scanner(config);
    h.fs.add_file("/app/styles/site.sass", fixtures::indented_sass());
    h.fs.add_file("/app/styles/_vars.sass", "$text: #333");

    let disposition = h.mw.process(&Request::get("/site.css")).await.unwrap();
    assert!(matches!(disposition, Disposition::Written { .. }));
    assert_eq!(
        h.mw.ledger().includes(Path::new("/app/styles/site.sass")),
        Some(vec![PathBuf::from("/app/styles/_vars.sass")])
    );
}

#[tokio::test]
async fn test_debug_entries_name_source_and_dest() {
    let mut config = MiddlewareConfig::new("/app/styles");
    config.dest = Some(PathBuf::from("/app/public"));
    config.debug = true;
    let h = with_scanner(config);
    h.fs.add_file("/app/styles/a.scss", fixtures::plain_scss());

    h.mw.process(&Request::get("/a.css")).await.unwrap();

    assert_eq!(h.recorder.values("source"), vec!["/app/styles/a.scss".to_string()]);
    assert_eq!(h.recorder.values("dest"), vec!["/app/public/a.css".to_string()]);
    assert_eq!(h.recorder.values("stale"), vec![StaleReason::NotInLedger.to_string()]);
}

#[tokio::test]
async fn test_compile_error_display_is_located() {
    let compiler = ScriptedCompiler::new();
    compiler.fail_with(CompileError::new("/app/styles/a.scss", 4, 2, "expected \"}\"."));
    let h = with_scripted(MiddlewareConfig::new("/app/styles"), compiler);
    h.fs.add_file("/app/styles/a.scss", "a {");

    h.mw.handle(&Request::get("/a.css")).await;

    let errors = h.recorder.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("in /app/styles/a.scss on line 4, column 2"));
}
