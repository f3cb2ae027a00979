use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stylemill_core::{
    ConfigOverrides, Disposition, Hooks, MiddlewareConfig, OutputStyle, RealFileSystem, Request,
    SassCommandCompiler, StyleMiddleware,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE_NAMES: [&str; 3] = ["stylemill.json", "stylemill.yaml", "stylemill.yml"];

/// Stylemill - compile style sheets on request, only when they are stale
#[derive(Parser, Debug, Clone)]
#[command(name = "stylemill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Request paths to process, e.g. /css/site.css
    #[arg(value_name = "REQUEST_PATH")]
    paths: Vec<String>,

    /// Path to a stylemill.json or stylemill.yaml configuration file
    #[arg(short, long, value_name = "FILE")]
    project: Option<PathBuf>,

    /// Directory holding the style-sheet sources
    #[arg(long, value_name = "DIR")]
    src: Option<PathBuf>,

    /// Directory compiled output is written to
    #[arg(long, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Directory src and dest are re-rooted under
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// URL prefix stripped from request paths
    #[arg(long, value_name = "PREFIX")]
    prefix: Option<String>,

    /// Recompile on every request
    #[arg(long)]
    force: bool,

    /// Emit debug log entries
    #[arg(long)]
    debug: bool,

    /// Ring the terminal bell on errors
    #[arg(long)]
    beep_on_error: bool,

    /// Sources use the indented syntax (.sass)
    #[arg(long)]
    indented_syntax: bool,

    /// Write a source map next to each output
    #[arg(long)]
    source_map: bool,

    /// Inline the source map into the compiled output
    #[arg(long)]
    source_map_embed: bool,

    /// Print compiled CSS instead of writing it to dest
    #[arg(long)]
    response: bool,

    /// Cache-Control max-age in seconds for served responses
    #[arg(long, value_name = "SECONDS")]
    max_age: Option<u64>,

    /// Output style (nested, expanded, compact, compressed)
    #[arg(long, value_name = "STYLE", value_parser = parse_output_style)]
    output_style: Option<OutputStyle>,

    /// Extra import search directory (repeatable)
    #[arg(long = "include-path", value_name = "DIR")]
    include_paths: Vec<PathBuf>,

    /// dart-sass executable to compile with
    #[arg(long, value_name = "PROGRAM", default_value = "sass")]
    sass: PathBuf,

    /// HTTP method used for each request path
    #[arg(long, value_name = "METHOD", default_value = "GET")]
    method: String,

    /// Re-run the request paths whenever a source changes
    #[arg(short, long)]
    watch: bool,

    /// Write a starter stylemill.json in the current directory
    #[arg(long)]
    init: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --debug
    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.init {
        return init_project(&cli);
    }

    let config = load_config(&cli)?;

    if cli.paths.is_empty() {
        eprintln!("Error: No request paths specified. Use --help for usage information.");
        std::process::exit(1);
    }

    info!("Serving style sheets from {}", config.src.display());
    debug!("Output directory: {}", config.dest_dir().display());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let hooks = Hooks::new(&config);
    let watch_dirs = watch_dirs(&config);
    let middleware = StyleMiddleware::with_dependencies(
        config,
        Arc::new(RealFileSystem::new()),
        Arc::new(SassCommandCompiler::with_program(&cli.sass)),
        hooks,
    )?;

    if cli.watch {
        watch_mode(&runtime, &middleware, &cli, &watch_dirs)
    } else {
        let failures = runtime.block_on(run_requests(&middleware, &cli.paths, &cli.method));
        if failures > 0 {
            anyhow::bail!("{} request(s) failed", failures);
        }
        Ok(())
    }
}

fn parse_output_style(value: &str) -> Result<OutputStyle, String> {
    match value {
        "nested" => Ok(OutputStyle::Nested),
        "expanded" => Ok(OutputStyle::Expanded),
        "compact" => Ok(OutputStyle::Compact),
        "compressed" => Ok(OutputStyle::Compressed),
        other => Err(format!(
            "unknown output style '{}' (expected nested, expanded, compact or compressed)",
            other
        )),
    }
}

/// Write a starter configuration and create the source directory
fn init_project(cli: &Cli) -> anyhow::Result<()> {
    let path = PathBuf::from(CONFIG_FILE_NAMES[0]);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    let src = cli.src.clone().unwrap_or_else(|| PathBuf::from("styles"));
    MiddlewareConfig::init_file(&path, &src)?;
    println!("Created {}", path.display());

    std::fs::create_dir_all(&src)
        .with_context(|| format!("Failed to create {}", src.display()))?;
    println!("Created {}/ directory", src.display());
    Ok(())
}

fn find_config_file(cli: &Cli) -> Option<PathBuf> {
    if let Some(path) = &cli.project {
        return Some(path.clone());
    }
    CONFIG_FILE_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
}

fn load_config(cli: &Cli) -> anyhow::Result<MiddlewareConfig> {
    let mut config = match find_config_file(cli) {
        Some(path) => MiddlewareConfig::from_file(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => {
            let src = cli.src.clone().context(
                "No source directory. Pass --src or create stylemill.json with --init",
            )?;
            MiddlewareConfig::new(src)
        }
    };

    config.merge(&overrides_from(cli));
    config.validate()?;
    Ok(config)
}

fn overrides_from(cli: &Cli) -> ConfigOverrides {
    let flag = |set: bool| set.then_some(true);
    ConfigOverrides {
        src: cli.src.clone(),
        dest: cli.dest.clone(),
        root: cli.root.clone(),
        prefix: cli.prefix.clone(),
        force: flag(cli.force),
        debug: flag(cli.debug),
        beep_on_error: flag(cli.beep_on_error),
        indented_syntax: flag(cli.indented_syntax),
        source_map: flag(cli.source_map),
        source_map_embed: flag(cli.source_map_embed),
        response: flag(cli.response),
        max_age: cli.max_age,
        output_style: cli.output_style,
        include_paths: cli.include_paths.clone(),
    }
}

/// Run every path through the middleware, returning the number of failures
async fn run_requests(middleware: &StyleMiddleware, paths: &[String], method: &str) -> usize {
    let mut failures = 0;
    for path in paths {
        match middleware.process(&Request::new(method, path.as_str())).await {
            Ok(Disposition::NotApplicable) => println!("skipped  {}", path),
            Ok(Disposition::SourceMissing) => println!("missing  {}", path),
            Ok(Disposition::Fresh) => println!("fresh    {}", path),
            Ok(Disposition::Served { style, reason }) => {
                eprintln!("served   {} ({})", path, reason);
                print!("{}", style.css);
            }
            Ok(Disposition::Written {
                output,
                source_map,
                reason,
                error,
            }) => {
                println!("compiled {} -> {} ({})", path, output.display(), reason);
                if let Some(map) = source_map {
                    println!("         map {}", map.display());
                }
                if let Some(err) = error {
                    eprintln!("Error: {}", err);
                    failures += 1;
                }
            }
            Err(err) => {
                eprintln!("Error: {}\n", err);
                failures += 1;
            }
        }
    }
    failures
}

/// Source and include directories, as seen from the working directory
fn watch_dirs(config: &MiddlewareConfig) -> Vec<PathBuf> {
    let rooted = |dir: &Path| match &config.root {
        Some(root) => root.join(dir),
        None => dir.to_path_buf(),
    };
    let mut dirs = vec![rooted(&config.src)];
    dirs.extend(config.include_paths.iter().cloned());
    dirs
}

fn is_style_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("scss") | Some("sass")
    )
}

fn watch_mode(
    runtime: &tokio::runtime::Runtime,
    middleware: &StyleMiddleware,
    cli: &Cli,
    dirs: &[PathBuf],
) -> anyhow::Result<()> {
    use notify::{Event, EventKind, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    println!("Watching for changes... (Press Ctrl+C to stop)");
    runtime.block_on(run_requests(middleware, &cli.paths, &cli.method));

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    for dir in dirs {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        debug!("Watching {}", dir.display());
    }

    let debounce = Duration::from_millis(100);
    let mut last_run = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let relevant = matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) && event.paths.iter().any(|p| is_style_source(p));

                if relevant && last_run.elapsed() >= debounce {
                    println!("\nSources changed, re-running requests...");
                    runtime.block_on(run_requests(middleware, &cli.paths, &cli.method));
                    last_run = Instant::now();
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                anyhow::bail!("File watcher disconnected");
            }
        }
    }
}
