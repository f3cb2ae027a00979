//! Filesystem capability used by the middleware.
//!
//! Everything the middleware touches on disk goes through [`FileSystem`], so
//! the staleness logic can be exercised against [`MockFileSystem`] with a
//! deterministic clock and injected faults.

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Permission mode for directories created under the output directory
pub const DIR_MODE: u32 = 0o700;

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Modification time of `path`
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    async fn exists(&self, path: &Path) -> bool {
        self.modified(path).await.is_ok()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Create `path` and all missing ancestors
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Filesystem backed by `tokio::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for RealFileSystem {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder.create(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }
}

#[derive(Debug, Clone)]
struct MockFile {
    contents: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MockState {
    files: FxHashMap<PathBuf, MockFile>,
    dirs: FxHashSet<PathBuf>,
    clock: u64,
    stat_failures: FxHashSet<PathBuf>,
    write_failures: FxHashSet<PathBuf>,
    dir_failures: FxHashSet<PathBuf>,
    stat_delays: FxHashMap<PathBuf, Duration>,
    write_delays: FxHashMap<PathBuf, Duration>,
    writes: Vec<PathBuf>,
}

impl MockState {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        clock_time(self.clock)
    }

    fn add_ancestors(&mut self, path: &Path) {
        for ancestor in path.ancestors() {
            if !ancestor.as_os_str().is_empty() {
                self.dirs.insert(ancestor.to_path_buf());
            }
        }
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.as_os_str().is_empty() || path == Path::new("/") || self.dirs.contains(path)
    }
}

fn clock_time(tick: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_000_000 + tick)
}

fn denied(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::PermissionDenied,
        format!("permission denied: {}", path.display()),
    )
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

/// In-memory filesystem with a logical clock
///
/// Every mutation advances the clock by one second, so a file written later
/// is always strictly newer than one written earlier.
#[derive(Debug, Default)]
pub struct MockFileSystem {
    state: Mutex<MockState>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current logical time, without advancing the clock
    pub fn now(&self) -> SystemTime {
        clock_time(self.state().clock)
    }

    /// Add a file (and its parent directories) stamped with the next tick
    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) -> SystemTime {
        let path = path.as_ref();
        let mut state = self.state();
        if let Some(parent) = path.parent() {
            state.add_ancestors(parent);
        }
        let modified = state.tick();
        state.files.insert(
            path.to_path_buf(),
            MockFile {
                contents: contents.as_bytes().to_vec(),
                modified,
            },
        );
        modified
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.state().add_ancestors(path.as_ref());
    }

    /// Bump the modification time of an existing file to the next tick
    pub fn touch(&self, path: impl AsRef<Path>) -> SystemTime {
        let path = path.as_ref();
        let mut state = self.state();
        let modified = state.tick();
        match state.files.get_mut(path) {
            Some(file) => file.modified = modified,
            None => {
                state.files.insert(
                    path.to_path_buf(),
                    MockFile {
                        contents: Vec::new(),
                        modified,
                    },
                );
            }
        }
        modified
    }

    pub fn set_modified(&self, path: impl AsRef<Path>, modified: SystemTime) {
        if let Some(file) = self.state().files.get_mut(path.as_ref()) {
            file.modified = modified;
        }
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.state().files.remove(path.as_ref());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.state()
            .files
            .get(path.as_ref())
            .map(|f| String::from_utf8_lossy(&f.contents).into_owned())
    }

    pub fn modified_at(&self, path: impl AsRef<Path>) -> Option<SystemTime> {
        self.state().files.get(path.as_ref()).map(|f| f.modified)
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        self.state().dirs.contains(path.as_ref())
    }

    /// Make every stat of `path` fail with a permission error
    pub fn fail_stat(&self, path: impl AsRef<Path>) {
        self.state().stat_failures.insert(path.as_ref().to_path_buf());
    }

    /// Make every write to `path` fail with a permission error
    pub fn fail_writes(&self, path: impl AsRef<Path>) {
        self.state().write_failures.insert(path.as_ref().to_path_buf());
    }

    /// Make directory creation fail for `path` and everything below it
    pub fn fail_create_dir(&self, path: impl AsRef<Path>) {
        self.state().dir_failures.insert(path.as_ref().to_path_buf());
    }

    pub fn delay_stat(&self, path: impl AsRef<Path>, delay: Duration) {
        self.state()
            .stat_delays
            .insert(path.as_ref().to_path_buf(), delay);
    }

    pub fn delay_write(&self, path: impl AsRef<Path>, delay: Duration) {
        self.state()
            .write_delays
            .insert(path.as_ref().to_path_buf(), delay);
    }

    /// Paths written through the [`FileSystem`] API, in completion order
    pub fn writes(&self) -> Vec<PathBuf> {
        self.state().writes.clone()
    }

    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        self.state().writes.iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl FileSystem for MockFileSystem {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        let delay = self.state().stat_delays.get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.stat_failures.contains(path) {
            return Err(denied(path));
        }
        if let Some(file) = state.files.get(path) {
            return Ok(file.modified);
        }
        if state.dirs.contains(path) {
            return Ok(clock_time(0));
        }
        Err(not_found(path))
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let state = self.state();
        let file = state.files.get(path).ok_or_else(|| not_found(path))?;
        String::from_utf8(file.contents.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut state = self.state();
        if path.ancestors().any(|a| state.dir_failures.contains(a)) {
            return Err(denied(path));
        }
        state.add_ancestors(path);
        Ok(())
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let delay = self.state().write_delays.get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.write_failures.contains(path) {
            return Err(denied(path));
        }
        let parent = path.parent().unwrap_or(Path::new(""));
        if !state.dir_exists(parent) {
            return Err(not_found(parent));
        }
        let modified = state.tick();
        state.files.insert(
            path.to_path_buf(),
            MockFile {
                contents: contents.to_vec(),
                modified,
            },
        );
        state.writes.push(path.to_path_buf());
        Ok(())
    }
}
