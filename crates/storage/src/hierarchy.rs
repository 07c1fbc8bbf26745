//! Hierarchical directory allocation.
//!
//! Converts a monotonic counter into a bounded-fan-out nested directory
//! path so no single directory accumulates an unbounded number of files.
//! The counter is persisted to a `.counter` file so allocation survives
//! process restarts.

use crate::error::{DataStoreError, DataStoreResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Name of the persisted counter file under the allocator root.
pub const COUNTER_FILE: &str = ".counter";

/// Persist the counter after this many consumed increments.
const FLUSH_THRESHOLD: i64 = 200;

/// Derive the relative directory path for a counter value.
///
/// Digits are extracted least-significant first and rendered as uppercase
/// hexadecimal segments prefixed with `x`:
/// `hierarchical_path(0, 3) == "/x0"`, `hierarchical_path(16, 3) == "/x0/x1"`,
/// `hierarchical_path(99, 3) == "/x3/x6"`.
///
/// `max_occurrence` bounds the per-directory entry count elsewhere in the
/// allocator; here it is validated only. Both arguments are checked and an
/// invalid-argument error is raised rather than coercing.
pub fn hierarchical_path(counter: i64, max_occurrence: i64) -> DataStoreResult<String> {
    if counter < 0 {
        return Err(DataStoreError::InvalidArgument(format!(
            "counter must be >= 0, got {counter}"
        )));
    }
    if max_occurrence < 2 {
        return Err(DataStoreError::InvalidArgument(format!(
            "max_occurrence must be >= 2, got {max_occurrence}"
        )));
    }

    let mut path = String::new();
    let mut tmp = counter;
    loop {
        path.push_str(&format!("/x{:X}", tmp % 16));
        tmp /= 16;
        if tmp == 0 {
            break;
        }
    }
    Ok(path)
}

struct CounterState {
    counter: i64,
    /// Increments consumed since the last flush.
    unflushed: i64,
}

/// Allocates directories under a root, keeping every returned directory
/// below `max_items` non-directory entries.
///
/// One mutex serializes the resolve-and-persist sequence; the owning
/// process calls `shutdown()` exactly once on exit (the call itself is
/// idempotent) to flush the counter.
pub struct HierarchicalDirectoryAllocator {
    root: PathBuf,
    max_items: u64,
    max_occurrence: i64,
    state: Mutex<CounterState>,
}

impl HierarchicalDirectoryAllocator {
    /// Create an allocator rooted at `root`, loading the persisted counter.
    ///
    /// A missing counter file is not an error: the counter starts at zero
    /// with a warning, and directory probing skips past full directories.
    pub fn new(
        root: impl Into<PathBuf>,
        max_items: u64,
        max_occurrence: i64,
    ) -> DataStoreResult<Self> {
        if max_occurrence < 2 {
            return Err(DataStoreError::InvalidArgument(format!(
                "max_occurrence must be >= 2, got {max_occurrence}"
            )));
        }
        let root = root.into();
        fs::create_dir_all(&root)?;

        let counter = Self::load_counter(&root)?;
        Ok(Self {
            root,
            max_items,
            max_occurrence,
            state: Mutex::new(CounterState {
                counter,
                unflushed: 0,
            }),
        })
    }

    fn load_counter(root: &Path) -> DataStoreResult<i64> {
        let path = root.join(COUNTER_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => text.trim().parse::<i64>().map_err(|e| {
                DataStoreError::InvalidArgument(format!(
                    "corrupt counter file {}: {e}",
                    path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %path.display(),
                    "counter file missing, starting allocation at 0"
                );
                Ok(0)
            }
            Err(e) => Err(DataStoreError::Io(e)),
        }
    }

    fn persist_counter(&self, counter: i64) -> DataStoreResult<()> {
        // Write-then-rename keeps a crash from truncating the counter.
        let tmp = self.root.join(format!("{COUNTER_FILE}.tmp"));
        fs::write(&tmp, counter.to_string())?;
        fs::rename(&tmp, self.root.join(COUNTER_FILE))?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Count non-directory entries in a directory.
    fn file_count(dir: &Path) -> DataStoreResult<u64> {
        let mut count = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Resolve a directory guaranteed to hold fewer than `max_items`
    /// non-directory entries and, when given, not already contain
    /// `filename`. Creates the directory if necessary.
    ///
    /// Directories skipped because `filename` was already present are
    /// "claimed": the probe advances past them but they do not consume the
    /// persisted counter, so other files may still land there later.
    pub fn get_directory(&self, filename: Option<&str>) -> DataStoreResult<PathBuf> {
        let mut state = self.state.lock().unwrap();

        let start = state.counter;
        let mut probe = start;
        let mut claimed = 0i64;

        let dir = loop {
            let rel = hierarchical_path(probe, self.max_occurrence)?;
            let dir = self.root.join(rel.trim_start_matches('/'));

            if let Some(name) = filename {
                if dir.join(name).exists() {
                    probe += 1;
                    claimed += 1;
                    continue;
                }
            }

            if !dir.exists() {
                fs::create_dir_all(&dir)?;
                break dir;
            }

            if Self::file_count(&dir)? < self.max_items {
                break dir;
            }

            probe += 1;
        };

        state.counter = probe - claimed;
        state.unflushed += state.counter - start;
        if state.unflushed >= FLUSH_THRESHOLD {
            self.persist_counter(state.counter)?;
            state.unflushed = 0;
        }

        Ok(dir)
    }

    /// Flush the counter to disk. Idempotent; the owning process registers
    /// exactly one shutdown call per allocator instance.
    pub fn shutdown(&self) -> DataStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        self.persist_counter(state.counter)?;
        state.unflushed = 0;
        Ok(())
    }

    #[cfg(test)]
    fn counter(&self) -> i64 {
        self.state.lock().unwrap().counter
    }
}
