//! The shared-library registry.
//!
//! Maps a library's base filename to the metadata extracted for it. Entries
//! are inserted at most once and never replaced; only [`SharedLibRegistry::clear`]
//! removes them.

use crate::{
    Result,
    metadata::SharedLibData,
    not_found,
    sync::{AtomicUsize, Ordering, SharedLock},
};
use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use hashbrown::HashMap;

/// Strips any directory components from a library path.
///
/// `"/system/lib/libfoo.so"` and `"libfoo.so"` both yield `"libfoo.so"`.
/// Only `/` separates components; a backslash is part of the file name.
#[inline]
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A concurrency-safe cache of shared-library metadata keyed by base filename.
///
/// Lookups and snapshots take the lock in read mode and never block each
/// other; inserts and clears take it in write mode. An entry becomes visible
/// to readers only once fully built, because it is moved into the map under
/// the write lock.
///
/// # Examples
/// ```rust,no_run
/// use sharedlibs::{Enumerator, SharedLibRegistry};
///
/// let registry = SharedLibRegistry::new();
/// Enumerator::new().refresh(&registry)?;
/// let libc = registry.lookup("libc.so")?;
/// println!("{:?}", libc);
/// # Ok::<(), sharedlibs::Error>(())
/// ```
pub struct SharedLibRegistry {
    libs: SharedLock<HashMap<String, SharedLibData>>,
    /// Bumped on every successful insert and on clear.
    generation: AtomicUsize,
}

impl Default for SharedLibRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for SharedLibRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let libs = self.libs.read();
        f.debug_struct("SharedLibRegistry")
            .field("libs", &libs.keys().collect::<Vec<_>>())
            .field("generation", &self.generation())
            .finish()
    }
}

impl SharedLibRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            libs: SharedLock::new(HashMap::new()),
            generation: AtomicUsize::new(0),
        }
    }

    /// Returns a copy of the metadata registered under the base filename of `name`.
    ///
    /// # Errors
    /// [`Error::NotFound`](crate::Error::NotFound) if no such entry exists.
    pub fn lookup(&self, name: &str) -> Result<SharedLibData> {
        let libs = self.libs.read();
        let short = base_name(name);
        libs.get(short).cloned().ok_or_else(|| {
            #[cfg(feature = "log")]
            log::debug!("Library {} not found in registry", short);
            not_found(short)
        })
    }

    /// Returns `true` if an entry exists for the base filename of `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.libs.read().contains_key(base_name(name))
    }

    /// Copies out every entry. Order is unspecified.
    ///
    /// The returned vector is independent of the registry: later inserts or a
    /// clear do not affect it.
    pub fn snapshot(&self) -> Vec<(String, SharedLibData)> {
        let libs = self.libs.read();
        let mut all = Vec::with_capacity(libs.len());
        all.extend(libs.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    /// Inserts `data` under the base filename of `name` unless an entry already exists.
    ///
    /// The existence check and the insert happen under one write-lock
    /// acquisition. Returns `false`, leaving the registry untouched, when the
    /// name is already present.
    pub fn insert_if_absent(&self, name: &str, data: SharedLibData) -> bool {
        let short = base_name(name);
        let mut libs = self.libs.write();
        if libs.contains_key(short) {
            return false;
        }
        libs.insert(short.to_string(), data);
        self.generation.fetch_add(1, Ordering::Release);
        true
    }

    /// Removes every entry.
    ///
    /// Intended for tests and explicit resets; a refresh never evicts.
    pub fn clear(&self) {
        let mut libs = self.libs.write();
        libs.clear();
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// Number of registered libraries.
    pub fn len(&self) -> usize {
        self.libs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.libs.read().is_empty()
    }

    /// A counter that changes whenever the set of entries changes.
    ///
    /// Comparing two readings tells a caller whether a cached snapshot is stale.
    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::Acquire)
    }
}
