//! Strategies for discovering the shared libraries mapped into this process.
//!
//! Two interchangeable [`DiscoveryStrategy`] implementations are provided:
//!
//! * [`PhdrIterStrategy`] drives the loader-iteration API (`dl_iterate_phdr`),
//!   resolved at run time so its absence is a recoverable condition.
//! * [`LinkMapStrategy`] walks the loader's internal module list. It depends
//!   on an undocumented structure layout, described by a [`LinkMapLayout`]
//!   contract and verified before anything is reported.
//!
//! The [`Enumerator`](crate::Enumerator) picks between them by probing the host.

mod link_map;
mod phdr;

pub use link_map::{LayoutCheck, LinkMap, LinkMapLayout, LinkMapStrategy};
pub use phdr::PhdrIterStrategy;

use crate::{Result, metadata::LibraryDescriptor, registry::base_name};

/// A way of enumerating the objects currently mapped into the process.
///
/// # Examples
/// ```rust
/// use sharedlibs::{DiscoveryStrategy, LibraryDescriptor, Result};
///
/// struct Nothing;
///
/// impl DiscoveryStrategy for Nothing {
///     fn name(&self) -> &'static str {
///         "nothing"
///     }
///
///     fn probe(&self) -> Result<()> {
///         Ok(())
///     }
///
///     fn discover(&self, _visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait DiscoveryStrategy: Send + Sync {
    /// A short label used in logs and refresh reports.
    fn name(&self) -> &'static str;

    /// Checks that the host provides what this strategy needs.
    ///
    /// # Errors
    /// [`Error::ApiUnavailable`](crate::Error::ApiUnavailable) if it does not.
    fn probe(&self) -> Result<()>;

    /// Reports each mapped object as a `(name, descriptor)` pair.
    ///
    /// Fails with [`Error::ApiUnavailable`](crate::Error::ApiUnavailable)
    /// without calling `visit` when the host capability is missing.
    fn discover(&self, visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) -> Result<()>;
}

/// Decides which discovered objects count as shared libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFilter {
    /// The full name must end with the given suffix.
    Suffix(&'static str),
    /// Accept `.so` and versioned names such as `libc.so.6` or `libz.so.1.3`.
    Versioned,
    /// Accept every named object.
    Any,
}

impl Default for LibraryFilter {
    fn default() -> Self {
        LibraryFilter::Suffix(".so")
    }
}

impl LibraryFilter {
    /// Returns `true` if `name` passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            LibraryFilter::Suffix(suffix) => name.ends_with(suffix),
            LibraryFilter::Versioned => {
                let short = base_name(name);
                if short.ends_with(".so") {
                    return true;
                }
                short.rfind(".so.").is_some_and(|idx| {
                    short[idx + 4..]
                        .split('.')
                        .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
                })
            }
            LibraryFilter::Any => !name.is_empty(),
        }
    }
}
