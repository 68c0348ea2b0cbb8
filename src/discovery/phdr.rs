use super::DiscoveryStrategy;
use crate::{Result, api_unavailable, metadata::LibraryDescriptor, os::PhdrIter};
use alloc::format;
use core::ffi::CStr;
use spin::Once;

/// Discovery through the loader-iteration API.
///
/// The iteration function is looked up with `dlsym` on first use instead of
/// being linked, so a loader that lacks it makes the strategy unavailable
/// rather than the program unloadable. The lookup result is cached.
pub struct PhdrIterStrategy {
    symbol: &'static CStr,
    resolved: Once<Option<PhdrIter>>,
}

impl Default for PhdrIterStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for PhdrIterStrategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PhdrIterStrategy")
            .field("symbol", &self.symbol)
            .field("resolved", &self.resolved.get().map(|r| r.is_some()))
            .finish()
    }
}

impl PhdrIterStrategy {
    /// Uses `dl_iterate_phdr`.
    pub const fn new() -> Self {
        Self::with_symbol(c"dl_iterate_phdr")
    }

    /// Uses another exported function with the `dl_iterate_phdr` signature.
    pub const fn with_symbol(symbol: &'static CStr) -> Self {
        Self {
            symbol,
            resolved: Once::new(),
        }
    }

    fn resolve(&self) -> Option<PhdrIter> {
        *self.resolved.call_once(|| {
            let iter = PhdrIter::resolve(self.symbol);
            #[cfg(feature = "log")]
            match iter {
                Some(_) => log::debug!("Resolved {:?}", self.symbol),
                None => log::warn!("{:?} is not exported by the loader", self.symbol),
            }
            iter
        })
    }

    fn unavailable(&self) -> crate::Error {
        api_unavailable(format!("{:?} could not be resolved", self.symbol))
    }
}

impl DiscoveryStrategy for PhdrIterStrategy {
    fn name(&self) -> &'static str {
        "dl_iterate_phdr"
    }

    fn probe(&self) -> Result<()> {
        self.resolve().map(|_| ()).ok_or_else(|| self.unavailable())
    }

    fn discover(&self, visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) -> Result<()> {
        let iter = self.resolve().ok_or_else(|| self.unavailable())?;
        iter.iterate(visit);
        Ok(())
    }
}
