//! Process-wide entry points.
//!
//! Callers that do not want to own a [`SharedLibRegistry`] can use the
//! lazily created instance here. It lives for the rest of the process and is
//! populated by [`refresh`] with a default [`Enumerator`].

use crate::{
    Result,
    enumerator::{Enumerator, RefreshReport},
    metadata::SharedLibData,
    registry::SharedLibRegistry,
};
use alloc::{string::String, vec::Vec};
use spin::Lazy;

static SHARED_LIBS: Lazy<SharedLibRegistry> = Lazy::new(SharedLibRegistry::new);
static ENUMERATOR: Lazy<Enumerator> = Lazy::new(Enumerator::new);

/// The process-wide registry.
#[inline]
pub fn shared_libs() -> &'static SharedLibRegistry {
    &SHARED_LIBS
}

/// Discovers the libraries mapped right now and adds the new ones to
/// [`shared_libs`].
///
/// # Errors
/// [`Error::ApiUnavailable`](crate::Error::ApiUnavailable) if the host
/// offers no usable discovery mechanism.
pub fn refresh() -> Result<RefreshReport> {
    ENUMERATOR.refresh(&SHARED_LIBS)
}

/// Looks up a library in [`shared_libs`] by name or path.
///
/// # Errors
/// [`Error::NotFound`](crate::Error::NotFound) if it has not been registered.
pub fn shared_lib(name: &str) -> Result<SharedLibData> {
    SHARED_LIBS.lookup(name)
}

/// Every entry of [`shared_libs`], possibly none.
pub fn all_shared_libs() -> Vec<(String, SharedLibData)> {
    SHARED_LIBS.snapshot()
}

/// Empties [`shared_libs`]. For tests only.
#[doc(hidden)]
pub fn clear_shared_libs() {
    SHARED_LIBS.clear();
}

/// C entry point for [`refresh`]: `0` on success, `1` if no discovery
/// mechanism was available.
#[cfg(feature = "capi")]
#[unsafe(no_mangle)]
pub extern "C" fn refresh_shared_libs() -> core::ffi::c_int {
    match refresh() {
        Ok(_) => 0,
        Err(_err) => {
            #[cfg(feature = "log")]
            log::error!("refresh_shared_libs failed: {}", _err);
            1
        }
    }
}
