use alloc::{borrow::Cow, string::String};
use core::fmt::Display;

/// Errors reported by the registry and the refresh pass.
///
/// A refresh absorbs [`Error::Parse`] for individual libraries and only
/// surfaces [`Error::ApiUnavailable`]; a lookup surfaces [`Error::NotFound`].
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A library descriptor could not be turned into metadata.
    Parse { msg: Cow<'static, str> },

    /// No entry exists for the requested base filename.
    NotFound { name: String },

    /// Neither the loader-iteration API nor a verified legacy module list
    /// could be obtained on this host.
    ApiUnavailable { msg: Cow<'static, str> },
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Parse { msg } => write!(f, "parse error: {msg}"),
            Error::NotFound { name } => write!(f, "shared library not found: {name}"),
            Error::ApiUnavailable { msg } => write!(f, "loader api unavailable: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

impl Error {
    /// Returns `true` for [`Error::NotFound`].
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns `true` for [`Error::ApiUnavailable`].
    #[inline]
    pub fn is_api_unavailable(&self) -> bool {
        matches!(self, Error::ApiUnavailable { .. })
    }
}

#[cold]
#[inline(never)]
pub(crate) fn parse_error(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::Parse { msg: msg.into() }
}

#[cold]
#[inline(never)]
pub(crate) fn not_found(name: &str) -> Error {
    Error::NotFound {
        name: String::from(name),
    }
}

#[cold]
#[inline(never)]
pub(crate) fn api_unavailable(msg: impl Into<Cow<'static, str>>) -> Error {
    Error::ApiUnavailable { msg: msg.into() }
}
