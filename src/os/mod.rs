//! Host dynamic-loader access.
//!
//! Everything that touches the host loader directly lives here: run-time
//! resolution of the loader-iteration API, a handle to the process's own
//! loading state, and the OS version query. Hosts without an ELF dynamic
//! loader get stubs that report every capability as absent.

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod unix;
        pub(crate) use unix::{PhdrIter, self_handle};
        pub use unix::api_level;
    } else {
        mod unsupported;
        pub(crate) use unsupported::{PhdrIter, self_handle};
        pub use unsupported::api_level;
    }
}
