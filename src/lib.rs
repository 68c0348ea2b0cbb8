//! # sharedlibs
//!
//! **sharedlibs** keeps a registry of the shared libraries mapped into the
//! current process, together with the ELF metadata needed to work with them
//! later: where the dynamic symbol table, string table, hash tables and PLT
//! relocations of each library live in memory.
//!
//! The registry is filled by a refresh pass that asks the host loader which
//! objects are mapped. Modern loaders answer through `dl_iterate_phdr`,
//! which is resolved at run time. Older ones (Android before 5.0) only offer
//! their internal module list, which is walked under an explicit, verified
//! layout contract and refused if the contract does not hold.
//!
//! ## Guarantees
//!
//! * Each library is keyed by its base filename; the first successfully
//!   parsed object with a given name wins and is never replaced.
//! * Refresh is idempotent: a second pass with no new libraries inserts nothing
//!   and parses nothing.
//! * Readers never observe a partially built entry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sharedlibs::{Enumerator, SharedLibRegistry};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = SharedLibRegistry::new();
//!     Enumerator::new().refresh(&registry)?;
//!
//!     let lib = registry.lookup("libc.so")?;
//!     println!("libc.so loaded at 0x{:x}", lib.load_bias());
//!     Ok(())
//! }
//! ```
#![no_std]
#![warn(
    clippy::unnecessary_wraps,
    clippy::unnecessary_lazy_evaluations,
    clippy::collapsible_if,
    clippy::cast_lossless,
    clippy::explicit_iter_loop,
    clippy::manual_assert,
    clippy::needless_question_mark,
    clippy::needless_return,
    clippy::needless_update,
    clippy::redundant_clone,
    clippy::redundant_else,
    clippy::redundant_static_lifetimes
)]
#![allow(clippy::len_without_is_empty, clippy::unnecessary_cast)]
extern crate alloc;

pub mod discovery;
pub mod elf;
mod enumerator;
mod error;
pub mod global;
mod metadata;
pub mod os;
mod registry;
mod sync;

pub(crate) use error::*;

pub use discovery::{
    DiscoveryStrategy, LibraryFilter, LinkMapLayout, LinkMapStrategy, PhdrIterStrategy,
};
pub use enumerator::{Capabilities, DEFAULT_API_THRESHOLD, Enumerator, RefreshReport};
pub use error::Error;
pub use metadata::{
    DynamicExtractor, LibraryDescriptor, MetadataExtractor, PltRelocKind, PltRelocations,
    SharedLibData,
};
pub use registry::{SharedLibRegistry, base_name};

/// A type alias for `Result`s returned by `sharedlibs` functions.
pub type Result<T> = core::result::Result<T, Error>;
