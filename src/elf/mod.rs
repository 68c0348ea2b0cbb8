//! ELF records and tables read straight out of process memory.
//!
//! Everything here operates on images that the host loader has already
//! mapped: program headers, the `.dynamic` section and the symbol hash
//! tables. Nothing is read from disk.

mod defs;
mod dynamic;
mod hash;

pub(crate) use dynamic::ElfDynamic;

pub use defs::{ElfDyn, ElfPhdr, ElfRel, ElfRela, ElfSymbol};
pub use hash::{ElfHashTable, GnuHashTable};

/// `elf::abi` re-exported for callers inspecting program headers and tags.
pub use elf::abi;
