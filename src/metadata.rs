//! Shared-library metadata and the extractor that produces it.
//!
//! A discovery strategy hands each mapped object to a [`MetadataExtractor`]
//! as a [`LibraryDescriptor`]. The default [`DynamicExtractor`] decodes the
//! object's `.dynamic` section into a [`SharedLibData`] record that locates
//! its symbol table, string table, hash tables and PLT relocations.

use crate::{
    Result,
    elf::{ElfDyn, ElfDynamic, ElfHashTable, ElfPhdr, ElfRel, ElfRela, ElfSymbol, GnuHashTable},
    parse_error,
};
use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::{ffi::CStr, fmt::Debug, mem::size_of};
use elf::abi::{DT_REL, DT_RELA, PT_DYNAMIC};

/// A raw description of one mapped object, as reported by the loader.
///
/// Descriptors borrow loader memory and only live for the duration of a
/// discovery callback. Extractors copy what they keep.
#[derive(Debug, Clone, Copy)]
pub enum LibraryDescriptor<'a> {
    /// Program headers of an object reported by `dl_iterate_phdr`.
    Phdrs {
        /// Difference between link-time and run-time addresses.
        bias: usize,
        /// The loader's copy of the program headers.
        phdrs: &'a [ElfPhdr],
    },
    /// A link-map entry taken from the loader's internal module list.
    LinkMap {
        /// `l_addr` of the entry.
        bias: usize,
        /// `l_ld` of the entry: the address of the mapped `.dynamic` section.
        dynamic: usize,
    },
}

impl LibraryDescriptor<'_> {
    /// The load bias of the described object.
    #[inline]
    pub fn bias(&self) -> usize {
        match self {
            LibraryDescriptor::Phdrs { bias, .. } | LibraryDescriptor::LinkMap { bias, .. } => {
                *bias
            }
        }
    }
}

/// Which relocation record format the PLT uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PltRelocKind {
    Rel,
    Rela,
}

/// Location of the `DT_JMPREL` relocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PltRelocations {
    pub addr: usize,
    /// Size of the table in bytes (`DT_PLTRELSZ`).
    pub size: usize,
    pub kind: PltRelocKind,
}

impl PltRelocations {
    /// Number of relocation records in the table.
    pub fn len(&self) -> usize {
        match self.kind {
            PltRelocKind::Rel => self.size / size_of::<ElfRel>(),
            PltRelocKind::Rela => self.size / size_of::<ElfRela>(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata extracted from one mapped shared library.
///
/// All addresses are absolute in the current process and stay meaningful
/// only while the library remains mapped. The program headers are an owned
/// copy and remain readable after the library is unloaded. The record itself is immutable
/// once built and is copied in and out of the registry.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedLibData {
    name: String,
    load_bias: usize,
    dynamic: usize,
    phdrs: Option<Vec<ElfPhdr>>,
    strtab: usize,
    strsz: usize,
    symtab: usize,
    syment: usize,
    hash: Option<ElfHashTable>,
    gnu_hash: Option<GnuHashTable>,
    plt_relocs: Option<PltRelocations>,
    soname: Option<String>,
    symbol_count: Option<usize>,
}

impl Debug for SharedLibData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedLibData")
            .field("name", &self.name)
            .field("load_bias", &format_args!("0x{:x}", self.load_bias))
            .field("dynamic", &format_args!("0x{:x}", self.dynamic))
            .field("soname", &self.soname)
            .field("symbol_count", &self.symbol_count)
            .field("gnu_hash", &self.gnu_hash.is_some())
            .field("plt_relocs", &self.plt_relocs.map(|r| r.len()))
            .finish()
    }
}

impl SharedLibData {
    /// The name the loader reported for this library, usually a full path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn load_bias(&self) -> usize {
        self.load_bias
    }

    /// Address of the mapped `.dynamic` section.
    #[inline]
    pub fn dynamic(&self) -> *const ElfDyn {
        self.dynamic as *const ElfDyn
    }

    /// Program headers, when the descriptor carried them.
    #[inline]
    pub fn phdrs(&self) -> Option<&[ElfPhdr]> {
        self.phdrs.as_deref()
    }

    #[inline]
    pub fn strtab(&self) -> *const u8 {
        self.strtab as *const u8
    }

    /// Size of the string table in bytes (`DT_STRSZ`), zero when absent.
    #[inline]
    pub fn strsz(&self) -> usize {
        self.strsz
    }

    #[inline]
    pub fn symtab(&self) -> *const ElfSymbol {
        self.symtab as *const ElfSymbol
    }

    /// Size of one symbol table entry in bytes.
    #[inline]
    pub fn syment(&self) -> usize {
        self.syment
    }

    #[inline]
    pub fn hash(&self) -> Option<&ElfHashTable> {
        self.hash.as_ref()
    }

    #[inline]
    pub fn gnu_hash(&self) -> Option<&GnuHashTable> {
        self.gnu_hash.as_ref()
    }

    #[inline]
    pub fn plt_relocs(&self) -> Option<&PltRelocations> {
        self.plt_relocs.as_ref()
    }

    /// `DT_SONAME`, when the library declares one.
    #[inline]
    pub fn soname(&self) -> Option<&str> {
        self.soname.as_deref()
    }

    /// Number of dynamic symbols, derived from whichever hash table is present.
    #[inline]
    pub fn symbol_count(&self) -> Option<usize> {
        self.symbol_count
    }
}

/// Turns a raw library descriptor into [`SharedLibData`].
///
/// Implementations must be free of shared mutable state: a refresh may call
/// them from several threads at once, and from inside the loader's iteration
/// callback.
///
/// # Examples
/// ```rust
/// use sharedlibs::{DynamicExtractor, MetadataExtractor, LibraryDescriptor, Result, SharedLibData};
///
/// struct Verbose;
///
/// impl MetadataExtractor for Verbose {
///     fn extract(&self, name: &str, desc: &LibraryDescriptor<'_>) -> Result<SharedLibData> {
///         println!("parsing {} at 0x{:x}", name, desc.bias());
///         DynamicExtractor.extract(name, desc)
///     }
/// }
/// ```
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, name: &str, desc: &LibraryDescriptor<'_>) -> Result<SharedLibData>;
}

impl<F> MetadataExtractor for F
where
    F: Fn(&str, &LibraryDescriptor<'_>) -> Result<SharedLibData> + Send + Sync,
{
    fn extract(&self, name: &str, desc: &LibraryDescriptor<'_>) -> Result<SharedLibData> {
        (self)(name, desc)
    }
}

/// The default extractor: decodes the mapped `.dynamic` section.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicExtractor;

impl DynamicExtractor {
    fn find_dynamic(bias: usize, phdrs: &[ElfPhdr]) -> Result<usize> {
        phdrs
            .iter()
            .find(|phdr| phdr.p_type == PT_DYNAMIC)
            .map(|phdr| bias.wrapping_add(phdr.p_vaddr as usize))
            .ok_or_else(|| parse_error("no PT_DYNAMIC program header"))
    }
}

impl MetadataExtractor for DynamicExtractor {
    fn extract(&self, name: &str, desc: &LibraryDescriptor<'_>) -> Result<SharedLibData> {
        let (bias, dynamic, phdrs) = match *desc {
            LibraryDescriptor::Phdrs { bias, phdrs } => {
                (bias, Self::find_dynamic(bias, phdrs)?, Some(phdrs.to_vec()))
            }
            LibraryDescriptor::LinkMap { bias, dynamic } => (bias, dynamic, None),
        };

        let info = unsafe { ElfDynamic::new(dynamic as *const ElfDyn, bias) }?;

        #[cfg(feature = "log")]
        log::trace!("[{}] Dynamic info: {:?}", name, info);

        let strtab = info
            .strtab
            .ok_or_else(|| parse_error(format!("[{}] missing DT_STRTAB", name)))?;
        let symtab = info
            .symtab
            .ok_or_else(|| parse_error(format!("[{}] missing DT_SYMTAB", name)))?;

        let hash = info
            .hash
            .map(|addr| unsafe { ElfHashTable::parse(addr) })
            .transpose()?;
        let gnu_hash = info
            .gnu_hash
            .map(|addr| unsafe { GnuHashTable::parse(addr) })
            .transpose()?;
        if hash.is_none() && gnu_hash.is_none() {
            return Err(parse_error(format!(
                "[{}] neither DT_HASH nor DT_GNU_HASH present",
                name
            )));
        }

        let symbol_count = match (&hash, &gnu_hash) {
            (Some(hash), _) => Some(hash.nchain as usize),
            (None, Some(gnu)) => Some(unsafe { gnu.symbol_count() }?),
            (None, None) => None,
        };

        let plt_relocs = match info.jmprel {
            Some(addr) => {
                let kind = match info.pltrel {
                    Some(DT_RELA) => PltRelocKind::Rela,
                    Some(DT_REL) => PltRelocKind::Rel,
                    other => {
                        return Err(parse_error(format!(
                            "[{}] unsupported DT_PLTREL {:?}",
                            name, other
                        )));
                    }
                };
                Some(PltRelocations {
                    addr,
                    size: info.pltrelsz,
                    kind,
                })
            }
            None => None,
        };

        let soname = info.soname_off.and_then(|off| {
            let ptr = strtab.wrapping_add(off) as *const core::ffi::c_char;
            unsafe { CStr::from_ptr(ptr) }
                .to_str()
                .ok()
                .map(|s| s.to_string())
        });

        Ok(SharedLibData {
            name: name.to_string(),
            load_bias: bias,
            dynamic: info.dyn_ptr,
            phdrs,
            strtab,
            strsz: info.strsz,
            symtab,
            syment: info.syment.unwrap_or(size_of::<ElfSymbol>()),
            hash,
            gnu_hash,
            plt_relocs,
            soname,
            symbol_count,
        })
    }
}
