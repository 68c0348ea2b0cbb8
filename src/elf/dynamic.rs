use crate::{Result, elf::ElfDyn, parse_error};
use alloc::format;
use elf::abi::{
    DT_GNU_HASH, DT_HASH, DT_JMPREL, DT_NULL, DT_PLTREL, DT_PLTRELSZ, DT_SONAME, DT_STRSZ,
    DT_STRTAB, DT_SYMENT, DT_SYMTAB,
};

/// Upper bound on `.dynamic` entries before `DT_NULL`; real objects stay well below it.
const MAX_DYNAMIC_ENTRIES: usize = 4096;

/// The fields of a `.dynamic` section this crate cares about.
///
/// Pointer-valued entries are absolute addresses in the current process.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ElfDynamic {
    pub(crate) dyn_ptr: usize,
    pub(crate) strtab: Option<usize>,
    pub(crate) strsz: usize,
    pub(crate) symtab: Option<usize>,
    pub(crate) syment: Option<usize>,
    pub(crate) hash: Option<usize>,
    pub(crate) gnu_hash: Option<usize>,
    pub(crate) jmprel: Option<usize>,
    pub(crate) pltrelsz: usize,
    pub(crate) pltrel: Option<i64>,
    pub(crate) soname_off: Option<usize>,
}

/// Converts a `d_ptr` value into an absolute address.
///
/// glibc rewrites pointer entries of a writable `.dynamic` in place during
/// startup while bionic and read-only sections keep link-time vaddrs, so
/// values below the load bias are rebased and the rest are kept.
#[inline]
fn rebase(bias: usize, value: usize) -> usize {
    if bias != 0 && value < bias {
        bias.wrapping_add(value)
    } else {
        value
    }
}

impl ElfDynamic {
    /// Walks a mapped `.dynamic` section up to its `DT_NULL` terminator.
    ///
    /// # Safety
    /// `dynamic` must point at a mapped `.dynamic` section of an object
    /// loaded at `bias`.
    pub(crate) unsafe fn new(dynamic: *const ElfDyn, bias: usize) -> Result<Self> {
        if dynamic.is_null() {
            return Err(parse_error("dynamic section pointer is null"));
        }
        let mut info = ElfDynamic {
            dyn_ptr: dynamic as usize,
            ..Default::default()
        };
        for idx in 0..MAX_DYNAMIC_ENTRIES {
            let entry = unsafe { dynamic.add(idx).read() };
            let value = entry.value();
            match entry.tag() {
                DT_NULL => return Ok(info),
                DT_STRTAB => info.strtab = Some(rebase(bias, value)),
                DT_STRSZ => info.strsz = value,
                DT_SYMTAB => info.symtab = Some(rebase(bias, value)),
                DT_SYMENT => info.syment = Some(value),
                DT_HASH => info.hash = Some(rebase(bias, value)),
                DT_GNU_HASH => info.gnu_hash = Some(rebase(bias, value)),
                DT_JMPREL => info.jmprel = Some(rebase(bias, value)),
                DT_PLTRELSZ => info.pltrelsz = value,
                DT_PLTREL => info.pltrel = Some(value as i64),
                DT_SONAME => info.soname_off = Some(value),
                _ => {}
            }
        }
        Err(parse_error(format!(
            "dynamic section at 0x{:x} has no DT_NULL within {} entries",
            dynamic as usize, MAX_DYNAMIC_ENTRIES
        )))
    }
}
