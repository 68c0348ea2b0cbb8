use crate::{Result, parse_error};
use alloc::format;
use core::mem::size_of;

/// Longest GNU hash chain accepted before the table is treated as corrupt.
const MAX_CHAIN_WALK: u32 = 1 << 20;

#[inline]
unsafe fn read_u32(addr: usize) -> u32 {
    unsafe { (addr as *const u32).read_unaligned() }
}

/// Header of a SysV `DT_HASH` table.
///
/// Layout: `nbucket`, `nchain`, `bucket[nbucket]`, `chain[nchain]`, all 32-bit.
/// `nchain` equals the number of entries in the dynamic symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHashTable {
    pub nbucket: u32,
    pub nchain: u32,
    pub buckets: usize,
    pub chains: usize,
}

impl ElfHashTable {
    /// # Safety
    /// `addr` must point at a mapped SysV hash table.
    pub(crate) unsafe fn parse(addr: usize) -> Result<Self> {
        let (nbucket, nchain) = unsafe { (read_u32(addr), read_u32(addr + 4)) };
        if nbucket == 0 {
            return Err(parse_error("DT_HASH table has no buckets"));
        }
        let buckets = addr + 8;
        Ok(Self {
            nbucket,
            nchain,
            buckets,
            chains: buckets + nbucket as usize * size_of::<u32>(),
        })
    }
}

/// Header of a `DT_GNU_HASH` table.
///
/// Layout: `nbucket`, `symoffset`, `bloom_size`, `bloom_shift` (32-bit), then
/// `bloom[bloom_size]` (native word), `buckets[nbucket]` and the chain array
/// (32-bit), where `chain[i]` describes symbol `symoffset + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GnuHashTable {
    pub nbucket: u32,
    pub symoffset: u32,
    pub bloom_size: u32,
    pub bloom_shift: u32,
    pub bloom: usize,
    pub buckets: usize,
    pub chains: usize,
}

impl GnuHashTable {
    /// # Safety
    /// `addr` must point at a mapped GNU hash table.
    pub(crate) unsafe fn parse(addr: usize) -> Result<Self> {
        let (nbucket, symoffset, bloom_size, bloom_shift) = unsafe {
            (
                read_u32(addr),
                read_u32(addr + 4),
                read_u32(addr + 8),
                read_u32(addr + 12),
            )
        };
        if nbucket == 0 {
            return Err(parse_error("DT_GNU_HASH table has no buckets"));
        }
        if !bloom_size.is_power_of_two() {
            return Err(parse_error("DT_GNU_HASH bloom size is not a power of two"));
        }
        let bloom = addr + 16;
        let buckets = bloom + bloom_size as usize * size_of::<usize>();
        Ok(Self {
            nbucket,
            symoffset,
            bloom_size,
            bloom_shift,
            bloom,
            buckets,
            chains: buckets + nbucket as usize * size_of::<u32>(),
        })
    }

    /// Counts the dynamic symbols covered by the table.
    ///
    /// The highest bucket start is followed along its chain until the entry
    /// with the terminator bit set. A chain with no terminator within
    /// [`MAX_CHAIN_WALK`] entries is rejected.
    ///
    /// # Safety
    /// The table must be mapped up to the terminator or the walk limit.
    pub(crate) unsafe fn symbol_count(&self) -> Result<usize> {
        let mut last = 0u32;
        for i in 0..self.nbucket as usize {
            last = last.max(unsafe { read_u32(self.buckets + i * size_of::<u32>()) });
        }
        if last < self.symoffset {
            return Ok(self.symoffset as usize);
        }
        for step in 0..MAX_CHAIN_WALK {
            let Some(idx) = last.checked_add(step) else {
                break;
            };
            let entry = unsafe {
                read_u32(self.chains + (idx - self.symoffset) as usize * size_of::<u32>())
            };
            if entry & 1 != 0 {
                return Ok(idx as usize + 1);
            }
        }
        Err(parse_error(format!(
            "DT_GNU_HASH chain from symbol {} has no terminator within {} entries",
            last, MAX_CHAIN_WALK
        )))
    }
}
