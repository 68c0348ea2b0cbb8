#![allow(dead_code)]

use sharedlibs::{
    DiscoveryStrategy, Error, LibraryDescriptor, Result,
    elf::{
        ElfDyn, ElfPhdr, ElfRela, ElfSymbol,
        abi::{
            DT_GNU_HASH, DT_HASH, DT_JMPREL, DT_NULL, DT_PLTREL, DT_PLTRELSZ, DT_RELA, DT_SONAME,
            DT_STRSZ, DT_STRTAB, DT_SYMENT, DT_SYMTAB, PT_DYNAMIC, PT_LOAD,
        },
    },
};
use std::mem::size_of;

pub const ARENA_SIZE: usize = 0x1000;
pub const STRTAB_OFF: usize = 0x000;
pub const SYMTAB_OFF: usize = 0x200;
pub const HASH_OFF: usize = 0x400;
pub const DYNAMIC_OFF: usize = 0x600;
pub const JMPREL_OFF: usize = 0x800;
/// Last, so an unterminated chain can run on past the fixed arena.
pub const GNU_HASH_OFF: usize = 0xA00;
pub const PLT_RELOCS: usize = 3;
/// Zeroed chain words mapped after an unterminated GNU hash chain.
pub const OPEN_CHAIN_WORDS: usize = (1 << 20) + 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sysv,
    Gnu,
    Both,
    Neither,
}

/// What to put into a synthetic, in-memory shared object.
#[derive(Debug, Clone, Copy)]
pub struct LibOptions {
    pub soname: Option<&'static str>,
    pub nsyms: u32,
    pub hash: HashKind,
    pub symtab: bool,
    pub plt: bool,
    /// Store absolute addresses in `.dynamic`, as glibc does after startup.
    pub relocated: bool,
    pub pltrel: i64,
    /// Leave the terminator bit off the last GNU hash chain entry.
    pub open_gnu_chain: bool,
}

impl Default for LibOptions {
    fn default() -> Self {
        Self {
            soname: None,
            nsyms: 5,
            hash: HashKind::Sysv,
            symtab: true,
            plt: false,
            relocated: false,
            pltrel: DT_RELA,
            open_gnu_chain: false,
        }
    }
}

/// A leaked arena laid out like a mapped shared object.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticLib {
    pub base: usize,
    pub phdrs: &'static [ElfPhdr],
}

impl SyntheticLib {
    pub fn dynamic(&self) -> usize {
        self.base + DYNAMIC_OFF
    }

    pub fn phdr_descriptor(&self) -> LibraryDescriptor<'static> {
        LibraryDescriptor::Phdrs {
            bias: self.base,
            phdrs: self.phdrs,
        }
    }

    pub fn link_map_descriptor(&self) -> LibraryDescriptor<'static> {
        LibraryDescriptor::LinkMap {
            bias: self.base,
            dynamic: self.dynamic(),
        }
    }
}

unsafe fn put_u32(base: *mut u8, off: usize, value: u32) {
    unsafe { base.add(off).cast::<u32>().write_unaligned(value) }
}

unsafe fn put_word(base: *mut u8, off: usize, value: usize) {
    unsafe { base.add(off).cast::<usize>().write_unaligned(value) }
}

pub fn build(opts: &LibOptions) -> SyntheticLib {
    assert!(opts.nsyms >= 1);
    assert!(opts.nsyms as usize * size_of::<ElfSymbol>() <= HASH_OFF - SYMTAB_OFF);
    let size = if opts.open_gnu_chain {
        ARENA_SIZE + OPEN_CHAIN_WORDS * size_of::<u32>()
    } else {
        ARENA_SIZE
    };
    let arena: &'static mut [u64] = Box::leak(vec![0u64; size / 8].into_boxed_slice());
    let mem = arena.as_mut_ptr().cast::<u8>();
    let base = mem as usize;
    let addr = |off: usize| if opts.relocated { base + off } else { off };

    // String table: "\0" followed by the soname.
    let mut strsz = 1;
    let mut soname_off = None;
    if let Some(soname) = opts.soname {
        unsafe {
            std::ptr::copy_nonoverlapping(soname.as_ptr(), mem.add(STRTAB_OFF + 1), soname.len());
        }
        soname_off = Some(1);
        strsz += soname.len() + 1;
    }

    let nsyms = opts.nsyms;
    if matches!(opts.hash, HashKind::Sysv | HashKind::Both) {
        unsafe {
            put_u32(mem, HASH_OFF, 1);
            put_u32(mem, HASH_OFF + 4, nsyms);
            put_u32(mem, HASH_OFF + 8, if nsyms > 1 { 1 } else { 0 });
        }
    }
    if matches!(opts.hash, HashKind::Gnu | HashKind::Both) {
        let word = size_of::<usize>();
        let bucket = GNU_HASH_OFF + 16 + word;
        let chains = bucket + 4;
        unsafe {
            put_u32(mem, GNU_HASH_OFF, 1);
            put_u32(mem, GNU_HASH_OFF + 4, 1);
            put_u32(mem, GNU_HASH_OFF + 8, 1);
            put_u32(mem, GNU_HASH_OFF + 12, 6);
            put_word(mem, GNU_HASH_OFF + 16, usize::MAX);
            put_u32(mem, bucket, if nsyms > 1 { 1 } else { 0 });
            for idx in 1..nsyms {
                let terminator = if idx == nsyms - 1 && !opts.open_gnu_chain {
                    1
                } else {
                    0
                };
                put_u32(mem, chains + (idx as usize - 1) * 4, 0x1000 * idx | terminator);
            }
        }
    }

    let mut dynamic = vec![
        ElfDyn::new(DT_STRTAB, addr(STRTAB_OFF)),
        ElfDyn::new(DT_STRSZ, strsz),
    ];
    if opts.symtab {
        dynamic.push(ElfDyn::new(DT_SYMTAB, addr(SYMTAB_OFF)));
        dynamic.push(ElfDyn::new(DT_SYMENT, size_of::<ElfSymbol>()));
    }
    if matches!(opts.hash, HashKind::Sysv | HashKind::Both) {
        dynamic.push(ElfDyn::new(DT_HASH, addr(HASH_OFF)));
    }
    if matches!(opts.hash, HashKind::Gnu | HashKind::Both) {
        dynamic.push(ElfDyn::new(DT_GNU_HASH, addr(GNU_HASH_OFF)));
    }
    if opts.plt {
        dynamic.push(ElfDyn::new(DT_JMPREL, addr(JMPREL_OFF)));
        dynamic.push(ElfDyn::new(DT_PLTRELSZ, PLT_RELOCS * size_of::<ElfRela>()));
        dynamic.push(ElfDyn::new(DT_PLTREL, opts.pltrel as usize));
    }
    if let Some(off) = soname_off {
        dynamic.push(ElfDyn::new(DT_SONAME, off));
    }
    dynamic.push(ElfDyn::new(DT_NULL, 0));
    for (idx, entry) in dynamic.iter().enumerate() {
        unsafe {
            mem.add(DYNAMIC_OFF + idx * size_of::<ElfDyn>())
                .cast::<ElfDyn>()
                .write_unaligned(*entry)
        };
    }

    let phdrs: &'static [ElfPhdr] = Box::leak(
        vec![
            ElfPhdr {
                p_type: PT_LOAD,
                p_memsz: size as _,
                p_filesz: size as _,
                ..Default::default()
            },
            ElfPhdr {
                p_type: PT_DYNAMIC,
                p_vaddr: DYNAMIC_OFF as _,
                p_memsz: (dynamic.len() * size_of::<ElfDyn>()) as _,
                ..Default::default()
            },
        ]
        .into_boxed_slice(),
    );

    SyntheticLib { base, phdrs }
}

/// Builds a well-formed library carrying `soname`.
pub fn lib(soname: &'static str) -> SyntheticLib {
    build(&LibOptions {
        soname: Some(soname),
        ..Default::default()
    })
}

/// A descriptor that no extractor can parse: it has no `PT_DYNAMIC`.
pub fn broken_descriptor() -> LibraryDescriptor<'static> {
    let phdrs: &'static [ElfPhdr] = Box::leak(
        vec![ElfPhdr {
            p_type: PT_LOAD,
            ..Default::default()
        }]
        .into_boxed_slice(),
    );
    LibraryDescriptor::Phdrs {
        bias: 0x1000,
        phdrs,
    }
}

/// A loader that reports a fixed list of objects.
pub struct FakeLoader {
    pub label: &'static str,
    pub libs: Vec<(String, LibraryDescriptor<'static>)>,
    pub available: bool,
}

impl FakeLoader {
    pub fn new(libs: Vec<(&str, LibraryDescriptor<'static>)>) -> Self {
        Self {
            label: "fake",
            libs: libs
                .into_iter()
                .map(|(name, desc)| (name.to_string(), desc))
                .collect(),
            available: true,
        }
    }

    pub fn offline() -> Self {
        Self {
            label: "offline",
            libs: Vec::new(),
            available: false,
        }
    }

    pub fn labelled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }
}

impl DiscoveryStrategy for FakeLoader {
    fn name(&self) -> &'static str {
        self.label
    }

    fn probe(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::ApiUnavailable {
                msg: "fake loader is offline".into(),
            })
        }
    }

    fn discover(&self, visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) -> Result<()> {
        self.probe()?;
        for (name, desc) in &self.libs {
            visit(name, desc);
        }
        Ok(())
    }
}
