mod common;

use common::{
    DYNAMIC_OFF, GNU_HASH_OFF, HASH_OFF, HashKind, JMPREL_OFF, LibOptions, PLT_RELOCS, STRTAB_OFF,
    SYMTAB_OFF, broken_descriptor, build,
};
use sharedlibs::{
    DynamicExtractor, Error, LibraryDescriptor, MetadataExtractor, PltRelocKind,
    elf::{ElfSymbol, abi::DT_REL},
};
use std::mem::size_of;

#[test]
fn sysv_hash_library() {
    let lib = build(&LibOptions {
        soname: Some("libfoo.so"),
        nsyms: 7,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("/system/lib/libfoo.so", &lib.phdr_descriptor())
        .unwrap();

    assert_eq!(data.name(), "/system/lib/libfoo.so");
    assert_eq!(data.load_bias(), lib.base);
    assert_eq!(data.dynamic() as usize, lib.base + DYNAMIC_OFF);
    assert_eq!(data.phdrs().map(|p| p.len()), Some(2));
    assert_eq!(data.strtab() as usize, lib.base + STRTAB_OFF);
    assert_eq!(data.strsz(), "libfoo.so".len() + 2);
    assert_eq!(data.symtab() as usize, lib.base + SYMTAB_OFF);
    assert_eq!(data.syment(), size_of::<ElfSymbol>());
    assert_eq!(data.soname(), Some("libfoo.so"));
    assert_eq!(data.symbol_count(), Some(7));

    let hash = data.hash().unwrap();
    assert_eq!(hash.nbucket, 1);
    assert_eq!(hash.nchain, 7);
    assert_eq!(hash.buckets, lib.base + HASH_OFF + 8);
    assert!(data.gnu_hash().is_none());
    assert!(data.plt_relocs().is_none());
}

#[test]
fn gnu_hash_counts_symbols() {
    let lib = build(&LibOptions {
        nsyms: 9,
        hash: HashKind::Gnu,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("libgnu.so", &lib.phdr_descriptor())
        .unwrap();

    let gnu = data.gnu_hash().unwrap();
    assert_eq!(gnu.nbucket, 1);
    assert_eq!(gnu.symoffset, 1);
    assert_eq!(gnu.bloom_size, 1);
    assert_eq!(gnu.bloom, lib.base + GNU_HASH_OFF + 16);
    assert!(data.hash().is_none());
    assert_eq!(data.symbol_count(), Some(9));
    assert_eq!(data.soname(), None);
}

#[test]
fn gnu_hash_with_only_reserved_symbol() {
    let lib = build(&LibOptions {
        nsyms: 1,
        hash: HashKind::Gnu,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("libempty.so", &lib.phdr_descriptor())
        .unwrap();
    assert_eq!(data.symbol_count(), Some(1));
}

#[test]
fn unterminated_gnu_chain_is_rejected() {
    let lib = build(&LibOptions {
        nsyms: 4,
        hash: HashKind::Gnu,
        open_gnu_chain: true,
        ..Default::default()
    });
    let err = DynamicExtractor
        .extract("libopen.so", &lib.phdr_descriptor())
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(err.to_string().contains("terminator"));
}

#[test]
fn sysv_count_preferred_when_both_tables_exist() {
    let lib = build(&LibOptions {
        nsyms: 4,
        hash: HashKind::Both,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("libboth.so", &lib.phdr_descriptor())
        .unwrap();
    assert!(data.hash().is_some());
    assert!(data.gnu_hash().is_some());
    assert_eq!(data.symbol_count(), Some(4));
}

#[test]
fn plt_relocations() {
    let lib = build(&LibOptions {
        plt: true,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("libplt.so", &lib.phdr_descriptor())
        .unwrap();
    let plt = data.plt_relocs().unwrap();
    assert_eq!(plt.addr, lib.base + JMPREL_OFF);
    assert_eq!(plt.kind, PltRelocKind::Rela);
    assert_eq!(plt.len(), PLT_RELOCS);
    assert!(!plt.is_empty());
}

#[test]
fn rel_plt_relocations() {
    let lib = build(&LibOptions {
        plt: true,
        pltrel: DT_REL,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("librel.so", &lib.phdr_descriptor())
        .unwrap();
    assert_eq!(data.plt_relocs().unwrap().kind, PltRelocKind::Rel);
}

#[test]
fn unknown_pltrel_is_rejected() {
    let lib = build(&LibOptions {
        plt: true,
        pltrel: 99,
        ..Default::default()
    });
    let err = DynamicExtractor
        .extract("libweird.so", &lib.phdr_descriptor())
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn relocated_dynamic_is_not_rebased_twice() {
    let lib = build(&LibOptions {
        soname: Some("libreloc.so"),
        relocated: true,
        plt: true,
        ..Default::default()
    });
    let data = DynamicExtractor
        .extract("libreloc.so", &lib.phdr_descriptor())
        .unwrap();
    assert_eq!(data.strtab() as usize, lib.base + STRTAB_OFF);
    assert_eq!(data.symtab() as usize, lib.base + SYMTAB_OFF);
    assert_eq!(data.plt_relocs().unwrap().addr, lib.base + JMPREL_OFF);
    assert_eq!(data.soname(), Some("libreloc.so"));
}

#[test]
fn link_map_descriptor_has_no_phdrs() {
    let lib = build(&LibOptions {
        soname: Some("liblegacy.so"),
        ..Default::default()
    });
    let from_phdrs = DynamicExtractor
        .extract("liblegacy.so", &lib.phdr_descriptor())
        .unwrap();
    let from_link_map = DynamicExtractor
        .extract("liblegacy.so", &lib.link_map_descriptor())
        .unwrap();

    assert!(from_link_map.phdrs().is_none());
    assert_eq!(from_link_map.dynamic(), from_phdrs.dynamic());
    assert_eq!(from_link_map.symbol_count(), from_phdrs.symbol_count());
    assert_eq!(from_link_map.soname(), from_phdrs.soname());
}

#[test]
fn missing_dynamic_segment() {
    let err = DynamicExtractor
        .extract("libbaz.so", &broken_descriptor())
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(err.to_string().contains("PT_DYNAMIC"));
}

#[test]
fn null_dynamic_pointer() {
    let desc = LibraryDescriptor::LinkMap {
        bias: 0x1000,
        dynamic: 0,
    };
    let err = DynamicExtractor.extract("libnull.so", &desc).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
}

#[test]
fn missing_tables() {
    let no_hash = build(&LibOptions {
        hash: HashKind::Neither,
        ..Default::default()
    });
    let err = DynamicExtractor
        .extract("libnohash.so", &no_hash.phdr_descriptor())
        .unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));

    let no_symtab = build(&LibOptions {
        symtab: false,
        ..Default::default()
    });
    let err = DynamicExtractor
        .extract("libnosym.so", &no_symtab.phdr_descriptor())
        .unwrap_err();
    assert!(err.to_string().contains("DT_SYMTAB"));
}

#[test]
fn closures_are_extractors() {
    let lib = build(&LibOptions::default());
    let renaming = |name: &str, desc: &LibraryDescriptor| {
        DynamicExtractor.extract(&name.to_uppercase(), desc)
    };
    let data = renaming.extract("libfoo.so", &lib.phdr_descriptor()).unwrap();
    assert_eq!(data.name(), "LIBFOO.SO");
}
