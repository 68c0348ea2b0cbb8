//! Native-width ELF records as laid out by the loader in process memory.

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        /// A program header (`Elf64_Phdr`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfPhdr {
            pub p_type: u32,
            pub p_flags: u32,
            pub p_offset: u64,
            pub p_vaddr: u64,
            pub p_paddr: u64,
            pub p_filesz: u64,
            pub p_memsz: u64,
            pub p_align: u64,
        }

        /// An entry of the `.dynamic` section (`Elf64_Dyn`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfDyn {
            pub d_tag: i64,
            pub d_un: u64,
        }

        /// A dynamic symbol table entry (`Elf64_Sym`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfSymbol {
            pub st_name: u32,
            pub st_info: u8,
            pub st_other: u8,
            pub st_shndx: u16,
            pub st_value: u64,
            pub st_size: u64,
        }

        /// A relocation with an explicit addend (`Elf64_Rela`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfRela {
            pub r_offset: u64,
            pub r_info: u64,
            pub r_addend: i64,
        }

        /// A relocation without an addend (`Elf64_Rel`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfRel {
            pub r_offset: u64,
            pub r_info: u64,
        }
    } else {
        /// A program header (`Elf32_Phdr`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfPhdr {
            pub p_type: u32,
            pub p_offset: u32,
            pub p_vaddr: u32,
            pub p_paddr: u32,
            pub p_filesz: u32,
            pub p_memsz: u32,
            pub p_flags: u32,
            pub p_align: u32,
        }

        /// An entry of the `.dynamic` section (`Elf32_Dyn`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfDyn {
            pub d_tag: i32,
            pub d_un: u32,
        }

        /// A dynamic symbol table entry (`Elf32_Sym`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfSymbol {
            pub st_name: u32,
            pub st_value: u32,
            pub st_size: u32,
            pub st_info: u8,
            pub st_other: u8,
            pub st_shndx: u16,
        }

        /// A relocation with an explicit addend (`Elf32_Rela`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfRela {
            pub r_offset: u32,
            pub r_info: u32,
            pub r_addend: i32,
        }

        /// A relocation without an addend (`Elf32_Rel`).
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct ElfRel {
            pub r_offset: u32,
            pub r_info: u32,
        }
    }
}

impl ElfDyn {
    /// Builds an entry from a tag and a value of native width.
    #[inline]
    pub const fn new(tag: i64, value: usize) -> Self {
        Self {
            d_tag: tag as _,
            d_un: value as _,
        }
    }

    /// The entry tag, widened to the `elf::abi::DT_*` constant type.
    #[inline]
    pub fn tag(&self) -> i64 {
        self.d_tag as i64
    }

    /// The `d_val`/`d_ptr` union as a native-width integer.
    #[inline]
    pub fn value(&self) -> usize {
        self.d_un as usize
    }
}
