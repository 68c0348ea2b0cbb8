//! Legacy discovery: walking the loader's internal module list.
//!
//! Old loaders without `dl_iterate_phdr` still keep every loaded module in a
//! singly linked list of private descriptors that embed a public
//! `struct link_map`. Where those descriptors live and where their `next`
//! pointer sits is not part of any API, so the offsets are captured in a
//! [`LinkMapLayout`] together with checks that must hold for every node.
//! The whole list is read and verified before a single entry is reported;
//! any mismatch fails the walk with `ApiUnavailable`.

use super::DiscoveryStrategy;
use crate::{
    Result, api_unavailable,
    elf::ElfDyn,
    metadata::LibraryDescriptor,
    os::self_handle,
};
use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};
use core::{
    ffi::{CStr, c_char},
    mem::offset_of,
};

/// Longest module list accepted before the walk is treated as corrupt.
const MAX_MODULES: usize = 4096;

/// The public `struct link_map` from `<link.h>`.
#[repr(C)]
#[derive(Debug)]
pub struct LinkMap {
    pub l_addr: usize,
    pub l_name: *const c_char,
    pub l_ld: *const ElfDyn,
    pub l_next: *const LinkMap,
    pub l_prev: *const LinkMap,
}

/// An invariant a module descriptor must satisfy before it is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutCheck {
    /// `l_name` points at the start of the descriptor (an inline name buffer).
    /// Descriptors with a null `l_name` are skipped instead.
    NameInline,
    /// The pointer-sized field at this byte offset equals `l_ld`.
    DynamicAt(usize),
    /// The head has no `l_prev`, and each successor's `l_prev` points back
    /// at the current node's link map.
    BackLinks,
}

/// Where a loader keeps the pieces of its module descriptors.
///
/// This is a compatibility contract with specific loader builds, not a
/// description of a stable interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkMapLayout {
    /// A label for logs.
    pub name: &'static str,
    /// Byte offset of the `next` descriptor pointer.
    pub next_offset: usize,
    /// Byte offset of the embedded `struct link_map`.
    pub link_map_offset: usize,
    pub checks: &'static [LayoutCheck],
}

const GNU_CHECKS: &[LayoutCheck] = &[LayoutCheck::BackLinks];

/// `soinfo` of the Android 4.x linker: `name[128]` sits at offset 0 and the
/// `dynamic` pointer at 152, `next` at 164. The embedded `link_map` follows
/// `ref_count`, after the architecture-specific fields.
#[cfg(all(
    target_pointer_width = "32",
    any(target_arch = "arm", target_arch = "x86", target_arch = "mips")
))]
const SOINFO_CHECKS: &[LayoutCheck] = &[LayoutCheck::NameInline, LayoutCheck::DynamicAt(152)];

impl LinkMapLayout {
    /// glibc: `dlopen(NULL)` returns the main program's `struct link_map`,
    /// chained through `l_next`.
    pub const fn gnu() -> Self {
        Self {
            name: "glibc link_map",
            next_offset: offset_of!(LinkMap, l_next),
            link_map_offset: 0,
            checks: GNU_CHECKS,
        }
    }

    /// The Android linker before API level 21 on 32-bit ARM.
    #[cfg(all(target_pointer_width = "32", target_arch = "arm"))]
    pub const fn android_soinfo() -> Self {
        Self {
            name: "android soinfo (arm)",
            next_offset: 164,
            link_map_offset: 260,
            checks: SOINFO_CHECKS,
        }
    }

    /// The Android linker before API level 21 on 32-bit x86.
    #[cfg(all(target_pointer_width = "32", target_arch = "x86"))]
    pub const fn android_soinfo() -> Self {
        Self {
            name: "android soinfo (x86)",
            next_offset: 164,
            link_map_offset: 252,
            checks: SOINFO_CHECKS,
        }
    }

    /// The Android linker before API level 21 on 32-bit MIPS.
    #[cfg(all(target_pointer_width = "32", target_arch = "mips"))]
    pub const fn android_soinfo() -> Self {
        Self {
            name: "android soinfo (mips)",
            next_offset: 164,
            link_map_offset: 264,
            checks: SOINFO_CHECKS,
        }
    }

    /// The layout known to match this build's host loader, if any.
    pub fn host() -> Option<Self> {
        cfg_if::cfg_if! {
            if #[cfg(all(
                target_os = "android",
                target_pointer_width = "32",
                any(target_arch = "arm", target_arch = "x86", target_arch = "mips")
            ))] {
                Some(Self::android_soinfo())
            } else if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
                Some(Self::gnu())
            } else {
                None
            }
        }
    }
}

/// Discovery by walking the loader's module list.
#[derive(Debug, Clone)]
pub struct LinkMapStrategy {
    layout: LinkMapLayout,
    /// Address of the first descriptor; `None` asks the loader via `dlopen(NULL)`.
    head: Option<usize>,
}

impl LinkMapStrategy {
    /// Walks the list reachable from this process's own `dlopen(NULL)` handle.
    pub const fn new(layout: LinkMapLayout) -> Self {
        Self { layout, head: None }
    }

    /// Walks a list starting at `head` instead of asking the loader.
    ///
    /// # Safety
    /// `head` and every descriptor reachable from it must be readable with
    /// `layout` for as long as this strategy is used.
    pub unsafe fn from_head(layout: LinkMapLayout, head: *const u8) -> Self {
        Self {
            layout,
            head: Some(head as usize),
        }
    }

    /// The strategy for this build's host loader, if a layout is known.
    pub fn host() -> Option<Self> {
        LinkMapLayout::host().map(Self::new)
    }

    #[inline]
    pub fn layout(&self) -> &LinkMapLayout {
        &self.layout
    }

    fn head(&self) -> Result<*const u8> {
        match self.head {
            Some(head) => Ok(head as *const u8),
            None => self_handle()
                .map(|handle| handle.as_ptr().cast_const().cast::<u8>())
                .ok_or_else(|| api_unavailable("dlopen(NULL) returned no handle")),
        }
    }

    #[inline]
    unsafe fn link_map<'a>(&self, node: *const u8) -> &'a LinkMap {
        unsafe { &*node.add(self.layout.link_map_offset).cast::<LinkMap>() }
    }

    #[inline]
    unsafe fn next(&self, node: *const u8) -> *const u8 {
        unsafe {
            node.add(self.layout.next_offset)
                .cast::<*const u8>()
                .read_unaligned()
        }
    }

    fn mismatch(&self, node: *const u8, what: &str) -> crate::Error {
        api_unavailable(format!(
            "{} layout check failed at {:p}: {}",
            self.layout.name, node, what
        ))
    }

    unsafe fn verify(&self, node: *const u8, lm: &LinkMap, next: *const u8) -> Result<()> {
        for check in self.layout.checks {
            match *check {
                LayoutCheck::NameInline => {
                    if !lm.l_name.is_null() && lm.l_name.cast::<u8>() != node {
                        return Err(self.mismatch(node, "l_name is not the inline name"));
                    }
                }
                LayoutCheck::DynamicAt(offset) => {
                    let dynamic = unsafe { node.add(offset).cast::<usize>().read_unaligned() };
                    if dynamic != lm.l_ld as usize {
                        return Err(self.mismatch(node, "dynamic field differs from l_ld"));
                    }
                }
                LayoutCheck::BackLinks => {
                    if !next.is_null() {
                        let back = unsafe { self.link_map(next) }.l_prev.cast::<u8>();
                        if back != unsafe { node.add(self.layout.link_map_offset) } {
                            return Err(
                                self.mismatch(node, "successor's l_prev does not point back")
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads and verifies the whole list, returning the named modules.
    fn collect(&self) -> Result<Vec<(String, LibraryDescriptor<'static>)>> {
        let head = self.head()?;
        if head.is_null() {
            return Err(api_unavailable("module list head is null"));
        }
        if self.layout.checks.contains(&LayoutCheck::BackLinks)
            && !unsafe { self.link_map(head) }.l_prev.is_null()
        {
            return Err(self.mismatch(head, "head has a predecessor"));
        }

        let mut found = Vec::new();
        let mut node = head;
        let mut visited = 0;
        while !node.is_null() {
            visited += 1;
            if visited > MAX_MODULES {
                return Err(api_unavailable(format!(
                    "{} list exceeds {} modules",
                    self.layout.name, MAX_MODULES
                )));
            }
            let lm = unsafe { self.link_map(node) };
            let next = unsafe { self.next(node) };
            unsafe { self.verify(node, lm, next) }?;

            if !lm.l_name.is_null()
                && let Ok(name) = unsafe { CStr::from_ptr(lm.l_name) }.to_str()
                && !name.is_empty()
            {
                found.push((
                    name.to_string(),
                    LibraryDescriptor::LinkMap {
                        bias: lm.l_addr,
                        dynamic: lm.l_ld as usize,
                    },
                ));
            }
            node = next;
        }

        #[cfg(feature = "log")]
        log::debug!(
            "Walked {} modules with layout {}, {} named",
            visited,
            self.layout.name,
            found.len()
        );
        Ok(found)
    }
}

impl DiscoveryStrategy for LinkMapStrategy {
    fn name(&self) -> &'static str {
        "link_map"
    }

    fn probe(&self) -> Result<()> {
        self.collect().map(|_| ())
    }

    fn discover(&self, visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) -> Result<()> {
        for (name, desc) in self.collect()? {
            visit(&name, &desc);
        }
        Ok(())
    }
}
