use crate::{elf::ElfPhdr, metadata::LibraryDescriptor};
use core::{
    ffi::{CStr, c_int, c_void},
    ptr::{NonNull, null},
    slice,
};

type PhdrCallback =
    unsafe extern "C" fn(*mut libc::dl_phdr_info, libc::size_t, *mut c_void) -> c_int;
type DlIteratePhdr = unsafe extern "C" fn(Option<PhdrCallback>, *mut c_void) -> c_int;
type Visitor<'a> = &'a mut dyn FnMut(&str, &LibraryDescriptor<'_>);

/// The loader-iteration function, resolved at run time rather than linked.
#[derive(Clone, Copy)]
pub(crate) struct PhdrIter(DlIteratePhdr);

impl PhdrIter {
    /// Looks `symbol` up in the global scope. `None` if the loader does not export it.
    pub(crate) fn resolve(symbol: &CStr) -> Option<Self> {
        let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, symbol.as_ptr()) };
        if sym.is_null() {
            return None;
        }
        Some(Self(unsafe {
            core::mem::transmute::<*mut c_void, DlIteratePhdr>(sym)
        }))
    }

    /// Reports every mapped object with a non-empty name to `visit`.
    ///
    /// `visit` runs with the loader lock held and must not call back into
    /// `dlopen`/`dlsym`.
    pub(crate) fn iterate(&self, visit: Visitor<'_>) {
        let mut visit = visit;
        unsafe {
            (self.0)(
                Some(phdr_callback),
                (&mut visit as *mut Visitor<'_>).cast::<c_void>(),
            )
        };
    }
}

// `info` is valid for the duration of the call; `data` is the `Visitor`
// passed by `PhdrIter::iterate`.
unsafe extern "C" fn phdr_callback(
    info: *mut libc::dl_phdr_info,
    _size: libc::size_t,
    data: *mut c_void,
) -> c_int {
    let info = unsafe { &*info };
    let visit = unsafe { &mut *data.cast::<Visitor<'_>>() };
    if info.dlpi_name.is_null() {
        return 0;
    }
    let Ok(name) = unsafe { CStr::from_ptr(info.dlpi_name) }.to_str() else {
        return 0;
    };
    if name.is_empty() {
        return 0;
    }
    let phdrs: &[ElfPhdr] = if info.dlpi_phdr.is_null() {
        &[]
    } else {
        unsafe {
            slice::from_raw_parts(
                info.dlpi_phdr.cast::<ElfPhdr>(),
                info.dlpi_phnum as usize,
            )
        }
    };
    visit(
        name,
        &LibraryDescriptor::Phdrs {
            bias: info.dlpi_addr as usize,
            phdrs,
        },
    );
    0
}

/// The handle `dlopen(NULL)` returns for the running program.
///
/// The handle refers to the main program, which is never unloaded, so it is
/// not closed.
pub(crate) fn self_handle() -> Option<NonNull<c_void>> {
    NonNull::new(unsafe { libc::dlopen(null(), libc::RTLD_NOW) })
}

/// The Android API level from `ro.build.version.sdk`.
#[cfg(target_os = "android")]
pub fn api_level() -> Option<u32> {
    const PROP_VALUE_MAX: usize = 92;
    let mut buf = [0u8; PROP_VALUE_MAX];
    let len = unsafe {
        libc::__system_property_get(c"ro.build.version.sdk".as_ptr(), buf.as_mut_ptr().cast())
    };
    if len <= 0 {
        return None;
    }
    core::str::from_utf8(&buf[..len as usize])
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Desktop Linux has no loader API level; capability probing decides alone.
#[cfg(not(target_os = "android"))]
pub fn api_level() -> Option<u32> {
    None
}
