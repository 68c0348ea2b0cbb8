use crate::metadata::LibraryDescriptor;
use core::{
    ffi::{CStr, c_void},
    ptr::NonNull,
};

/// No loader-iteration API exists on this host; the type is uninhabited.
#[derive(Clone, Copy)]
pub(crate) enum PhdrIter {}

impl PhdrIter {
    pub(crate) fn resolve(_symbol: &CStr) -> Option<Self> {
        None
    }

    pub(crate) fn iterate(&self, _visit: &mut dyn FnMut(&str, &LibraryDescriptor<'_>)) {
        match *self {}
    }
}

pub(crate) fn self_handle() -> Option<NonNull<c_void>> {
    None
}

pub fn api_level() -> Option<u32> {
    None
}
