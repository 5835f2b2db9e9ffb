//! Typed handle over a heap object.

use core::ptr::NonNull;

use barert_abi::{ObjectHeader, TypeDescriptor};

/// Non-null reference to a heap object.
///
/// The pointee's first word is its [`TypeDescriptor`]. Objects are never
/// freed, so a handle stays valid for the rest of the program.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef(NonNull<ObjectHeader>);

impl ObjectRef {
    /// # Safety
    ///
    /// A non-null `ptr` must point at an object header whose descriptor
    /// pointer is valid.
    pub unsafe fn from_raw(ptr: *mut ObjectHeader) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub(crate) fn from_non_null(ptr: NonNull<ObjectHeader>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut ObjectHeader {
        self.0.as_ptr()
    }

    pub fn type_descriptor(self) -> &'static TypeDescriptor {
        // SAFETY: every live object carries a program-lifetime descriptor.
        unsafe { &*(*self.0.as_ptr()).type_descriptor }
    }

    /// Exact type test. There is no subtype walk: identity of descriptors is
    /// identity of types.
    pub fn is_instance_of(self, td: &TypeDescriptor) -> bool {
        core::ptr::eq(self.type_descriptor(), td)
    }
}

/// Raw pointer (possibly null) for an optional handle.
pub fn as_raw(obj: Option<ObjectRef>) -> *mut ObjectHeader {
    obj.map_or(core::ptr::null_mut(), ObjectRef::as_ptr)
}

#[cfg(test)]
mod tests {
    use super::*;

    static POINT: TypeDescriptor = TypeDescriptor::object(24, 1);
    static OTHER: TypeDescriptor = TypeDescriptor::object(24, 2);

    #[test]
    fn test_type_identity_is_pointer_identity() {
        let mut header = ObjectHeader {
            type_descriptor: &POINT,
        };
        let obj = unsafe { ObjectRef::from_raw(&mut header) }.unwrap();
        assert!(obj.is_instance_of(&POINT));
        assert!(!obj.is_instance_of(&OTHER));
        assert_eq!(obj.type_descriptor().base_size, 24);
    }

    #[test]
    fn test_null_is_none() {
        assert!(unsafe { ObjectRef::from_raw(core::ptr::null_mut()) }.is_none());
        assert!(as_raw(None).is_null());
    }
}
