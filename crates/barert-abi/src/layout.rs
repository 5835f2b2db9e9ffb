//! Heap object layouts.
//!
//! Every heap value starts with an [`ObjectHeader`] whose single word points
//! at the value's [`TypeDescriptor`]. Arrays and strings append a signed
//! 32-bit length and then their elements inline.

use core::ffi::c_void;
use core::mem::{offset_of, size_of};
use core::ops::BitOr;

const POINTER_SIZE: usize = size_of::<*const u8>();

// =============================================================================
// Type descriptor
// =============================================================================

/// Bit set stored in [`TypeDescriptor::flags`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct TypeFlags(u16);

impl TypeFlags {
    pub const NONE: Self = Self(0);
    /// Elements are object references; stores go through the covariance check.
    pub const REFERENCE_ELEMENTS: Self = Self(0x0002);
    pub const STRING: Self = Self(0x0004);
    pub const VALUE_TYPE: Self = Self(0x0008);
    /// Array-like: instances carry a length and `component_size` is meaningful.
    pub const HAS_COMPONENT_SIZE: Self = Self(0x8000);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for TypeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Immutable per-type metadata emitted by the compiler into the binary.
///
/// Descriptors are never mutated and live for the whole program. Type
/// identity is pointer identity: two values have the same type exactly when
/// their headers point at the same descriptor.
#[repr(C)]
#[derive(Debug)]
pub struct TypeDescriptor {
    /// Size of one element for array-like types, 0 otherwise.
    pub component_size: u16,
    pub flags: TypeFlags,
    /// Instance size for objects; size of the fixed part for arrays/strings.
    pub base_size: u32,
    /// Element type for arrays, underlying type otherwise (may be null).
    pub related_type: *const TypeDescriptor,
    pub num_vtable_slots: u16,
    pub num_interfaces: u16,
    pub hash_code: u32,
}

// SAFETY: descriptors are immutable after program load; the raw pointer only
// ever refers to another immutable descriptor.
unsafe impl Sync for TypeDescriptor {}

impl TypeDescriptor {
    /// Descriptor for a plain reference type with `base_size` bytes of
    /// instance data (header included).
    pub const fn object(base_size: u32, hash_code: u32) -> Self {
        Self {
            component_size: 0,
            flags: TypeFlags::NONE,
            base_size,
            related_type: core::ptr::null(),
            num_vtable_slots: 0,
            num_interfaces: 0,
            hash_code,
        }
    }

    /// Descriptor for a value type of `size` bytes. Used as an element type.
    pub const fn value_type(size: u32, hash_code: u32) -> Self {
        Self {
            flags: TypeFlags::VALUE_TYPE,
            ..Self::object(size, hash_code)
        }
    }

    /// Array of inline values, `component_size` bytes each.
    pub const fn value_array(
        element: &'static TypeDescriptor,
        component_size: u16,
        hash_code: u32,
    ) -> Self {
        Self {
            component_size,
            flags: TypeFlags::HAS_COMPONENT_SIZE,
            base_size: ARRAY_BASE_SIZE,
            related_type: element,
            num_vtable_slots: 0,
            num_interfaces: 0,
            hash_code,
        }
    }

    /// Array of object references to `element`.
    pub const fn reference_array(element: &'static TypeDescriptor, hash_code: u32) -> Self {
        Self {
            component_size: POINTER_SIZE as u16,
            flags: TypeFlags::HAS_COMPONENT_SIZE.union(TypeFlags::REFERENCE_ELEMENTS),
            base_size: ARRAY_BASE_SIZE,
            related_type: element,
            num_vtable_slots: 0,
            num_interfaces: 0,
            hash_code,
        }
    }

    /// The string type: UTF-16 code units with a trailing zero unit.
    pub const fn string(hash_code: u32) -> Self {
        Self {
            component_size: 2,
            flags: TypeFlags::HAS_COMPONENT_SIZE.union(TypeFlags::STRING),
            base_size: STRING_BASE_SIZE,
            related_type: core::ptr::null(),
            num_vtable_slots: 0,
            num_interfaces: 0,
            hash_code,
        }
    }

    pub const fn with_dispatch(self, num_vtable_slots: u16, num_interfaces: u16) -> Self {
        Self {
            num_vtable_slots,
            num_interfaces,
            ..self
        }
    }

    pub const fn is_array_like(&self) -> bool {
        self.flags.contains(TypeFlags::HAS_COMPONENT_SIZE)
    }

    pub const fn has_reference_elements(&self) -> bool {
        self.flags.contains(TypeFlags::REFERENCE_ELEMENTS)
    }

    pub fn related_type(&self) -> Option<&'static TypeDescriptor> {
        // SAFETY: non-null related types are program-lifetime descriptors.
        unsafe { self.related_type.as_ref() }
    }
}

const _: () = {
    assert!(offset_of!(TypeDescriptor, component_size) == 0);
    assert!(offset_of!(TypeDescriptor, flags) == 2);
    assert!(offset_of!(TypeDescriptor, base_size) == 4);
    assert!(offset_of!(TypeDescriptor, related_type) == 8);
    assert!(offset_of!(TypeDescriptor, num_vtable_slots) == 8 + POINTER_SIZE);
    assert!(offset_of!(TypeDescriptor, num_interfaces) == 10 + POINTER_SIZE);
    assert!(offset_of!(TypeDescriptor, hash_code) == 12 + POINTER_SIZE);
};

// =============================================================================
// Object, array and string headers
// =============================================================================

/// First word of every heap allocation.
#[repr(C)]
#[derive(Debug)]
pub struct ObjectHeader {
    pub type_descriptor: *const TypeDescriptor,
}

/// Fixed part of every array. Elements start at [`ARRAY_DATA_OFFSET`].
#[repr(C)]
#[derive(Debug)]
pub struct ArrayHeader {
    pub header: ObjectHeader,
    pub length: i32,
    #[cfg(target_pointer_width = "64")]
    _padding: u32,
}

/// Fixed part of every string. Code units start at [`STRING_DATA_OFFSET`].
#[repr(C)]
#[derive(Debug)]
pub struct StringHeader {
    pub header: ObjectHeader,
    pub length: i32,
    pub first_char: [u16; 0],
}

/// Byte offset from the header to the first array element.
pub const ARRAY_DATA_OFFSET: usize = size_of::<ArrayHeader>();

/// `base_size` of every array descriptor.
pub const ARRAY_BASE_SIZE: u32 = ARRAY_DATA_OFFSET as u32;

/// Byte offset from the header to the first string code unit.
pub const STRING_DATA_OFFSET: usize = offset_of!(StringHeader, first_char);

/// `base_size` of the string descriptor: fixed part plus the zero terminator.
pub const STRING_BASE_SIZE: u32 = (STRING_DATA_OFFSET + 2) as u32;

const _: () = {
    assert!(offset_of!(ObjectHeader, type_descriptor) == 0);
    assert!(size_of::<ObjectHeader>() == POINTER_SIZE);
    assert!(offset_of!(ArrayHeader, length) == POINTER_SIZE);
    assert!(ARRAY_DATA_OFFSET == 2 * POINTER_SIZE);
    assert!(offset_of!(StringHeader, length) == POINTER_SIZE);
    assert!(STRING_DATA_OFFSET == POINTER_SIZE + 4);
};

// =============================================================================
// Delegates
// =============================================================================

/// Closure object. Generated code invokes `code(target, args...)`.
///
/// Which slots are populated depends on how the delegate was constructed;
/// see `barert_runtime::delegate::DelegateInit`.
#[repr(C)]
#[derive(Debug)]
pub struct DelegateObject {
    pub header: ObjectHeader,
    /// Receiver for closed-instance delegates, the delegate itself for thunks.
    pub target: *mut ObjectHeader,
    /// Extra call-target data consumed by static thunks.
    pub context: *mut ObjectHeader,
    /// Target function pointer consumed by static thunks.
    pub extra: *const c_void,
    /// Address actually called through the delegate.
    pub code: *const c_void,
}

const _: () = {
    assert!(offset_of!(DelegateObject, target) == POINTER_SIZE);
    assert!(offset_of!(DelegateObject, context) == 2 * POINTER_SIZE);
    assert!(offset_of!(DelegateObject, extra) == 3 * POINTER_SIZE);
    assert!(offset_of!(DelegateObject, code) == 4 * POINTER_SIZE);
    assert!(size_of::<DelegateObject>() == 5 * POINTER_SIZE);
};
