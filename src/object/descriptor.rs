//! Type descriptors - per-type identity with a single-rooted supertype chain
//!
//! Operations live on the `ParcObject` trait; a descriptor only carries what
//! is needed at runtime: the name, layout, lockability and the supertype link
//! used by `is_instance_of`.

use std::fmt;

/// Immutable per-type information shared by every instance
pub struct TypeDescriptor {
    pub name: &'static str,
    pub size: usize,
    pub alignment: usize,
    /// Instances may use the lock/wait/notify operations
    pub lockable: bool,
    pub super_type: Option<&'static TypeDescriptor>,
}

/// Root of every descriptor chain
pub static OBJECT: TypeDescriptor = TypeDescriptor {
    name: "Object",
    size: 0,
    alignment: 1,
    lockable: true,
    super_type: None,
};

impl TypeDescriptor {
    /// Describe `T` as a subtype of `super_type`
    ///
    /// Intended for `static` items:
    /// ```
    /// use parc::object::{TypeDescriptor, OBJECT};
    /// struct Point { x: i32, y: i32 }
    /// static POINT: TypeDescriptor = TypeDescriptor::extend::<Point>(&OBJECT, "Point", true);
    /// assert!(POINT.is_subtype_of(&OBJECT));
    /// ```
    pub const fn extend<T>(
        super_type: &'static TypeDescriptor,
        name: &'static str,
        lockable: bool,
    ) -> Self {
        Self {
            name,
            size: core::mem::size_of::<T>(),
            alignment: core::mem::align_of::<T>(),
            lockable,
            super_type: Some(super_type),
        }
    }

    /// This descriptor followed by each supertype up to the root
    pub fn chain(&self) -> impl Iterator<Item = &TypeDescriptor> {
        let mut next = Some(self);
        core::iter::from_fn(move || {
            let current = next?;
            next = current.super_type;
            Some(current)
        })
    }

    /// True if `other` is this descriptor or one of its supertypes
    pub fn is_subtype_of(&self, other: &TypeDescriptor) -> bool {
        self.chain().any(|d| core::ptr::eq(d, other))
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("lockable", &self.lockable)
            .field("super_type", &self.super_type.map(|d| d.name))
            .finish()
    }
}
