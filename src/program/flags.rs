//! Access flags for classes, fields and methods.
//!
//! The bit values follow the class file format so that front ends can hand raw
//! `access_flags` straight through. [`Visibility`] gives an ordered view of the four
//! access levels, which the merger needs when it picks the most permissive of several
//! merged members.
//!
//! # Key Types
//! - [`ClassAccessFlags`], [`FieldAccessFlags`], [`MethodAccessFlags`]: raw flag sets
//! - [`Visibility`]: ordered access level

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class access and property flags
    pub struct ClassAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared final, no subclasses allowed
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by invokespecial
        const SUPER = 0x0020;
        /// Is an interface, not a class
        const INTERFACE = 0x0200;
        /// Declared abstract, must not be instantiated
        const ABSTRACT = 0x0400;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface
        const ANNOTATION = 0x2000;
        /// Declared as an enum class
        const ENUM = 0x4000;
        /// Declared as a record class (carried from the `Record` attribute)
        const RECORD = 0x0001_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Field access and property flags
    pub struct FieldAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Never directly assigned after construction
        const FINAL = 0x0010;
        /// Cannot be cached
        const VOLATILE = 0x0040;
        /// Not written or read by a persistent object manager
        const TRANSIENT = 0x0080;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
        /// Element of an enum class
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access and property flags
    pub struct MethodAccessFlags: u32 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Must not be overridden
        const FINAL = 0x0010;
        /// Invocation is wrapped by a monitor use
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Implemented in a language other than Java
        const NATIVE = 0x0100;
        /// No implementation provided
        const ABSTRACT = 0x0400;
        /// Floating-point mode is FP-strict
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

/// Mask covering the three visibility bits shared by fields and methods.
pub const VISIBILITY_MASK: u32 = 0x0007;

/// Ordered access level, from most restrictive to most permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
    /// `private`
    Private,
    /// no modifier
    PackagePrivate,
    /// `protected`
    Protected,
    /// `public`
    Public,
}

impl Visibility {
    /// Decodes the visibility bits of a member.
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & VISIBILITY_MASK {
            0x0001 => Visibility::Public,
            0x0002 => Visibility::Private,
            0x0004 => Visibility::Protected,
            _ => Visibility::PackagePrivate,
        }
    }

    /// Encodes this visibility as member access bits.
    #[must_use]
    pub fn bits(self) -> u32 {
        match self {
            Visibility::Public => 0x0001,
            Visibility::Private => 0x0002,
            Visibility::Protected => 0x0004,
            Visibility::PackagePrivate => 0,
        }
    }
}

macro_rules! impl_member_visibility {
    ($($flags:ty),*) => {
        $(
            impl $flags {
                /// Returns the access level encoded in these flags.
                #[must_use]
                pub fn visibility(self) -> Visibility {
                    Visibility::from_bits(self.bits())
                }

                /// Returns a copy with the access level replaced.
                #[must_use]
                pub fn with_visibility(self, visibility: Visibility) -> Self {
                    Self::from_bits_retain((self.bits() & !VISIBILITY_MASK) | visibility.bits())
                }

                /// Returns true if neither public, protected nor private is set.
                #[must_use]
                pub fn is_package_private(self) -> bool {
                    self.visibility() == Visibility::PackagePrivate
                }
            }
        )*
    };
}

impl_member_visibility!(FieldAccessFlags, MethodAccessFlags);

impl ClassAccessFlags {
    /// Returns true if this is an interface or annotation interface.
    #[must_use]
    pub fn is_interface(self) -> bool {
        self.contains(ClassAccessFlags::INTERFACE)
    }

    /// Returns true if the class is abstract (interfaces included).
    #[must_use]
    pub fn is_abstract(self) -> bool {
        self.contains(ClassAccessFlags::ABSTRACT)
    }
}
