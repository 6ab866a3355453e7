//! Class, field and method definitions.
//!
//! Definitions are plain data records. A class owns its fields and methods; members keep
//! a weak back-reference to their holder in the form of a [`ClassId`] into the owning
//! [`crate::program::Program`] arena. Inheritance is expressed through [`TypeName`]
//! references only, every "is-a" question is answered by the hierarchy queries and the
//! [`crate::program::Resolver`] rather than by these types.

use std::{fmt, sync::Arc};

use crate::program::{
    ClassAccessFlags, Code, FieldAccessFlags, FieldRef, MethodAccessFlags, MethodRef, MethodSig,
    Proto, TypeName, TypeRef, Visibility, CLINIT, INIT,
};

/// Stable identifier of a class slot in the program arena.
///
/// Identifiers are never reused: a class that is merged away leaves an empty slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    /// Creates a class id from a raw arena index.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        ClassId(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Where a class definition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClassOrigin {
    /// Part of the program being optimized
    #[default]
    Program,
    /// Provided by the runtime library, never rewritten
    Library,
}

/// Output partition a class is assigned to.
///
/// Two classes may only be merged when they land in the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Placement {
    /// Dex file (or jar entry group) index
    pub dex_file: u32,
    /// Feature split name, `None` for the base module
    pub feature_split: Option<Arc<str>>,
    /// Listed in the main-dex list
    pub main_dex: bool,
    /// Listed in the startup profile
    pub startup: bool,
}

/// An annotation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Annotation {
    /// Annotation interface
    pub ty: TypeName,
    /// Element values by name
    pub elements: Vec<(Arc<str>, AnnotationValue)>,
}

impl Annotation {
    /// Creates a marker annotation without elements.
    #[must_use]
    pub fn marker(ty: TypeName) -> Self {
        Annotation {
            ty,
            elements: Vec::new(),
        }
    }
}

/// An annotation element value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AnnotationValue {
    /// Integral constant
    Int(i64),
    /// String constant
    String(Arc<str>),
    /// Class literal
    Type(TypeRef),
    /// Enum constant
    Enum(FieldRef),
    /// Nested annotation
    Annotation(Annotation),
    /// Array of values
    Array(Vec<AnnotationValue>),
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Owning class
    pub holder: ClassId,
    /// Current name
    pub name: Arc<str>,
    /// Declared type
    pub ty: TypeRef,
    /// Access flags
    pub flags: FieldAccessFlags,
    /// Runtime-visible annotations
    pub annotations: Vec<Annotation>,
    /// Name and type must be preserved
    pub pinned: bool,
    /// Reference as it was before any rewriting
    pub original: FieldRef,
}

impl FieldDef {
    /// Creates a field; `holder` and `original` are fixed up when the class is added to a program.
    pub fn new(name: impl AsRef<str>, ty: TypeRef, flags: FieldAccessFlags) -> Self {
        let name: Arc<str> = Arc::from(name.as_ref());
        FieldDef {
            holder: ClassId::new(usize::MAX),
            original: FieldRef {
                holder: TypeName::object(),
                name: name.clone(),
                ty: ty.clone(),
            },
            name,
            ty,
            flags,
            annotations: Vec::new(),
            pinned: false,
        }
    }

    /// Returns true for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAccessFlags::STATIC)
    }

    /// Returns true for final fields.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(FieldAccessFlags::FINAL)
    }
}

/// A method or constructor definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Owning class
    pub holder: ClassId,
    /// Current name and proto
    pub sig: MethodSig,
    /// Access flags
    pub flags: MethodAccessFlags,
    /// Body; `None` for abstract and native methods
    pub code: Option<Code>,
    /// Runtime-visible annotations
    pub annotations: Vec<Annotation>,
    /// Name and proto must be preserved
    pub pinned: bool,
    /// Created or relocated by class merging; free to be renamed on collisions
    pub synthesized: bool,
    /// Reference as it was before any rewriting, used for retracing
    pub original: MethodRef,
}

impl MethodDef {
    /// Creates a method; `holder` and `original` are fixed up when the class is added to a program.
    pub fn new(name: impl AsRef<str>, proto: Proto, flags: MethodAccessFlags, code: Option<Code>) -> Self {
        let sig = MethodSig::new(name, proto);
        MethodDef {
            holder: ClassId::new(usize::MAX),
            original: MethodRef::from_sig(TypeName::object(), sig.clone()),
            sig,
            flags,
            code,
            annotations: Vec::new(),
            pinned: false,
            synthesized: false,
        }
    }

    /// Returns true for static methods, class initializers included.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodAccessFlags::STATIC)
    }

    /// Returns true for private methods.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.flags.contains(MethodAccessFlags::PRIVATE)
    }

    /// Returns true for abstract methods.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodAccessFlags::ABSTRACT)
    }

    /// Returns true for native methods.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.flags.contains(MethodAccessFlags::NATIVE)
    }

    /// Returns true for synchronized methods.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.flags.contains(MethodAccessFlags::SYNCHRONIZED)
    }

    /// Returns true for final methods.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(MethodAccessFlags::FINAL)
    }

    /// Returns true for `<init>`.
    #[must_use]
    pub fn is_instance_initializer(&self) -> bool {
        &*self.sig.name == INIT
    }

    /// Returns true for `<clinit>`.
    #[must_use]
    pub fn is_class_initializer(&self) -> bool {
        &*self.sig.name == CLINIT
    }

    /// Returns true for methods dispatched through the vtable.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        !self.is_static() && !self.is_private() && !self.is_instance_initializer()
    }

    /// Returns true for methods invoked without dynamic dispatch.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        !self.is_virtual()
    }

    /// Access level of this method.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.flags.visibility()
    }
}

/// A class or interface definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Binary name
    pub name: TypeName,
    /// Superclass, `None` only for `java.lang.Object`
    pub super_type: Option<TypeName>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeName>,
    /// Access flags
    pub flags: ClassAccessFlags,
    /// Fields in declaration order
    pub fields: Vec<FieldDef>,
    /// Methods in declaration order, constructors and class initializer included
    pub methods: Vec<MethodDef>,
    /// Runtime-visible annotations
    pub annotations: Vec<Annotation>,
    /// Program or library class
    pub origin: ClassOrigin,
    /// Synthetic kind, `None` for classes present in source
    pub synthetic: Option<Arc<str>>,
    /// Kept by a keep rule or reflective lookup; name and identity must be preserved
    pub pinned: bool,
    /// Output partition
    pub placement: Placement,
    /// Nest host, if this class is a nest member
    pub nest_host: Option<TypeName>,
    /// Nest members, if this class is a nest host
    pub nest_members: Vec<TypeName>,
    /// Enclosing class of an inner or local class
    pub enclosing_class: Option<TypeName>,
}

impl ClassDef {
    /// Creates an empty public program class extending `super_type`.
    pub fn new(name: impl AsRef<str>, super_type: Option<TypeName>) -> Self {
        ClassDef {
            name: TypeName::new(name),
            super_type,
            interfaces: Vec::new(),
            flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            origin: ClassOrigin::Program,
            synthetic: None,
            pinned: false,
            placement: Placement::default(),
            nest_host: None,
            nest_members: Vec::new(),
            enclosing_class: None,
        }
    }

    /// Returns true for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags.is_interface()
    }

    /// Returns true for abstract classes and interfaces.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.flags.is_abstract()
    }

    /// Returns true for library classes.
    #[must_use]
    pub fn is_library(&self) -> bool {
        self.origin == ClassOrigin::Library
    }

    /// Returns true for classes declared final.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.flags.contains(ClassAccessFlags::FINAL)
    }

    /// Returns true if any field or method must keep its name.
    #[must_use]
    pub fn has_pinned_members(&self) -> bool {
        self.fields.iter().any(|f| f.pinned) || self.methods.iter().any(|m| m.pinned)
    }

    /// Returns true if the class carries an annotation of the given type.
    #[must_use]
    pub fn has_annotation(&self, ty: &TypeName) -> bool {
        self.annotations.iter().any(|a| &a.ty == ty)
    }

    /// Finds a method by signature.
    #[must_use]
    pub fn method(&self, sig: &MethodSig) -> Option<&MethodDef> {
        self.methods.iter().find(|m| &m.sig == sig)
    }

    /// Finds a method by signature, mutably.
    pub fn method_mut(&mut self, sig: &MethodSig) -> Option<&mut MethodDef> {
        self.methods.iter_mut().find(|m| &m.sig == sig)
    }

    /// Returns true if a method with this exact signature exists.
    #[must_use]
    pub fn has_method(&self, sig: &MethodSig) -> bool {
        self.method(sig).is_some()
    }

    /// Finds a field by name and type.
    #[must_use]
    pub fn field(&self, name: &str, ty: &TypeRef) -> Option<&FieldDef> {
        self.fields.iter().find(|f| &*f.name == name && &f.ty == ty)
    }

    /// Returns true if any field uses this name.
    #[must_use]
    pub fn has_field_named(&self, name: &str) -> bool {
        self.fields.iter().any(|f| &*f.name == name)
    }

    /// Instance fields in declaration order.
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.is_static())
    }

    /// Static fields in declaration order.
    pub fn static_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_static())
    }

    /// Instance initializers in declaration order.
    pub fn constructors(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_instance_initializer())
    }

    /// Virtual methods in declaration order.
    pub fn virtual_methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.methods.iter().filter(|m| m.is_virtual())
    }

    /// The class initializer, if any.
    #[must_use]
    pub fn class_initializer(&self) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.is_class_initializer())
    }

    /// Builds the symbolic reference of one of this class's fields.
    #[must_use]
    pub fn field_ref(&self, field: &FieldDef) -> FieldRef {
        FieldRef {
            holder: self.name.clone(),
            name: field.name.clone(),
            ty: field.ty.clone(),
        }
    }

    /// Builds the symbolic reference of one of this class's methods.
    #[must_use]
    pub fn method_ref(&self, method: &MethodDef) -> MethodRef {
        MethodRef::from_sig(self.name.clone(), method.sig.clone())
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a method, builder style.
    #[must_use]
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }
}
