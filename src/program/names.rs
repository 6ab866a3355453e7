//! Type names, type references and member signatures.
//!
//! Every cross-entity reference in a [`crate::program::Program`] is symbolic: code refers to
//! methods through [`MethodRef`], to fields through [`FieldRef`] and to classes through
//! [`TypeName`]. This mirrors how bytecode refers to its constant pool and keeps the
//! arena free of dangling pointers when classes are merged away; the
//! [`crate::lens::RewriteLens`] is the only place where an old reference is mapped to a new one.
//!
//! # Key Types
//! - [`TypeName`] - interned binary class name (`com.example.Foo`)
//! - [`TypeRef`] - primitive, class or array type
//! - [`Proto`] - parameter and return types of a method
//! - [`MethodSig`] / [`MethodRef`] - a method signature, optionally bound to a holder
//! - [`FieldRef`] - a field bound to its holder

use std::{fmt, sync::Arc};

/// Name of instance initializers.
pub const INIT: &str = "<init>";
/// Name of class initializers.
pub const CLINIT: &str = "<clinit>";
/// Binary name of the root class.
pub const JAVA_LANG_OBJECT: &str = "java.lang.Object";

/// An interned, dot-separated binary class name.
///
/// Cloning is cheap (reference counted). Ordering is lexicographic on the name, which is
/// what the grouping pipeline relies on for deterministic iteration.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Creates a new type name from its binary representation.
    ///
    /// # Arguments
    ///
    /// * `name` - A dot-separated binary name, e.g. `com.example.Foo$Bar`
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeName(Arc::from(name.as_ref()))
    }

    /// Returns `java.lang.Object`.
    #[must_use]
    pub fn object() -> Self {
        TypeName::new(JAVA_LANG_OBJECT)
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this is `java.lang.Object`.
    #[must_use]
    pub fn is_object(&self) -> bool {
        &*self.0 == JAVA_LANG_OBJECT
    }

    /// Returns the package part of the name, or an empty string for the default package.
    #[must_use]
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(index) => &self.0[..index],
            None => "",
        }
    }

    /// Returns the simple name, i.e. everything after the last `.`.
    ///
    /// Nested classes keep their `$` separators: `a.Outer$Inner` yields `Outer$Inner`.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        match self.0.rfind('.') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    /// Returns true if both names live in the same package.
    #[must_use]
    pub fn same_package(&self, other: &TypeName) -> bool {
        self.package() == other.package()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        TypeName::new(value)
    }
}

/// A value type as it appears in field types and method protos.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    /// `void`, only valid as a return type
    Void,
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `char`
    Char,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// A class or interface type
    Class(TypeName),
    /// An array of the element type
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Creates a class type reference.
    pub fn class(name: impl AsRef<str>) -> Self {
        TypeRef::Class(TypeName::new(name))
    }

    /// Returns `java.lang.Object` as a type reference.
    #[must_use]
    pub fn object() -> Self {
        TypeRef::Class(TypeName::object())
    }

    /// Creates an array type with the given element type.
    #[must_use]
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// Returns true for class and array types.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeRef::Class(_) | TypeRef::Array(_))
    }

    /// Returns true for `long` and `double`.
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, TypeRef::Long | TypeRef::Double)
    }

    /// Returns the class name if this is a (non-array) class type.
    #[must_use]
    pub fn as_class(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Class(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the innermost class name, looking through array dimensions.
    #[must_use]
    pub fn base_class(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Class(name) => Some(name),
            TypeRef::Array(element) => element.base_class(),
            _ => None,
        }
    }

    /// Returns a copy with every class name passed through `map`.
    pub fn map_classes<F>(&self, map: &F) -> TypeRef
    where
        F: Fn(&TypeName) -> TypeName,
    {
        match self {
            TypeRef::Class(name) => TypeRef::Class(map(name)),
            TypeRef::Array(element) => TypeRef::Array(Box::new(element.map_classes(map))),
            other => other.clone(),
        }
    }

    /// Returns the JVM descriptor of this type (`I`, `Ljava/lang/String;`, `[J`).
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            TypeRef::Void => "V".to_string(),
            TypeRef::Boolean => "Z".to_string(),
            TypeRef::Byte => "B".to_string(),
            TypeRef::Char => "C".to_string(),
            TypeRef::Short => "S".to_string(),
            TypeRef::Int => "I".to_string(),
            TypeRef::Long => "J".to_string(),
            TypeRef::Float => "F".to_string(),
            TypeRef::Double => "D".to_string(),
            TypeRef::Class(name) => format!("L{};", name.as_str().replace('.', "/")),
            TypeRef::Array(element) => format!("[{}", element.descriptor()),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Boolean => f.write_str("boolean"),
            TypeRef::Byte => f.write_str("byte"),
            TypeRef::Char => f.write_str("char"),
            TypeRef::Short => f.write_str("short"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Long => f.write_str("long"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::Double => f.write_str("double"),
            TypeRef::Class(name) => write!(f, "{name}"),
            TypeRef::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// Parameter and return types of a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Proto {
    /// Formal parameter types, not including the receiver
    pub params: Vec<TypeRef>,
    /// Return type
    pub ret: TypeRef,
}

impl Proto {
    /// Creates a proto from parameter and return types.
    #[must_use]
    pub fn new(params: Vec<TypeRef>, ret: TypeRef) -> Self {
        Proto { params, ret }
    }

    /// Creates a proto returning `void`.
    #[must_use]
    pub fn void(params: Vec<TypeRef>) -> Self {
        Proto {
            params,
            ret: TypeRef::Void,
        }
    }

    /// Returns a copy with `param` appended to the parameter list.
    #[must_use]
    pub fn with_appended(&self, param: TypeRef) -> Proto {
        let mut params = self.params.clone();
        params.push(param);
        Proto {
            params,
            ret: self.ret.clone(),
        }
    }

    /// Returns a copy with every class name passed through `map`.
    pub fn map_classes<F>(&self, map: &F) -> Proto
    where
        F: Fn(&TypeName) -> TypeName,
    {
        Proto {
            params: self.params.iter().map(|p| p.map_classes(map)).collect(),
            ret: self.ret.map_classes(map),
        }
    }

    /// Returns true if any parameter or the return type mentions `name`.
    #[must_use]
    pub fn mentions(&self, name: &TypeName) -> bool {
        self.params
            .iter()
            .chain(std::iter::once(&self.ret))
            .any(|t| t.base_class() == Some(name))
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ")")?;
        write!(f, "{}", self.ret)
    }
}

/// A method name together with its proto.
///
/// Two methods in one class never share a `MethodSig`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSig {
    /// Method name
    pub name: Arc<str>,
    /// Parameter and return types
    pub proto: Proto,
}

impl MethodSig {
    /// Creates a signature from a name and proto.
    pub fn new(name: impl AsRef<str>, proto: Proto) -> Self {
        MethodSig {
            name: Arc::from(name.as_ref()),
            proto,
        }
    }

    /// Returns true for `<init>`.
    #[must_use]
    pub fn is_instance_initializer(&self) -> bool {
        &*self.name == INIT
    }

    /// Returns true for `<clinit>`.
    #[must_use]
    pub fn is_class_initializer(&self) -> bool {
        &*self.name == CLINIT
    }

    /// Returns a copy carrying a different name.
    #[must_use]
    pub fn with_name(&self, name: impl AsRef<str>) -> MethodSig {
        MethodSig::new(name, self.proto.clone())
    }

    /// Returns a copy carrying a different proto.
    #[must_use]
    pub fn with_proto(&self, proto: Proto) -> MethodSig {
        MethodSig {
            name: self.name.clone(),
            proto,
        }
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.proto)
    }
}

/// A method signature bound to the class that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Holder class as written at the reference site
    pub holder: TypeName,
    /// Name and proto
    pub sig: MethodSig,
}

impl MethodRef {
    /// Creates a method reference.
    pub fn new(holder: TypeName, name: impl AsRef<str>, proto: Proto) -> Self {
        MethodRef {
            holder,
            sig: MethodSig::new(name, proto),
        }
    }

    /// Binds an existing signature to a holder.
    #[must_use]
    pub fn from_sig(holder: TypeName, sig: MethodSig) -> Self {
        MethodRef { holder, sig }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.sig.name
    }

    /// Method proto.
    #[must_use]
    pub fn proto(&self) -> &Proto {
        &self.sig.proto
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.holder, self.sig)
    }
}

/// A field bound to the class that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    /// Holder class as written at the reference site
    pub holder: TypeName,
    /// Field name
    pub name: Arc<str>,
    /// Declared field type
    pub ty: TypeRef,
}

impl FieldRef {
    /// Creates a field reference.
    pub fn new(holder: TypeName, name: impl AsRef<str>, ty: TypeRef) -> Self {
        FieldRef {
            holder,
            name: Arc::from(name.as_ref()),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.holder, self.name, self.ty)
    }
}

/// Any symbolic reference a [`crate::lens::RewriteLens`] can rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    /// A class or interface
    Type(TypeName),
    /// A field
    Field(FieldRef),
    /// A method or constructor
    Method(MethodRef),
}

impl Reference {
    /// Returns the class this reference points into.
    #[must_use]
    pub fn holder(&self) -> &TypeName {
        match self {
            Reference::Type(name) => name,
            Reference::Field(field) => &field.holder,
            Reference::Method(method) => &method.holder,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Type(name) => write!(f, "{name}"),
            Reference::Field(field) => write!(f, "{field}"),
            Reference::Method(method) => write!(f, "{method}"),
        }
    }
}
