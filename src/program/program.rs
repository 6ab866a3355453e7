//! The arena holding every class of the program.

use rustc_hash::FxHashMap;

use crate::{
    program::{ClassDef, ClassId, FieldDef, FieldRef, MethodDef, MethodRef, TypeName},
    Error, Result,
};

/// A non-class file shipped with the program whose contents may name classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResource {
    /// Path inside the artifact, e.g. `META-INF/services/com.example.Api`
    pub name: String,
    /// Text contents
    pub contents: String,
    /// Whether class names inside `contents` are rewritten
    pub adapt_contents: bool,
}

/// An entry of the startup profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileRule {
    /// A class loaded during startup
    Class(TypeName),
    /// A method executed during startup
    Method(MethodRef),
}

/// The whole program: an arena of class definitions keyed by [`ClassId`].
///
/// Slots of classes absorbed by merging are emptied, never reused, so ids handed out
/// before merging stay valid (they simply no longer resolve). Name lookups go through
/// an index that is kept in sync by [`Program::add_class`] and [`Program::remove_class`].
#[derive(Debug, Clone, Default)]
pub struct Program {
    classes: Vec<Option<ClassDef>>,
    by_name: FxHashMap<TypeName, ClassId>,
    /// Data resources shipped with the program
    pub resources: Vec<DataResource>,
    /// Startup profile entries
    pub startup_profile: Vec<ProfileRule>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a class and assigns it the next free id.
    ///
    /// Member back-references and original references are fixed up to point at the new class.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateClass`] if a class with the same name already exists.
    pub fn add_class(&mut self, mut class: ClassDef) -> Result<ClassId> {
        if self.by_name.contains_key(&class.name) {
            return Err(Error::DuplicateClass(class.name));
        }

        let id = ClassId::new(self.classes.len());
        for field in &mut class.fields {
            field.holder = id;
            field.original = FieldRef {
                holder: class.name.clone(),
                name: field.name.clone(),
                ty: field.ty.clone(),
            };
        }
        for method in &mut class.methods {
            method.holder = id;
            if !method.synthesized {
                method.original = MethodRef::from_sig(class.name.clone(), method.sig.clone());
            }
        }

        self.by_name.insert(class.name.clone(), id);
        self.classes.push(Some(class));
        Ok(id)
    }

    /// Removes a class, leaving its slot empty.
    pub fn remove_class(&mut self, id: ClassId) -> Option<ClassDef> {
        let class = self.classes.get_mut(id.index())?.take()?;
        self.by_name.remove(&class.name);
        Some(class)
    }

    /// Returns the class stored under `id`, if it is still live.
    #[must_use]
    pub fn class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns the class stored under `id` mutably, if it is still live.
    pub fn class_mut(&mut self, id: ClassId) -> Option<&mut ClassDef> {
        self.classes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Returns the class stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if the slot is empty or out of range.
    pub fn get(&self, id: ClassId) -> Result<&ClassDef> {
        self.class(id)
            .ok_or_else(|| Error::ClassNotFound(TypeName::new(id.to_string())))
    }

    /// Returns the class stored under `id` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ClassNotFound`] if the slot is empty or out of range.
    pub fn get_mut(&mut self, id: ClassId) -> Result<&mut ClassDef> {
        self.class_mut(id)
            .ok_or_else(|| Error::ClassNotFound(TypeName::new(id.to_string())))
    }

    /// Looks up the id of a class by name.
    #[must_use]
    pub fn lookup(&self, name: &TypeName) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Looks up a class by name.
    #[must_use]
    pub fn class_by_name(&self, name: &TypeName) -> Option<&ClassDef> {
        self.lookup(name).and_then(|id| self.class(id))
    }

    /// Returns true if `name` is a live program (non-library) class.
    #[must_use]
    pub fn is_program_class(&self, name: &TypeName) -> bool {
        self.class_by_name(name).is_some_and(|c| !c.is_library())
    }

    /// Number of live classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if the program holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates live classes in id order.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassDef)> {
        self.classes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|c| (ClassId::new(index), c)))
    }

    /// Iterates live program (non-library) classes in id order.
    pub fn program_classes(&self) -> impl Iterator<Item = (ClassId, &ClassDef)> {
        self.classes().filter(|(_, c)| !c.is_library())
    }

    /// Returns the ids of all live classes in id order.
    #[must_use]
    pub fn class_ids(&self) -> Vec<ClassId> {
        self.classes().map(|(id, _)| id).collect()
    }

    /// Finds a method declared exactly by `method.holder`.
    #[must_use]
    pub fn method(&self, method: &MethodRef) -> Option<&MethodDef> {
        self.class_by_name(&method.holder)?.method(&method.sig)
    }

    /// Finds a field declared exactly by `field.holder`.
    #[must_use]
    pub fn field(&self, field: &FieldRef) -> Option<&FieldDef> {
        self.class_by_name(&field.holder)?.field(&field.name, &field.ty)
    }

    /// Resolves a field reference the way the runtime does: the holder, then its
    /// superinterfaces, then its superclass chain.
    ///
    /// Returns the declaring class and field.
    #[must_use]
    pub fn resolve_field(&self, field: &FieldRef) -> Option<(ClassId, &FieldDef)> {
        let mut current = Some(field.holder.clone());
        while let Some(name) = current {
            let id = self.lookup(&name)?;
            let class = self.class(id)?;
            if let Some(found) = class.field(&field.name, &field.ty) {
                return Some((id, found));
            }
            for interface in self.all_interfaces(id) {
                if let Some(found) = self
                    .lookup(&interface)
                    .and_then(|iid| self.class(iid).map(|c| (iid, c)))
                    .and_then(|(iid, c)| c.field(&field.name, &field.ty).map(|f| (iid, f)))
                {
                    return Some(found);
                }
            }
            current = class.super_type.clone();
        }
        None
    }

    /// Resolves a method reference against the holder and its superclasses, then its
    /// superinterfaces.
    ///
    /// This is the lookup used for direct, static and super invokes and for checking that a
    /// rewritten reference still points somewhere; virtual dispatch goes through
    /// [`crate::program::Resolver`].
    #[must_use]
    pub fn lookup_method(&self, method: &MethodRef) -> Option<(ClassId, &MethodDef)> {
        let start = self.lookup(&method.holder)?;
        let mut current = Some(start);
        while let Some(id) = current {
            let class = self.class(id)?;
            if let Some(found) = class.method(&method.sig) {
                return Some((id, found));
            }
            current = self.superclass(id);
        }
        self.all_interfaces(start).into_iter().find_map(|interface| {
            let iid = self.lookup(&interface)?;
            let found = self.class(iid)?.method(&method.sig)?;
            Some((iid, found))
        })
    }

    /// Returns an unused class name derived from `base` by appending `$n`.
    #[must_use]
    pub fn fresh_class_name(&self, base: &str) -> TypeName {
        let mut counter = 0usize;
        loop {
            let candidate = TypeName::new(format!("{base}${counter}"));
            if self.lookup(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Calls `visit` with every method body of every program class.
    pub fn for_each_code_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&TypeName, &mut MethodDef),
    {
        for class in self.classes.iter_mut().flatten() {
            if class.is_library() {
                continue;
            }
            let name = class.name.clone();
            for method in &mut class.methods {
                visit(&name, method);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{FieldAccessFlags, MethodAccessFlags, Proto, TypeRef};

    fn sample() -> Program {
        let mut program = Program::new();
        program
            .add_class(ClassDef::new("java.lang.Object", None))
            .unwrap();
        program
            .add_class(
                ClassDef::new("a.Base", Some(TypeName::object()))
                    .with_field(FieldDef::new("x", TypeRef::Int, FieldAccessFlags::PUBLIC))
                    .with_method(MethodDef::new(
                        "m",
                        Proto::void(vec![]),
                        MethodAccessFlags::PUBLIC,
                        None,
                    )),
            )
            .unwrap();
        program
            .add_class(ClassDef::new("a.Sub", Some(TypeName::new("a.Base"))))
            .unwrap();
        program
    }

    #[test]
    fn test_add_and_remove() {
        let mut program = sample();
        assert_eq!(program.len(), 3);

        let sub = program.lookup(&TypeName::new("a.Sub")).unwrap();
        assert!(program.remove_class(sub).is_some());
        assert!(program.class(sub).is_none());
        assert!(program.lookup(&TypeName::new("a.Sub")).is_none());
        assert_eq!(program.len(), 2);

        let dup = program.add_class(ClassDef::new("a.Base", Some(TypeName::object())));
        assert!(matches!(dup, Err(Error::DuplicateClass(_))));
    }

    #[test]
    fn test_member_back_references() {
        let program = sample();
        let base = program.lookup(&TypeName::new("a.Base")).unwrap();
        let class = program.class(base).unwrap();
        assert_eq!(class.fields[0].holder, base);
        assert_eq!(class.methods[0].original.holder, TypeName::new("a.Base"));
    }

    #[test]
    fn test_resolve_through_superclass() {
        let program = sample();
        let field = FieldRef::new(TypeName::new("a.Sub"), "x", TypeRef::Int);
        let (holder, _) = program.resolve_field(&field).unwrap();
        assert_eq!(holder, program.lookup(&TypeName::new("a.Base")).unwrap());

        let method = MethodRef::new(TypeName::new("a.Sub"), "m", Proto::void(vec![]));
        assert!(program.lookup_method(&method).is_some());
        let missing = MethodRef::new(TypeName::new("a.Sub"), "n", Proto::void(vec![]));
        assert!(program.lookup_method(&missing).is_none());
    }
}
