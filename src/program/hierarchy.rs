//! Class hierarchy queries over the program arena.
//!
//! Supertype queries walk the `super_type` / `interfaces` references of live classes.
//! Classes the program does not define (a library that was not modeled) are treated as
//! direct subclasses of `java.lang.Object` without interfaces, which keeps every answer
//! conservative: an unknown class is never reported as a subtype of anything but itself
//! and `Object`.
//!
//! Subtype queries need the inverse relation; [`SubtypeIndex`] computes it once.

use std::collections::{BTreeMap, BTreeSet};

use crate::program::{ClassId, Program, TypeName, TypeRef};

impl Program {
    /// Returns the id of the superclass of `id`, if it is defined in the program.
    #[must_use]
    pub fn superclass(&self, id: ClassId) -> Option<ClassId> {
        let super_type = self.class(id)?.super_type.as_ref()?;
        self.lookup(super_type)
    }

    /// Returns the superclasses of `id`, nearest first.
    #[must_use]
    pub fn superclass_chain(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = self.superclass(id);
        while let Some(next) = current {
            if chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = self.superclass(next);
        }
        chain
    }

    /// Returns the names of `name` and all of its supertypes that the program defines,
    /// superclasses first, then interfaces, always ending with `java.lang.Object`.
    #[must_use]
    pub fn supertypes_of(&self, name: &TypeName) -> Vec<TypeName> {
        let mut result = vec![name.clone()];
        if let Some(id) = self.lookup(name) {
            for super_id in self.superclass_chain(id) {
                if let Some(class) = self.class(super_id) {
                    result.push(class.name.clone());
                }
            }
            result.extend(self.all_interfaces(id));
        }
        if !result.iter().any(TypeName::is_object) {
            result.push(TypeName::object());
        }
        result
    }

    /// Returns every interface `id` implements, directly, through superinterfaces or
    /// through superclasses.
    #[must_use]
    pub fn all_interfaces(&self, id: ClassId) -> BTreeSet<TypeName> {
        let mut result = BTreeSet::new();
        let mut worklist: Vec<TypeName> = Vec::new();

        let mut current = Some(id);
        while let Some(class_id) = current {
            if let Some(class) = self.class(class_id) {
                worklist.extend(class.interfaces.iter().cloned());
            }
            current = self.superclass(class_id);
        }

        while let Some(interface) = worklist.pop() {
            if !result.insert(interface.clone()) {
                continue;
            }
            if let Some(class) = self.class_by_name(&interface) {
                worklist.extend(class.interfaces.iter().cloned());
            }
        }
        result
    }

    /// Returns true if `sub` is `sup` or one of its subtypes.
    #[must_use]
    pub fn is_subtype(&self, sub: &TypeName, sup: &TypeName) -> bool {
        if sub == sup || sup.is_object() {
            return true;
        }
        let Some(id) = self.lookup(sub) else {
            return false;
        };
        if self
            .superclass_chain(id)
            .into_iter()
            .filter_map(|s| self.class(s))
            .any(|c| &c.name == sup)
        {
            return true;
        }
        self.all_interfaces(id).contains(sup)
    }

    /// Subtype test over value types; arrays are covariant in their element type.
    #[must_use]
    pub fn is_assignable(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        match (sub, sup) {
            (a, b) if a == b => true,
            (TypeRef::Class(a), TypeRef::Class(b)) => self.is_subtype(a, b),
            (TypeRef::Array(_), TypeRef::Class(b)) => b.is_object(),
            (TypeRef::Array(a), TypeRef::Array(b)) => {
                a.is_reference() && b.is_reference() && self.is_assignable(a, b)
            }
            _ => false,
        }
    }

    /// Computes the least upper bound of two value types.
    ///
    /// For classes this is the nearest common superclass; when that is `java.lang.Object`
    /// and both types share exactly one most specific interface, the interface is used
    /// instead. Returns `None` when the types are distinct primitives.
    #[must_use]
    pub fn least_upper_bound(&self, a: &TypeRef, b: &TypeRef) -> Option<TypeRef> {
        if a == b {
            return Some(a.clone());
        }
        match (a, b) {
            (TypeRef::Class(x), TypeRef::Class(y)) => Some(TypeRef::Class(self.class_lub(x, y))),
            (TypeRef::Array(x), TypeRef::Array(y)) => {
                if x.is_reference() && y.is_reference() {
                    self.least_upper_bound(x, y).map(TypeRef::array_of)
                } else {
                    Some(TypeRef::object())
                }
            }
            (x, y) if x.is_reference() && y.is_reference() => Some(TypeRef::object()),
            _ => None,
        }
    }

    fn class_lub(&self, a: &TypeName, b: &TypeName) -> TypeName {
        let chain_of = |name: &TypeName| -> Vec<TypeName> {
            let mut chain = vec![name.clone()];
            if let Some(id) = self.lookup(name) {
                chain.extend(
                    self.superclass_chain(id)
                        .into_iter()
                        .filter_map(|s| self.class(s).map(|c| c.name.clone())),
                );
            }
            chain
        };

        let a_chain = chain_of(a);
        let b_chain = chain_of(b);
        if let Some(common) = b_chain.iter().find(|n| a_chain.contains(n)) {
            if !common.is_object() {
                return common.clone();
            }
        }

        let interfaces_of = |name: &TypeName| -> BTreeSet<TypeName> {
            let mut set = BTreeSet::new();
            if let Some(id) = self.lookup(name) {
                if self.class(id).is_some_and(|c| c.is_interface()) {
                    set.insert(name.clone());
                }
                set.extend(self.all_interfaces(id));
            }
            set
        };
        let common: Vec<TypeName> = interfaces_of(a)
            .intersection(&interfaces_of(b))
            .cloned()
            .collect();
        let most_specific: Vec<&TypeName> = common
            .iter()
            .filter(|i| !common.iter().any(|j| j != *i && self.is_subtype(j, i)))
            .collect();

        match most_specific.as_slice() {
            [single] => (*single).clone(),
            _ => TypeName::object(),
        }
    }
}

/// Inverse of the supertype relation for program classes and interfaces.
#[derive(Debug, Clone, Default)]
pub struct SubtypeIndex {
    direct: BTreeMap<TypeName, Vec<TypeName>>,
}

impl SubtypeIndex {
    /// Builds the index from all live classes.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut direct: BTreeMap<TypeName, Vec<TypeName>> = BTreeMap::new();
        for (_, class) in program.classes() {
            for parent in class.super_type.iter().chain(class.interfaces.iter()) {
                direct
                    .entry(parent.clone())
                    .or_default()
                    .push(class.name.clone());
            }
        }
        for children in direct.values_mut() {
            children.sort();
            children.dedup();
        }
        SubtypeIndex { direct }
    }

    /// Classes and interfaces that directly extend or implement `name`, sorted by name.
    #[must_use]
    pub fn direct_subtypes(&self, name: &TypeName) -> &[TypeName] {
        self.direct.get(name).map_or(&[], Vec::as_slice)
    }

    /// Every transitive subtype of `name`, excluding `name`, sorted by name.
    #[must_use]
    pub fn all_subtypes(&self, name: &TypeName) -> Vec<TypeName> {
        let mut seen = BTreeSet::new();
        let mut worklist = vec![name.clone()];
        while let Some(current) = worklist.pop() {
            for child in self.direct_subtypes(&current) {
                if seen.insert(child.clone()) {
                    worklist.push(child.clone());
                }
            }
        }
        seen.remove(name);
        seen.into_iter().collect()
    }

    /// Returns true if any class or interface extends or implements `name`.
    #[must_use]
    pub fn has_subtypes(&self, name: &TypeName) -> bool {
        !self.direct_subtypes(name).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ClassAccessFlags, ClassDef};

    fn program() -> Program {
        let mut program = Program::new();
        let object = TypeName::object();
        program.add_class(ClassDef::new("java.lang.Object", None)).unwrap();

        let mut i = ClassDef::new("a.I", Some(object.clone()));
        i.flags |= ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        program.add_class(i).unwrap();
        let mut j = ClassDef::new("a.J", Some(object.clone()));
        j.flags |= ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        j.interfaces.push(TypeName::new("a.I"));
        program.add_class(j).unwrap();

        program.add_class(ClassDef::new("a.Base", Some(object.clone()))).unwrap();
        let mut a = ClassDef::new("a.A", Some(TypeName::new("a.Base")));
        a.interfaces.push(TypeName::new("a.J"));
        program.add_class(a).unwrap();
        program.add_class(ClassDef::new("a.B", Some(TypeName::new("a.Base")))).unwrap();

        let mut x = ClassDef::new("a.X", Some(object.clone()));
        x.interfaces.push(TypeName::new("a.I"));
        program.add_class(x).unwrap();
        let mut y = ClassDef::new("a.Y", Some(object));
        y.interfaces.push(TypeName::new("a.J"));
        program.add_class(y).unwrap();
        program
    }

    #[test]
    fn test_is_subtype() {
        let program = program();
        assert!(program.is_subtype(&TypeName::new("a.A"), &TypeName::new("a.Base")));
        assert!(program.is_subtype(&TypeName::new("a.A"), &TypeName::new("a.I")));
        assert!(!program.is_subtype(&TypeName::new("a.B"), &TypeName::new("a.I")));
        assert!(program.is_subtype(&TypeName::new("unknown.C"), &TypeName::object()));
    }

    #[test]
    fn test_least_upper_bound_prefers_common_superclass() {
        let program = program();
        let lub = program
            .least_upper_bound(&TypeRef::class("a.A"), &TypeRef::class("a.B"))
            .unwrap();
        assert_eq!(lub, TypeRef::class("a.Base"));
    }

    #[test]
    fn test_least_upper_bound_uses_single_common_interface() {
        let program = program();
        let lub = program
            .least_upper_bound(&TypeRef::class("a.X"), &TypeRef::class("a.Y"))
            .unwrap();
        assert_eq!(lub, TypeRef::class("a.I"));
    }

    #[test]
    fn test_least_upper_bound_primitives() {
        let program = program();
        assert_eq!(program.least_upper_bound(&TypeRef::Int, &TypeRef::Long), None);
        assert_eq!(
            program.least_upper_bound(&TypeRef::Int, &TypeRef::class("a.A")),
            None
        );
    }

    #[test]
    fn test_subtype_index() {
        let program = program();
        let index = SubtypeIndex::build(&program);
        assert_eq!(
            index.direct_subtypes(&TypeName::new("a.Base")),
            &[TypeName::new("a.A"), TypeName::new("a.B")]
        );
        let all = index.all_subtypes(&TypeName::new("a.I"));
        assert_eq!(
            all,
            vec![TypeName::new("a.A"), TypeName::new("a.J"), TypeName::new("a.X"), TypeName::new("a.Y")]
        );
    }
}
