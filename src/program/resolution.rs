//! Virtual dispatch resolution.
//!
//! The merger never implements dispatch rules itself; it asks a [`Resolver`] which method
//! a virtual or interface call with a given static receiver type binds to. The default
//! [`HierarchyResolver`] follows the JVM rules: the receiver's class chain first, then the
//! maximally specific superinterface methods.

use std::fmt;

use crate::program::{ClassId, MethodRef, MethodSig, Program, TypeName};

/// Outcome of resolving a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one target
    Single(MethodRef),
    /// Several maximally specific default methods; invoking throws at runtime
    Ambiguous(Vec<MethodRef>),
    /// No method matches
    NotFound,
}

impl Resolution {
    /// Returns the single target, if there is one.
    #[must_use]
    pub fn single(&self) -> Option<&MethodRef> {
        match self {
            Resolution::Single(method) => Some(method),
            _ => None,
        }
    }

    /// Returns true if resolution failed or is ambiguous.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !matches!(self, Resolution::Single(_))
    }
}

/// The resolution collaborator queried by policies and the deadlock tracer.
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Resolves a virtual or interface invoke of `sig` on a receiver statically typed `receiver`.
    fn resolve_virtual(&self, program: &Program, receiver: &TypeName, sig: &MethodSig) -> Resolution;
}

/// Resolution by walking the class hierarchy of the program.
#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchyResolver;

impl HierarchyResolver {
    fn maximally_specific(program: &Program, start: ClassId, sig: &MethodSig) -> Resolution {
        let mut candidates: Vec<(TypeName, bool)> = Vec::new();
        for interface in program.all_interfaces(start) {
            if let Some(method) = program
                .class_by_name(&interface)
                .and_then(|c| c.method(sig))
                .filter(|m| !m.is_static() && !m.is_private())
            {
                candidates.push((interface, !method.is_abstract()));
            }
        }
        if program.class(start).is_some_and(|c| c.is_interface()) {
            if let Some(class) = program.class(start) {
                if let Some(method) = class.method(sig).filter(|m| !m.is_static()) {
                    candidates.push((class.name.clone(), !method.is_abstract()));
                }
            }
        }

        let most_specific: Vec<&(TypeName, bool)> = candidates
            .iter()
            .filter(|(name, _)| {
                !candidates
                    .iter()
                    .any(|(other, _)| other != name && program.is_subtype(other, name))
            })
            .collect();

        let concrete: Vec<MethodRef> = most_specific
            .iter()
            .filter(|(_, has_body)| *has_body)
            .map(|(name, _)| MethodRef::from_sig(name.clone(), sig.clone()))
            .collect();

        match concrete.len() {
            0 => most_specific.first().map_or(Resolution::NotFound, |(name, _)| {
                Resolution::Single(MethodRef::from_sig(name.clone(), sig.clone()))
            }),
            1 => Resolution::Single(concrete[0].clone()),
            _ => Resolution::Ambiguous(concrete),
        }
    }
}

impl Resolver for HierarchyResolver {
    fn resolve_virtual(&self, program: &Program, receiver: &TypeName, sig: &MethodSig) -> Resolution {
        let Some(start) = program.lookup(receiver) else {
            return Resolution::NotFound;
        };

        let mut current = Some(start);
        while let Some(id) = current {
            let Some(class) = program.class(id) else {
                break;
            };
            if class.is_interface() {
                break;
            }
            if let Some(method) = class.method(sig).filter(|m| !m.is_static()) {
                return Resolution::Single(class.method_ref(method));
            }
            current = program.superclass(id);
        }

        Self::maximally_specific(program, start, sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        ClassAccessFlags, ClassDef, Code, Instruction, MethodAccessFlags, MethodDef, Proto,
    };

    fn interface(name: &str, default_body: bool, extends: &[&str]) -> ClassDef {
        let mut class = ClassDef::new(name, Some(TypeName::object()));
        class.flags |= ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        class.interfaces = extends.iter().map(|n| TypeName::new(*n)).collect();
        let (flags, code) = if default_body {
            (MethodAccessFlags::PUBLIC, Some(Code::new(vec![Instruction::Return])))
        } else {
            (MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT, None)
        };
        class.with_method(MethodDef::new("m", Proto::void(vec![]), flags, code))
    }

    #[test]
    fn test_class_method_wins() {
        let mut program = Program::new();
        program.add_class(interface("a.I", true, &[])).unwrap();
        let mut a = ClassDef::new("a.A", Some(TypeName::object())).with_method(MethodDef::new(
            "m",
            Proto::void(vec![]),
            MethodAccessFlags::PUBLIC,
            Some(Code::new(vec![Instruction::Return])),
        ));
        a.interfaces.push(TypeName::new("a.I"));
        program.add_class(a).unwrap();
        program.add_class(ClassDef::new("a.B", Some(TypeName::new("a.A")))).unwrap();

        let sig = MethodSig::new("m", Proto::void(vec![]));
        let resolution = HierarchyResolver.resolve_virtual(&program, &TypeName::new("a.B"), &sig);
        assert_eq!(resolution.single().unwrap().holder, TypeName::new("a.A"));
    }

    #[test]
    fn test_more_specific_default_wins() {
        let mut program = Program::new();
        program.add_class(interface("a.I", true, &[])).unwrap();
        program.add_class(interface("a.J", true, &["a.I"])).unwrap();
        let mut a = ClassDef::new("a.A", Some(TypeName::object()));
        a.interfaces = vec![TypeName::new("a.I"), TypeName::new("a.J")];
        program.add_class(a).unwrap();

        let sig = MethodSig::new("m", Proto::void(vec![]));
        let resolution = HierarchyResolver.resolve_virtual(&program, &TypeName::new("a.A"), &sig);
        assert_eq!(resolution.single().unwrap().holder, TypeName::new("a.J"));
    }

    #[test]
    fn test_conflicting_defaults_are_ambiguous() {
        let mut program = Program::new();
        program.add_class(interface("a.I", true, &[])).unwrap();
        program.add_class(interface("a.K", true, &[])).unwrap();
        let mut a = ClassDef::new("a.A", Some(TypeName::object()));
        a.interfaces = vec![TypeName::new("a.I"), TypeName::new("a.K")];
        program.add_class(a).unwrap();

        let sig = MethodSig::new("m", Proto::void(vec![]));
        let resolution = HierarchyResolver.resolve_virtual(&program, &TypeName::new("a.A"), &sig);
        assert!(matches!(resolution, Resolution::Ambiguous(ref targets) if targets.len() == 2));
        assert!(resolution.is_failure());
    }
}
