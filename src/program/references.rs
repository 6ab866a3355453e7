//! Reverse index from references to the code that uses them.
//!
//! Built once per merger run by scanning every method body of the program. Lookups are
//! proportional to the number of uses of the queried reference, not to program size.

use rustc_hash::FxHashMap;

use crate::program::{MethodRef, Program, Reference, ReferenceKind, TypeName};

/// One use of a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceSite {
    /// Method containing the use
    pub method: MethodRef,
    /// Instruction index (or handler index offset by the instruction count)
    pub index: usize,
    /// How the reference is used
    pub kind: ReferenceKind,
}

/// Reverse reference index: who calls, reads, writes or type-checks what.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    sites: FxHashMap<Reference, Vec<ReferenceSite>>,
    members_by_holder: FxHashMap<TypeName, Vec<Reference>>,
    type_checked: FxHashMap<TypeName, Vec<ReferenceSite>>,
}

impl ReferenceIndex {
    /// Scans every program method body.
    #[must_use]
    pub fn build(program: &Program) -> Self {
        let mut index = ReferenceIndex::default();

        for (_, class) in program.program_classes() {
            for method in &class.methods {
                let Some(code) = &method.code else {
                    continue;
                };
                let method_ref = class.method_ref(method);
                code.for_each_reference(|position, kind, reference| {
                    index.record(&method_ref, position, kind, reference);
                });
            }
        }

        for members in index.members_by_holder.values_mut() {
            members.sort();
            members.dedup();
        }
        log::debug!(
            "reference index: {} distinct references, {} type-checked types",
            index.sites.len(),
            index.type_checked.len()
        );
        index
    }

    fn record(&mut self, method: &MethodRef, position: usize, kind: ReferenceKind, reference: Reference) {
        let site = ReferenceSite {
            method: method.clone(),
            index: position,
            kind,
        };
        if kind.is_runtime_type_check() {
            if let Reference::Type(name) = &reference {
                self.type_checked
                    .entry(name.clone())
                    .or_default()
                    .push(site.clone());
            }
        }
        if !matches!(reference, Reference::Type(_)) {
            self.members_by_holder
                .entry(reference.holder().clone())
                .or_default()
                .push(reference.clone());
        }
        self.sites.entry(reference).or_default().push(site);
    }

    /// All uses of `reference`, in program order.
    #[must_use]
    pub fn sites(&self, reference: &Reference) -> &[ReferenceSite] {
        self.sites.get(reference).map_or(&[], Vec::as_slice)
    }

    /// All call sites of `method`.
    #[must_use]
    pub fn call_sites(&self, method: &MethodRef) -> &[ReferenceSite] {
        self.sites(&Reference::Method(method.clone()))
    }

    /// Distinct field and method references written with `holder` as their holder.
    #[must_use]
    pub fn members_referenced_through(&self, holder: &TypeName) -> &[Reference] {
        self.members_by_holder.get(holder).map_or(&[], Vec::as_slice)
    }

    /// Uses of `ty` that observe runtime identity (`instanceof`, `checkcast`, class
    /// literals, catch types).
    #[must_use]
    pub fn runtime_type_checks(&self, ty: &TypeName) -> &[ReferenceSite] {
        self.type_checked.get(ty).map_or(&[], Vec::as_slice)
    }

    /// Returns true if `ty` is used in any runtime type check.
    #[must_use]
    pub fn is_type_checked(&self, ty: &TypeName) -> bool {
        self.type_checked.contains_key(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{
        ClassDef, Code, Instruction, InvokeKind, MethodAccessFlags, MethodDef, Proto, TypeRef,
    };

    #[test]
    fn test_index_records_calls_and_type_checks() {
        let callee = MethodRef::new(TypeName::new("a.A"), "f", Proto::void(vec![]));
        let main = MethodDef::new(
            "main",
            Proto::void(vec![]),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            Some(Code::new(vec![
                Instruction::ConstNull,
                Instruction::Invoke {
                    kind: InvokeKind::Virtual,
                    method: callee.clone(),
                },
                Instruction::ConstNull,
                Instruction::InstanceOf(TypeRef::class("a.B")),
                Instruction::Pop,
                Instruction::Return,
            ])),
        );
        let mut program = Program::new();
        program
            .add_class(ClassDef::new("a.Main", Some(TypeName::object())).with_method(main))
            .unwrap();

        let index = ReferenceIndex::build(&program);
        let sites = index.call_sites(&callee);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].index, 1);
        assert_eq!(sites[0].kind, ReferenceKind::Invoke(InvokeKind::Virtual));
        assert!(index.is_type_checked(&TypeName::new("a.B")));
        assert!(!index.is_type_checked(&TypeName::new("a.A")));
        assert_eq!(
            index.members_referenced_through(&TypeName::new("a.A")),
            &[Reference::Method(callee)]
        );
    }
}
