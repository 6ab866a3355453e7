//! Static tracing of class-initializer lock acquisitions.

use std::collections::BTreeSet;

use crate::program::{
    ClassId, FieldRef, Instruction, InvokeKind, MethodRef, Program, Resolution, Resolver,
    SubtypeIndex, TypeName,
};

/// Why a class initializer could not be traced.
pub type Untraceable = String;

/// Computes, for one class, the classes whose initialization its `<clinit>` may start
/// while still holding its own initialization lock.
///
/// The trace follows static, direct and super invokes, and virtual invokes that resolve
/// to an effectively final method. Interface invokes, other virtual invokes and
/// non-lambda `invokedynamic` make the trace fail, which callers must treat as "may reach
/// anything".
pub struct InitializationTracer<'a> {
    program: &'a Program,
    resolver: &'a dyn Resolver,
    subtypes: &'a SubtypeIndex,
}

impl<'a> InitializationTracer<'a> {
    /// Creates a tracer.
    pub fn new(program: &'a Program, resolver: &'a dyn Resolver, subtypes: &'a SubtypeIndex) -> Self {
        InitializationTracer {
            program,
            resolver,
            subtypes,
        }
    }

    /// Classes directly triggered by initializing `class`: its superclasses, plus every
    /// class its `<clinit>` (and the methods it calls) allocates, touches statically or
    /// calls statically.
    ///
    /// Classes triggered only by nested initializers are not included; the caller closes
    /// over the relation.
    ///
    /// # Errors
    ///
    /// Returns the reason if the initializer performs a call the tracer cannot follow.
    pub fn direct_triggers(&self, class: ClassId) -> std::result::Result<BTreeSet<ClassId>, Untraceable> {
        let mut triggered = BTreeSet::new();
        if let Some(super_id) = self.program.superclass(class) {
            self.trigger(super_id, &mut triggered);
        }
        let Some(def) = self.program.class(class) else {
            return Ok(triggered);
        };
        let Some(clinit) = def.class_initializer() else {
            return Ok(triggered);
        };

        let mut visited: BTreeSet<MethodRef> = BTreeSet::new();
        let mut worklist = vec![def.method_ref(clinit)];
        while let Some(method) = worklist.pop() {
            if !visited.insert(method.clone()) {
                continue;
            }
            let Some(code) = self.program.method(&method).and_then(|m| m.code.as_ref()) else {
                continue;
            };
            for insn in &code.instructions {
                match insn {
                    Instruction::NewInstance(ty) => self.trigger_name(ty, &mut triggered),
                    Instruction::GetStatic(field) | Instruction::PutStatic(field) => {
                        self.trigger_field(field, &mut triggered);
                    }
                    Instruction::Invoke { kind, method: callee } => {
                        if let Some(next) = self.follow(*kind, callee, &mut triggered)? {
                            worklist.push(next);
                        }
                    }
                    Instruction::InvokeDynamic { lambda: false, bootstrap } => {
                        return Err(format!("non-lambda invokedynamic {bootstrap}"));
                    }
                    _ => {}
                }
            }
        }
        triggered.remove(&class);
        Ok(triggered)
    }

    fn follow(
        &self,
        kind: InvokeKind,
        callee: &MethodRef,
        triggered: &mut BTreeSet<ClassId>,
    ) -> std::result::Result<Option<MethodRef>, Untraceable> {
        if !self.program.is_program_class(&callee.holder) {
            return Ok(None);
        }
        match kind {
            InvokeKind::Static => {
                let resolved = self.resolve(callee);
                if let Some(method) = &resolved {
                    self.trigger_name(&method.holder, triggered);
                }
                Ok(resolved)
            }
            InvokeKind::Direct | InvokeKind::Super => Ok(self.resolve(callee)),
            InvokeKind::Virtual => {
                match self
                    .resolver
                    .resolve_virtual(self.program, &callee.holder, &callee.sig)
                {
                    Resolution::Single(target) if self.is_effectively_final(&target) => {
                        Ok(Some(target))
                    }
                    _ => Err(format!("virtual call to {callee}")),
                }
            }
            InvokeKind::Interface => Err(format!("interface call to {callee}")),
        }
    }

    fn resolve(&self, method: &MethodRef) -> Option<MethodRef> {
        let (holder, def) = self.program.lookup_method(method)?;
        let class = self.program.class(holder)?;
        Some(class.method_ref(def))
    }

    fn is_effectively_final(&self, method: &MethodRef) -> bool {
        let Some(class) = self.program.class_by_name(&method.holder) else {
            return false;
        };
        if class.is_interface() {
            return false;
        }
        if class.is_final() || class.method(&method.sig).is_some_and(|m| m.is_final()) {
            return true;
        }
        !self.subtypes.all_subtypes(&method.holder).iter().any(|sub| {
            self.program
                .class_by_name(sub)
                .is_some_and(|c| c.has_method(&method.sig))
        })
    }

    fn trigger_field(&self, field: &FieldRef, triggered: &mut BTreeSet<ClassId>) {
        match self.program.resolve_field(field) {
            Some((holder, _)) => self.trigger(holder, triggered),
            None => self.trigger_name(&field.holder, triggered),
        }
    }

    fn trigger_name(&self, name: &TypeName, triggered: &mut BTreeSet<ClassId>) {
        if let Some(id) = self.program.lookup(name) {
            self.trigger(id, triggered);
        }
    }

    fn trigger(&self, class: ClassId, triggered: &mut BTreeSet<ClassId>) {
        if self.program.class(class).is_some_and(|c| !c.is_library()) {
            triggered.insert(class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        program::{FieldAccessFlags, HierarchyResolver, Proto, TypeRef},
        test::builder::{new_instance, ClassBuilder, ProgramBuilder},
    };

    #[test]
    fn test_direct_triggers() {
        let mut clinit = new_instance("a.B", vec![], vec![]);
        clinit.extend([
            Instruction::Pop,
            Instruction::GetStatic(FieldRef::new(TypeName::new("a.C"), "X", TypeRef::Int)),
            Instruction::Pop,
            Instruction::Return,
        ]);
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").class_initializer(clinit).build())
            .class(ClassBuilder::new("a.B").default_constructor().build())
            .class(
                ClassBuilder::new("a.C")
                    .field("X", TypeRef::Int, FieldAccessFlags::STATIC)
                    .build(),
            )
            .build();
        let subtypes = SubtypeIndex::build(&program);
        let resolver = HierarchyResolver;
        let tracer = InitializationTracer::new(&program, &resolver, &subtypes);

        let a = program.lookup(&"a.A".into()).unwrap();
        let b = program.lookup(&"a.B".into()).unwrap();
        let c = program.lookup(&"a.C".into()).unwrap();
        let triggers = tracer.direct_triggers(a).unwrap();
        assert_eq!(triggers, [b, c].into_iter().collect());
        assert!(tracer.direct_triggers(b).unwrap().is_empty());
    }

    #[test]
    fn test_interface_call_is_untraceable() {
        let clinit = vec![
            Instruction::ConstNull,
            Instruction::Invoke {
                kind: InvokeKind::Interface,
                method: MethodRef::new(TypeName::new("a.I"), "run", Proto::void(vec![])),
            },
            Instruction::Return,
        ];
        let program = ProgramBuilder::new()
            .class(
                ClassBuilder::interface("a.I")
                    .abstract_method("run", Proto::void(vec![]))
                    .build(),
            )
            .class(ClassBuilder::new("a.A").class_initializer(clinit).build())
            .build();
        let subtypes = SubtypeIndex::build(&program);
        let resolver = HierarchyResolver;
        let tracer = InitializationTracer::new(&program, &resolver, &subtypes);
        let a = program.lookup(&"a.A".into()).unwrap();
        assert!(tracer.direct_triggers(a).is_err());
    }
}
