//! Class initializers with observable side effects.
//!
//! Merging coalesces class initialization: the merged class is initialized as soon as any
//! former member is first used, so every member's `<clinit>` may run earlier than before.
//! That is only invisible when the initializer, and everything it transitively runs,
//! does nothing observable. The scan below accepts:
//!
//! - constants, local variable traffic and stack shuffling
//! - stores into the class's own static fields
//! - reads of static fields and allocations, provided the classes they initialize are
//!   themselves free of observable initialization effects
//! - static and direct calls into program methods that satisfy the same rules, where
//!   constructors may also store into instance fields
//! - lambda `invokedynamic`
//!
//! Anything else (virtual dispatch, library calls other than `Object.<init>`, monitors,
//! throws, non-lambda `invokedynamic`) counts as observable.

use std::collections::BTreeSet;

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    program::{Instruction, InvokeKind, MethodRef, Program, TypeName},
    Result,
};

/// Rejects classes whose `<clinit>` may have observable side effects.
pub struct NoClassInitializerWithObservableSideEffects;

impl Policy for NoClassInitializerWithObservableSideEffects {
    fn name(&self) -> &'static str {
        "NoClassInitializerWithObservableSideEffects"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            class.class_initializer()?;
            let mut scan = EffectScan::new(ctx.program);
            scan.class_initializer(&class.name)
                .err()
                .map(|effect| format!("class initializer {effect}"))
        }))
    }
}

struct EffectScan<'a> {
    program: &'a Program,
    visited_methods: BTreeSet<MethodRef>,
    visited_classes: BTreeSet<TypeName>,
}

impl<'a> EffectScan<'a> {
    fn new(program: &'a Program) -> Self {
        EffectScan {
            program,
            visited_methods: BTreeSet::new(),
            visited_classes: BTreeSet::new(),
        }
    }

    /// Checks the initializer of `class` and of its program superclasses.
    fn class_initializer(&mut self, class: &TypeName) -> std::result::Result<(), String> {
        if !self.visited_classes.insert(class.clone()) {
            return Ok(());
        }
        let Some(id) = self.program.lookup(class) else {
            return Ok(());
        };
        let Some(def) = self.program.class(id) else {
            return Ok(());
        };
        if def.is_library() {
            return Ok(());
        }
        if let Some(super_type) = def.super_type.clone() {
            self.class_initializer(&super_type)?;
        }
        if let Some(clinit) = def.class_initializer() {
            let method = def.method_ref(clinit);
            self.method(&method, class)?;
        }
        Ok(())
    }

    fn method(&mut self, method: &MethodRef, owner: &TypeName) -> std::result::Result<(), String> {
        if !self.visited_methods.insert(method.clone()) {
            return Ok(());
        }
        let Some(def) = self.program.method(method) else {
            return Err(format!("calls unresolved {method}"));
        };
        let Some(code) = &def.code else {
            return Err(format!("calls {method} without code"));
        };
        let is_constructor = def.is_instance_initializer();

        for insn in &code.instructions {
            match insn {
                Instruction::PutStatic(field) => {
                    if &field.holder != owner {
                        return Err(format!("writes {field}"));
                    }
                }
                Instruction::PutField(field) => {
                    if !is_constructor {
                        return Err(format!("writes {field}"));
                    }
                }
                Instruction::GetStatic(field) => self.class_initializer(&field.holder)?,
                Instruction::NewInstance(ty) => self.class_initializer(ty)?,
                Instruction::Invoke { kind, method: callee } => {
                    self.invoke(*kind, callee, owner)?;
                }
                Instruction::InvokeDynamic { lambda: true, .. } => {}
                Instruction::InvokeDynamic { bootstrap, .. } => {
                    return Err(format!("uses invokedynamic {bootstrap}"));
                }
                Instruction::MonitorEnter | Instruction::MonitorExit => {
                    return Err("acquires a monitor".to_string());
                }
                Instruction::Throw => return Err("may throw".to_string()),
                _ => {}
            }
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        kind: InvokeKind,
        callee: &MethodRef,
        owner: &TypeName,
    ) -> std::result::Result<(), String> {
        if !self.program.is_program_class(&callee.holder) {
            if callee.holder.is_object() && callee.sig.is_instance_initializer() {
                return Ok(());
            }
            return Err(format!("calls library method {callee}"));
        }
        match kind {
            InvokeKind::Static => {
                self.class_initializer(&callee.holder)?;
                let resolved = self.resolve(callee)?;
                self.method(&resolved, owner)
            }
            InvokeKind::Direct | InvokeKind::Super => {
                let resolved = self.resolve(callee)?;
                self.method(&resolved, owner)
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                Err(format!("dispatches virtually to {callee}"))
            }
        }
    }

    fn resolve(&self, callee: &MethodRef) -> std::result::Result<MethodRef, String> {
        self.program
            .lookup_method(callee)
            .and_then(|(holder, _)| self.program.class(holder))
            .map(|class| MethodRef::from_sig(class.name.clone(), callee.sig.clone()))
            .ok_or_else(|| format!("calls unresolved {callee}"))
    }
}
