//! Classes with native methods.

use crate::{
    policy::{reject_classes, MergeGroup, Policy, PolicyContext},
    Result,
};

/// Rejects classes declaring `native` methods, which the runtime binds by the class's
/// original binary name.
pub struct NoNativeMethods;

impl Policy for NoNativeMethods {
    fn name(&self) -> &'static str {
        "NoNativeMethods"
    }

    fn refine(&self, groups: Vec<MergeGroup>, ctx: &PolicyContext<'_>) -> Result<Vec<MergeGroup>> {
        Ok(reject_classes(self.name(), groups, ctx, |_, class| {
            class
                .methods
                .iter()
                .find(|m| m.is_native())
                .map(|m| format!("declares native method {}", m.sig))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::MergerConfig,
        program::{MethodAccessFlags, MethodDef, Proto, TypeName, TypeRef},
        test::{apply_policy, builder::ClassBuilder, builder::ProgramBuilder},
    };

    #[test]
    fn test_native_method_rejects_class() {
        let native = MethodDef::new(
            "nativeHash",
            Proto::new(vec![], TypeRef::Int),
            MethodAccessFlags::PUBLIC | MethodAccessFlags::NATIVE,
            None,
        );
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").build())
            .class(ClassBuilder::new("a.B").method(native).build())
            .class(ClassBuilder::new("a.C").build())
            .build();

        let (groups, log) = apply_policy(&program, &MergerConfig::default(), &NoNativeMethods);
        assert_eq!(groups, vec![vec!["a.A", "a.C"]]);
        let message = log
            .rejected_by("NoNativeMethods")
            .find(|d| d.classes.contains(&TypeName::new("a.B")))
            .map(|d| d.message.clone());
        assert_eq!(message.as_deref(), Some("declares native method nativeHash()int"));
    }
}
