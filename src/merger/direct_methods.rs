//! Relocation of static and private instance methods.
//!
//! Direct methods never take part in virtual dispatch, so they move as they are. A source
//! method whose signature is already taken in the merged class gets a `$n` suffix.

use crate::{
    merger::plan::MergeContext,
    program::{MethodDef, MethodSig},
    Result,
};

fn is_relocated(method: &MethodDef) -> bool {
    method.is_direct() && !method.is_instance_initializer() && !method.is_class_initializer()
}

/// Moves every direct method of the group into the merged class.
///
/// The target keeps its own methods unchanged; sources follow in group order.
pub(crate) fn relocate(ctx: &mut MergeContext<'_>) -> Result<Vec<MethodDef>> {
    let mut methods = Vec::new();
    let members = ctx.members.clone();
    for (index, member) in members.iter().enumerate() {
        for method in member.methods.iter().filter(|m| is_relocated(m)) {
            let mut moved = method.clone();
            moved.holder = ctx.target_id;
            if index == 0 {
                methods.push(moved);
                continue;
            }

            let sig: MethodSig = ctx.claim_method(&method.sig.name, &method.sig.proto);
            let from = member.method_ref(method);
            let to = ctx.target_method(sig.clone());
            if sig != method.sig {
                log::trace!("renaming {from} to {to}");
                ctx.lens.record_original(to.clone(), from.clone());
            }
            ctx.lens.map_method(from.clone(), to.clone())?;
            ctx.method_map.insert(from, to);
            moved.sig = sig;
            methods.push(moved);
        }
    }
    Ok(methods)
}
