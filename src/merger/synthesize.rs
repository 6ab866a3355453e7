//! Building blocks for synthesized code and collision-free names.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::{
    lens::ExtraParameter,
    program::{
        Code, Instruction, InvokeKind, Label, MethodRef, MethodSig, Proto, TypeName, TypeRef, INIT,
    },
};

/// Converts a parameter position into a local slot, saturating on absurd arities.
pub(crate) fn slot(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

/// Loads the arguments of a method declared with `proto`, whose first parameter lives in
/// local `first`, to pass them to a callee declared with `callee`.
///
/// Reference arguments whose declared type differs from the callee's get a `checkcast`.
pub(crate) fn forward_arguments(proto: &Proto, first: u16, callee: &Proto) -> Vec<Instruction> {
    let mut code = Vec::with_capacity(proto.params.len());
    for (index, (have, want)) in proto.params.iter().zip(&callee.params).enumerate() {
        code.push(Instruction::Load(first.saturating_add(slot(index))));
        if have != want && want.is_reference() && *want != TypeRef::object() {
            code.push(Instruction::CheckCast(want.clone()));
        }
    }
    code
}

/// The return instruction matching `ret`.
pub(crate) fn return_for(ret: &TypeRef) -> Instruction {
    if *ret == TypeRef::Void {
        Instruction::Return
    } else {
        Instruction::ReturnValue
    }
}

/// Emits a switch over the key pushed by `key`.
///
/// Each arm lists the keys that select it; `default` runs when no arm matches. Every arm
/// and the default must end in a return or throw.
pub(crate) fn switch_dispatch(
    key: Vec<Instruction>,
    arms: Vec<(Vec<i32>, Vec<Instruction>)>,
    default: Vec<Instruction>,
) -> Vec<Instruction> {
    let default_label = Label::try_from(arms.len()).unwrap_or(Label::MAX);
    let mut cases = Vec::new();
    for (index, (keys, _)) in arms.iter().enumerate() {
        let label = Label::try_from(index).unwrap_or(Label::MAX);
        cases.extend(keys.iter().map(|k| (*k, label)));
    }
    cases.sort_unstable();

    let mut code = key;
    code.push(Instruction::Switch {
        cases,
        default: default_label,
    });
    for (index, (_, body)) in arms.into_iter().enumerate() {
        code.push(Instruction::Label(Label::try_from(index).unwrap_or(Label::MAX)));
        code.extend(body);
    }
    code.push(Instruction::Label(default_label));
    code.extend(default);
    code
}

/// Finds the invoke that initializes the receiver of a constructor body: the first
/// `invokespecial <init>` not consumed by a preceding `new`.
pub(crate) fn receiver_initializer(code: &Code) -> Option<(usize, &MethodRef)> {
    let mut pending = 0usize;
    for (index, insn) in code.instructions.iter().enumerate() {
        match insn {
            Instruction::NewInstance(_) => pending += 1,
            Instruction::Invoke {
                kind: InvokeKind::Direct,
                method,
            } if method.sig.is_instance_initializer() => {
                if pending == 0 {
                    return Some((index, method));
                }
                pending -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Returns true if a constructor of `class` delegates to another constructor of `class`.
pub(crate) fn delegates_to_own_constructor(code: &Code, class: &TypeName) -> bool {
    receiver_initializer(code).is_some_and(|(_, method)| &method.holder == class)
}

/// Constructor parameters with every reference type relaxed to `java.lang.Object`.
pub(crate) fn relaxed_params(proto: &Proto) -> Vec<TypeRef> {
    proto
        .params
        .iter()
        .map(|p| if p.is_reference() { TypeRef::object() } else { p.clone() })
        .collect()
}

/// Picks `base`, or the first of `base$1`, `base$2`, ... for which `taken` is false.
pub(crate) fn fresh_name<F>(base: &str, taken: F) -> Arc<str>
where
    F: Fn(&str) -> bool,
{
    if !taken(base) {
        return Arc::from(base);
    }
    let mut counter = 1usize;
    loop {
        let candidate = format!("{base}${counter}");
        if !taken(&candidate) {
            return Arc::from(candidate);
        }
        counter += 1;
    }
}

/// Picks a method signature named after `base` that is neither in `taken` nor in
/// `reserved`, and claims it in `taken`.
pub(crate) fn claim_method_sig(
    base: &str,
    proto: &Proto,
    taken: &mut FxHashSet<MethodSig>,
    reserved: &FxHashSet<MethodSig>,
) -> MethodSig {
    let name = fresh_name(base, |candidate| {
        let sig = MethodSig::new(candidate, proto.clone());
        taken.contains(&sig) || reserved.contains(&sig)
    });
    let sig = MethodSig {
        name,
        proto: proto.clone(),
    };
    taken.insert(sig.clone());
    sig
}

/// Claims a constructor signature for `proto`, appending unused parameters of the `marker`
/// type until it no longer collides.
///
/// Returns the signature and the arguments call sites must append.
pub(crate) fn claim_constructor(
    proto: Proto,
    taken: &mut FxHashSet<MethodSig>,
    marker: &TypeName,
) -> (MethodSig, Vec<ExtraParameter>) {
    let mut sig = MethodSig::new(INIT, proto);
    let mut extra = Vec::new();
    while taken.contains(&sig) {
        sig = sig.with_proto(sig.proto.with_appended(TypeRef::Class(marker.clone())));
        extra.push(ExtraParameter::UnusedNull(marker.clone()));
    }
    taken.insert(sig.clone());
    (sig, extra)
}
