//! Class initializer merging.
//!
//! The merged `<clinit>` runs every member's initializer in group order. Each segment has
//! its labels shifted past the previous ones and its returns turned into jumps to the end
//! of the segment.

use crate::{
    merger::plan::MergeContext,
    program::{Code, ExceptionHandler, Instruction, Label, MethodAccessFlags, MethodDef, Proto, CLINIT},
    Result,
};

fn highest_label(code: &Code) -> Option<Label> {
    let mut highest = None;
    let mut see = |label: Label| highest = Some(highest.map_or(label, |h: Label| h.max(label)));
    for insn in &code.instructions {
        match insn {
            Instruction::Label(label) | Instruction::Goto(label) => see(*label),
            Instruction::Switch { cases, default } => {
                see(*default);
                cases.iter().for_each(|(_, label)| see(*label));
            }
            _ => {}
        }
    }
    for handler in &code.handlers {
        see(handler.start);
        see(handler.end);
        see(handler.handler);
    }
    highest
}

fn shift(insn: &Instruction, offset: Label, end: Label) -> Instruction {
    match insn {
        Instruction::Label(label) => Instruction::Label(label + offset),
        Instruction::Goto(label) => Instruction::Goto(label + offset),
        Instruction::Switch { cases, default } => Instruction::Switch {
            cases: cases.iter().map(|(key, label)| (*key, label + offset)).collect(),
            default: default + offset,
        },
        Instruction::Return => Instruction::Goto(end),
        other => other.clone(),
    }
}

/// Concatenates the class initializers of all members, target first.
///
/// Returns `None` when no member has one.
pub(crate) fn merge(ctx: &MergeContext<'_>) -> Result<Option<MethodDef>> {
    let bodies: Vec<(&MethodDef, &Code)> = ctx
        .members
        .iter()
        .filter_map(|m| m.class_initializer())
        .filter_map(|m| m.code.as_ref().map(|code| (m, code)))
        .collect();
    match bodies.as_slice() {
        [] => return Ok(None),
        [(single, _)] if ctx.target().class_initializer().is_some() => {
            let mut kept = (*single).clone();
            kept.holder = ctx.target_id;
            return Ok(Some(kept));
        }
        _ => {}
    }

    let mut merged = Code::default();
    let mut offset: Label = 0;
    for (_, code) in &bodies {
        let end = highest_label(code).map_or(0, |h| h + 1) + offset;
        merged
            .instructions
            .extend(code.instructions.iter().map(|insn| shift(insn, offset, end)));
        merged.instructions.push(Instruction::Label(end));
        merged.handlers.extend(code.handlers.iter().map(|h| ExceptionHandler {
            start: h.start + offset,
            end: h.end + offset,
            handler: h.handler + offset,
            catch_type: h.catch_type.clone(),
        }));
        merged.locals.extend(code.locals.iter().cloned());
        merged.max_locals = merged.max_locals.max(code.max_locals);
        offset = end + 1;
    }
    merged.instructions.push(Instruction::Return);

    let mut initializer = MethodDef::new(CLINIT, Proto::void(Vec::new()), MethodAccessFlags::STATIC, Some(merged));
    initializer.holder = ctx.target_id;
    initializer.synthesized = bodies.len() > 1;
    initializer.original = ctx.target_method(initializer.sig.clone());
    log::trace!(
        "merged {} class initializers into {}",
        bodies.len(),
        ctx.target_name()
    );
    Ok(Some(initializer))
}
