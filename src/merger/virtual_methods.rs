//! Virtual method merging.
//!
//! Every virtual signature declared by some member ends up as one method of the merged
//! class. When at most one member provides a body and nothing is inherited, that body is
//! simply moved. Otherwise each body is moved to a private method and a bridge under the
//! original signature dispatches on the class id, falling back to the superclass method
//! (or a throw) for members that never declared one.

use crate::{
    merger::{
        plan::{private_flags, widest_visibility, MergeContext},
        synthesize::{forward_arguments, return_for, switch_dispatch},
    },
    program::{
        Code, FieldRef, Instruction, InvokeKind, MethodAccessFlags, MethodDef, MethodRef, MethodSig,
    },
    Result,
};

struct VirtualEntry<'a> {
    sig: MethodSig,
    /// Member index and declaration, in group order
    declarations: Vec<(usize, &'a MethodDef)>,
    /// Concrete method the superclass chain provides
    super_method: Option<MethodRef>,
}

impl<'a> VirtualEntry<'a> {
    fn concrete(&self) -> impl Iterator<Item = &(usize, &'a MethodDef)> {
        self.declarations.iter().filter(|(_, m)| !m.is_abstract())
    }

    fn is_trivial(&self, members: usize) -> bool {
        let concrete = self.concrete().count();
        (concrete <= 1 && self.super_method.is_none())
            || (concrete == 0 && self.declarations.len() == members)
    }
}

/// How each virtual signature of a group is merged.
pub(crate) struct VirtualPlan<'a> {
    entries: Vec<VirtualEntry<'a>>,
    members: usize,
}

impl<'a> VirtualPlan<'a> {
    /// Collects the virtual declarations of every member, in order of first appearance.
    pub fn analyze(ctx: &MergeContext<'a>) -> Self {
        let mut entries: Vec<VirtualEntry<'a>> = Vec::new();
        for (index, member) in ctx.members.iter().enumerate() {
            for method in member.virtual_methods() {
                match entries.iter_mut().find(|e| e.sig == method.sig) {
                    Some(entry) => entry.declarations.push((index, method)),
                    None => entries.push(VirtualEntry {
                        sig: method.sig.clone(),
                        declarations: vec![(index, method)],
                        super_method: None,
                    }),
                }
            }
        }

        if let Some(super_type) = &ctx.target().super_type {
            for entry in &mut entries {
                entry.super_method = ctx
                    .config
                    .resolver
                    .resolve_virtual(ctx.program, super_type, &entry.sig)
                    .single()
                    .filter(|m| ctx.program.method(m).is_some_and(|d| !d.is_abstract()))
                    .cloned();
            }
        }

        VirtualPlan {
            entries,
            members: ctx.members.len(),
        }
    }

    /// Returns true if some signature needs a dispatching bridge.
    pub fn needs_class_id(&self) -> bool {
        self.entries.iter().any(|e| !e.is_trivial(self.members))
    }

    /// Emits the merged virtual methods and their lens entries.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if a bridge is needed but no class id field exists, or on
    /// conflicting lens entries.
    pub fn emit(self, ctx: &mut MergeContext<'a>, class_id: Option<&FieldRef>) -> Result<Vec<MethodDef>> {
        let mut methods = Vec::new();
        for entry in &self.entries {
            if entry.is_trivial(self.members) {
                methods.push(emit_moved(ctx, entry)?);
                continue;
            }
            let Some(class_id) = class_id else {
                return Err(invariant_error!(
                    "bridge for {} needs a class id field",
                    ctx.target_method(entry.sig.clone())
                ));
            };
            methods.extend(emit_bridge(ctx, entry, class_id)?);
        }
        Ok(methods)
    }
}

fn map_sources(ctx: &mut MergeContext<'_>, entry: &VirtualEntry<'_>) -> Result<()> {
    let to = ctx.target_method(entry.sig.clone());
    for (index, declaration) in &entry.declarations {
        if *index == 0 {
            continue;
        }
        let from = ctx.members[*index].method_ref(declaration);
        ctx.lens.map_method(from, to.clone())?;
    }
    Ok(())
}

fn emit_moved(ctx: &mut MergeContext<'_>, entry: &VirtualEntry<'_>) -> Result<MethodDef> {
    let (_, kept) = entry
        .concrete()
        .next()
        .or_else(|| entry.declarations.first())
        .ok_or_else(|| invariant_error!("virtual signature {} without declarations", entry.sig))?;

    let mut method = (*kept).clone();
    method.holder = ctx.target_id;
    method.flags = method
        .flags
        .with_visibility(widest_visibility(entry.declarations.iter().map(|(_, m)| *m)));
    if entry.concrete().next().is_some() {
        method.flags.remove(MethodAccessFlags::ABSTRACT);
    }
    map_sources(ctx, entry)?;
    Ok(method)
}

fn emit_bridge(
    ctx: &mut MergeContext<'_>,
    entry: &VirtualEntry<'_>,
    class_id: &FieldRef,
) -> Result<Vec<MethodDef>> {
    let members = ctx.members.len();
    let all_declare = entry.declarations.len() == members;
    let synchronized = all_declare && entry.declarations.iter().all(|(_, m)| m.is_synchronized() && !m.is_abstract());
    let final_ = all_declare && entry.declarations.iter().all(|(_, m)| m.is_final());

    let proto = entry.sig.proto.clone();
    let mut methods = Vec::new();
    let mut arms = Vec::new();
    for (index, declaration) in entry.concrete() {
        let member = ctx.members[*index];
        let base = format!("{}${}", entry.sig.name, member.name.simple_name());
        let moved_sig = ctx.claim_method(&base, &proto);
        let moved_ref = ctx.target_method(moved_sig.clone());

        let mut moved = (*declaration).clone();
        moved.sig = moved_sig;
        moved.holder = ctx.target_id;
        moved.flags = private_flags(moved.flags) - MethodAccessFlags::FINAL;
        if synchronized {
            moved.flags.remove(MethodAccessFlags::SYNCHRONIZED);
        }
        moved.synthesized = true;
        moved.pinned = false;
        ctx.lens.record_original(moved_ref.clone(), member.method_ref(declaration));
        methods.push(moved);

        let mut arm = vec![Instruction::Load(0)];
        arm.extend(forward_arguments(&proto, 1, &proto));
        arm.push(Instruction::Invoke {
            kind: InvokeKind::Direct,
            method: moved_ref,
        });
        arm.push(return_for(&proto.ret));
        arms.push((vec![MergeContext::class_id(*index)], arm));
    }

    let default = match &entry.super_method {
        Some(super_method) => {
            let mut code = vec![Instruction::Load(0)];
            code.extend(forward_arguments(&proto, 1, &super_method.sig.proto));
            code.push(Instruction::Invoke {
                kind: InvokeKind::Super,
                method: super_method.clone(),
            });
            code.push(return_for(&proto.ret));
            code
        }
        None => vec![Instruction::ConstNull, Instruction::Throw],
    };
    let code = switch_dispatch(
        vec![Instruction::Load(0), Instruction::GetField(class_id.clone())],
        arms,
        default,
    );

    let visibility = widest_visibility(entry.declarations.iter().map(|(_, m)| *m));
    let mut flags = (MethodAccessFlags::empty().with_visibility(visibility)) | MethodAccessFlags::SYNTHETIC;
    if final_ {
        flags |= MethodAccessFlags::FINAL;
    }
    if synchronized {
        flags |= MethodAccessFlags::SYNCHRONIZED;
    }
    let mut bridge = MethodDef::new(&entry.sig.name, proto, flags, Some(Code::new(code)));
    bridge.holder = ctx.target_id;
    bridge.synthesized = true;
    bridge.pinned = entry.declarations.iter().any(|(_, m)| m.pinned);
    bridge.original = ctx.target_method(entry.sig.clone());
    if let Some((_, first)) = entry.declarations.first() {
        bridge.annotations = first.annotations.clone();
    }
    log::trace!(
        "bridging {} over {} bodies",
        bridge.original,
        entry.concrete().count()
    );
    methods.push(bridge);

    map_sources(ctx, entry)?;
    Ok(methods)
}
