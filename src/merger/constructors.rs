//! Constructor merging.
//!
//! Constructors of all members are bucketed by their parameter list with reference types
//! relaxed to `Object`; the n-th such constructor of each member lands in the n-th bucket.
//! A bucket whose constructors are identical after merging becomes one constructor.
//!
//! When any bucket differs, or a virtual bridge needs the class id, every constructor
//! that can create a former source instance is rebuilt around an entry point:
//!
//! ```text
//! <init>(lub params..., int id) {
//!     this.$classId = id;
//!     switch (id) { case ..: this.$init$B(params...); return; ... }
//! }
//! ```
//!
//! The original bodies move to private `$init$<Simple>` methods. Constructors only the
//! target has stay as they are and leave the class id at 0.

use rustc_hash::FxHashMap;

use crate::{
    lens::{ExtraParameter, MethodLookup},
    merger::{
        plan::{private_flags, widest_visibility, MergeContext},
        synthesize::{
            delegates_to_own_constructor, forward_arguments, receiver_initializer, relaxed_params,
            slot, switch_dispatch,
        },
    },
    program::{
        Code, FieldRef, Instruction, InvokeKind, MethodAccessFlags, MethodDef, MethodSig, Proto,
        TypeName, TypeRef, INIT,
    },
    Result,
};

struct Bucket<'a> {
    params: Vec<TypeRef>,
    occurrence: usize,
    entries: Vec<(usize, &'a MethodDef)>,
    /// Element-wise least upper bound of the members' parameters
    proto: Proto,
    shared: bool,
}

impl Bucket<'_> {
    fn target_only(&self) -> bool {
        self.entries.iter().all(|(index, _)| *index == 0)
    }
}

/// A set of constructors that share one moved body.
struct BodyGroup<'a> {
    entries: Vec<(usize, &'a MethodDef)>,
    moved: MethodSig,
}

/// How the constructors of a group are merged.
pub(crate) struct ConstructorPlan<'a> {
    buckets: Vec<Bucket<'a>>,
}

impl<'a> ConstructorPlan<'a> {
    /// Buckets the constructors of every member and decides which buckets can be shared.
    ///
    /// # Errors
    ///
    /// Returns a structural incompatibility if two bucketed constructors have parameters
    /// without a common supertype.
    pub fn analyze(ctx: &MergeContext<'a>) -> Result<Self> {
        let mut buckets: Vec<Bucket<'a>> = Vec::new();
        for (index, member) in ctx.members.iter().enumerate() {
            let mut occurrences: FxHashMap<Vec<TypeRef>, usize> = FxHashMap::default();
            for constructor in member.constructors() {
                let params = relaxed_params(&constructor.sig.proto);
                let counter = occurrences.entry(params.clone()).or_insert(0);
                let occurrence = *counter;
                *counter += 1;

                match buckets
                    .iter_mut()
                    .find(|b| b.params == params && b.occurrence == occurrence)
                {
                    Some(bucket) => bucket.entries.push((index, constructor)),
                    None => buckets.push(Bucket {
                        params,
                        occurrence,
                        entries: vec![(index, constructor)],
                        proto: Proto::void(Vec::new()),
                        shared: true,
                    }),
                }
            }
        }

        for bucket in &mut buckets {
            bucket.proto = bucket_proto(ctx, &bucket.entries)?;
            bucket.shared = is_shared(ctx, &bucket.entries);
        }
        Ok(ConstructorPlan { buckets })
    }

    /// Returns true if instances must record which member they were created as.
    pub fn needs_class_id(&self) -> bool {
        self.buckets.iter().any(|b| !b.shared)
    }

    /// Emits the merged constructors, and moved bodies when dispatching.
    ///
    /// # Errors
    ///
    /// Returns an invariant error on conflicting lens entries.
    pub fn emit(self, ctx: &mut MergeContext<'a>, class_id: Option<&FieldRef>) -> Result<Vec<MethodDef>> {
        match class_id {
            None if self.needs_class_id() => Err(invariant_error!(
                "constructors of {} need a class id field",
                ctx.target_name()
            )),
            None => self.emit_shared(ctx),
            Some(field) => self.emit_dispatching(ctx, field),
        }
    }

    fn emit_shared(self, ctx: &mut MergeContext<'a>) -> Result<Vec<MethodDef>> {
        let mut methods = Vec::with_capacity(self.buckets.len());
        for bucket in &self.buckets {
            let (rep_index, representative) = bucket
                .entries
                .iter()
                .find(|(index, _)| *index == 0)
                .or_else(|| bucket.entries.first())
                .copied()
                .ok_or_else(|| invariant_error!("empty constructor bucket"))?;

            let (sig, extra) = ctx.claim_constructor(representative.sig.proto.clone());
            let to = ctx.target_method(sig.clone());
            let mut method = representative.clone();
            method.sig = sig;
            method.holder = ctx.target_id;
            method.flags = method
                .flags
                .with_visibility(widest_visibility(bucket.entries.iter().map(|(_, m)| *m)));
            if rep_index != 0 {
                ctx.lens
                    .record_original(to.clone(), ctx.members[rep_index].method_ref(representative));
            }
            for (index, constructor) in &bucket.entries {
                let from = ctx.members[*index].method_ref(constructor);
                ctx.lens
                    .map_method_with(from, MethodLookup::with_extra(to.clone(), extra.clone()))?;
            }
            methods.push(method);
        }
        Ok(methods)
    }

    fn emit_dispatching(self, ctx: &mut MergeContext<'a>, class_id: &FieldRef) -> Result<Vec<MethodDef>> {
        let mut methods = Vec::new();
        // (member, original signature) to the method that now runs that constructor body
        let mut implementations: FxHashMap<(usize, MethodSig), MethodLookup> = FxHashMap::default();

        for bucket in self.buckets.iter().filter(|b| b.target_only()) {
            for (_, constructor) in &bucket.entries {
                let (sig, extra) = ctx.claim_constructor(constructor.sig.proto.clone());
                let to = ctx.target_method(sig.clone());
                let from = ctx.target().method_ref(constructor);
                ctx.lens
                    .map_method_with(from, MethodLookup::with_extra(to.clone(), extra.clone()))?;
                implementations.insert((0, constructor.sig.clone()), MethodLookup::with_extra(to, extra));

                let mut kept = (*constructor).clone();
                kept.sig = sig;
                kept.holder = ctx.target_id;
                methods.push(kept);
            }
        }

        let mut planned: Vec<(&Bucket<'a>, Vec<BodyGroup<'a>>)> = Vec::new();
        for bucket in self.buckets.iter().filter(|b| !b.target_only()) {
            let groups = group_bodies(ctx, &bucket.entries)?;
            for group in &groups {
                for (index, constructor) in &group.entries {
                    implementations.insert(
                        (*index, constructor.sig.clone()),
                        MethodLookup::unchanged(ctx.target_method(group.moved.clone())),
                    );
                }
            }
            planned.push((bucket, groups));
        }

        for (bucket, groups) in planned {
            for group in &groups {
                let (index, body) = group.entries[0];
                let member = ctx.members[index];
                let mut moved = body.clone();
                moved.sig = group.moved.clone();
                moved.holder = ctx.target_id;
                moved.flags = private_flags(body.flags);
                moved.synthesized = true;
                moved.pinned = false;
                moved.code = body
                    .code
                    .as_ref()
                    .map(|code| redirect_delegation(code, index, &member.name, &implementations));
                let moved_ref = ctx.target_method(group.moved.clone());
                ctx.lens.record_original(moved_ref, member.method_ref(body));
                methods.push(moved);
            }
            methods.push(emit_entry(ctx, bucket, &groups, class_id)?);
        }
        Ok(methods)
    }
}

fn bucket_proto(ctx: &MergeContext<'_>, entries: &[(usize, &MethodDef)]) -> Result<Proto> {
    let Some((_, first)) = entries.first() else {
        return Err(invariant_error!("empty constructor bucket"));
    };
    let mut params: Vec<TypeRef> = first
        .sig
        .proto
        .params
        .iter()
        .map(|p| ctx.map_group_type(p))
        .collect();
    for (index, constructor) in &entries[1..] {
        for (current, param) in params.iter_mut().zip(&constructor.sig.proto.params) {
            let other = ctx.map_group_type(param);
            if *current == other {
                continue;
            }
            *current = ctx.program.least_upper_bound(current, &other).ok_or_else(|| {
                incompatible!(
                    ctx.members[*index].name,
                    "constructor {} has no common parameter types with {}",
                    constructor.sig,
                    first.sig
                )
            })?;
        }
    }
    Ok(Proto::void(params))
}

fn is_shared(ctx: &MergeContext<'_>, entries: &[(usize, &MethodDef)]) -> bool {
    let [(_, first), rest @ ..] = entries else {
        return true;
    };
    if rest.is_empty() {
        return true;
    }
    let body = |m: &MethodDef| m.code.as_ref().map(|c| ctx.normalize(c)).unwrap_or_default();
    let first_body = body(*first);
    entries.iter().all(|(index, m)| {
        m.sig.proto == first.sig.proto
            && !m
                .code
                .as_ref()
                .is_some_and(|c| delegates_to_own_constructor(c, &ctx.members[*index].name))
    }) && rest.iter().all(|(_, m)| body(*m) == first_body)
}

/// Splits a bucket into sets of constructors with equivalent bodies and claims a moved
/// method for each.
fn group_bodies<'a>(
    ctx: &mut MergeContext<'a>,
    entries: &[(usize, &'a MethodDef)],
) -> Result<Vec<BodyGroup<'a>>> {
    let mut keyed: Vec<(Option<(Proto, Vec<Instruction>)>, Vec<(usize, &'a MethodDef)>)> = Vec::new();
    for (index, constructor) in entries {
        let member = ctx.members[*index];
        let code = constructor
            .code
            .as_ref()
            .ok_or_else(|| invariant_error!("constructor {} has no code", member.method_ref(constructor)))?;
        let key = if delegates_to_own_constructor(code, &member.name) {
            None
        } else {
            Some((constructor.sig.proto.clone(), ctx.normalize(code)))
        };
        match keyed.iter_mut().find(|(k, _)| key.is_some() && *k == key) {
            Some((_, group)) => group.push((*index, *constructor)),
            None => keyed.push((key, vec![(*index, *constructor)])),
        }
    }

    let mut groups = Vec::with_capacity(keyed.len());
    for (_, members) in keyed {
        let (index, constructor) = members[0];
        let base = format!("$init${}", ctx.members[index].name.simple_name());
        let moved = ctx.claim_method(&base, &constructor.sig.proto);
        groups.push(BodyGroup { entries: members, moved });
    }
    Ok(groups)
}

/// Points a `this(...)` call at the method that now holds the delegate's body.
fn redirect_delegation(
    code: &Code,
    member: usize,
    class: &TypeName,
    implementations: &FxHashMap<(usize, MethodSig), MethodLookup>,
) -> Code {
    let mut code = code.clone();
    let Some((position, delegate)) = receiver_initializer(&code)
        .filter(|(_, method)| &method.holder == class)
        .map(|(position, method)| (position, method.sig.clone()))
    else {
        return code;
    };
    let Some(target) = implementations.get(&(member, delegate)) else {
        return code;
    };
    let mut replacement: Vec<Instruction> = target.extra.iter().map(ExtraParameter::push_instruction).collect();
    replacement.push(Instruction::Invoke {
        kind: InvokeKind::Direct,
        method: target.method.clone(),
    });
    code.instructions.splice(position..=position, replacement);
    code
}

fn call_body(ctx: &MergeContext<'_>, proto: &Proto, group: &BodyGroup<'_>) -> Vec<Instruction> {
    let mut code = vec![Instruction::Load(0)];
    code.extend(forward_arguments(proto, 1, &group.moved.proto));
    code.push(Instruction::Invoke {
        kind: InvokeKind::Direct,
        method: ctx.target_method(group.moved.clone()),
    });
    code.push(Instruction::Return);
    code
}

fn emit_entry(
    ctx: &mut MergeContext<'_>,
    bucket: &Bucket<'_>,
    groups: &[BodyGroup<'_>],
    class_id: &FieldRef,
) -> Result<MethodDef> {
    let proto = &bucket.proto;
    let id_slot = slot(proto.params.len() + 1);
    let mut code = vec![
        Instruction::Load(0),
        Instruction::Load(id_slot),
        Instruction::PutField(class_id.clone()),
    ];
    match groups {
        [] => return Err(invariant_error!("constructor bucket without bodies")),
        [single] => code.extend(call_body(ctx, proto, single)),
        [arms @ .., last] => {
            let arms = arms
                .iter()
                .map(|group| {
                    let ids = group
                        .entries
                        .iter()
                        .map(|(index, _)| MergeContext::class_id(*index))
                        .collect();
                    (ids, call_body(ctx, proto, group))
                })
                .collect();
            code.extend(switch_dispatch(vec![Instruction::Load(id_slot)], arms, call_body(ctx, proto, last)));
        }
    }

    let (sig, extra) = ctx.claim_constructor(proto.with_appended(TypeRef::Int));
    let to = ctx.target_method(sig.clone());
    for (index, constructor) in &bucket.entries {
        let mut arguments = vec![ExtraParameter::ClassId(MergeContext::class_id(*index))];
        arguments.extend(extra.iter().cloned());
        let from = ctx.members[*index].method_ref(constructor);
        ctx.lens
            .map_method_with(from, MethodLookup::with_extra(to.clone(), arguments))?;
    }

    let visibility = widest_visibility(bucket.entries.iter().map(|(_, m)| *m));
    let flags = MethodAccessFlags::empty().with_visibility(visibility) | MethodAccessFlags::SYNTHETIC;
    let mut entry = MethodDef::new(INIT, sig.proto.clone(), flags, Some(Code::new(code)));
    entry.holder = ctx.target_id;
    entry.synthesized = true;
    entry.original = to;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use crate::{
        config::MergerConfig,
        merger::MergePlan,
        policy::MergeGroup,
        program::{Instruction, Program, TypeName, TypeRef, INIT},
        test::builder::{print, ClassBuilder, ProgramBuilder},
    };

    fn plan(program: &Program) -> MergePlan {
        let a = program.lookup(&TypeName::new("a.A")).unwrap();
        let b = program.lookup(&TypeName::new("a.B")).unwrap();
        let mut group = MergeGroup::new(vec![a, b]);
        group.set_target(a);
        MergePlan::build(program, &group, &MergerConfig::default(), &TypeName::new("a.Marker")).unwrap()
    }

    fn constructors(plan: &MergePlan) -> Vec<Vec<TypeRef>> {
        plan.merged()
            .constructors()
            .map(|m| m.sig.proto.params.clone())
            .collect()
    }

    #[test]
    fn test_identical_constructors_are_shared() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").default_constructor().build())
            .class(ClassBuilder::new("a.B").default_constructor().build())
            .build();
        let plan = plan(&program);
        assert!(plan.class_id_field().is_none());
        assert_eq!(constructors(&plan), vec![Vec::<TypeRef>::new()]);
    }

    #[test]
    fn test_distinct_signatures_need_no_class_id() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").constructor(vec![], print("a")).build())
            .class(
                ClassBuilder::new("a.B")
                    .constructor(vec![TypeRef::class("java.lang.String")], print("b"))
                    .build(),
            )
            .build();
        let plan = plan(&program);
        assert!(plan.class_id_field().is_none());
        assert_eq!(
            constructors(&plan),
            vec![vec![], vec![TypeRef::class("java.lang.String")]]
        );
    }

    #[test]
    fn test_distinct_bodies_get_an_entry_point() {
        let program = ProgramBuilder::new()
            .class(ClassBuilder::new("a.A").constructor(vec![], print("a")).build())
            .class(ClassBuilder::new("a.B").constructor(vec![], print("b")).build())
            .build();
        let plan = plan(&program);
        let class_id = plan.class_id_field().cloned().unwrap();

        assert_eq!(constructors(&plan), vec![vec![TypeRef::Int]]);
        let entry = plan
            .merged()
            .constructors()
            .next()
            .and_then(|m| m.code.as_ref())
            .unwrap();
        assert_eq!(entry.instructions[2], Instruction::PutField(class_id));
        assert!(entry
            .instructions
            .iter()
            .any(|insn| matches!(insn, Instruction::Switch { .. })));

        let moved: Vec<&str> = plan
            .merged()
            .methods
            .iter()
            .filter(|m| m.sig.name.starts_with("$init$"))
            .map(|m| &*m.sig.name)
            .collect();
        assert_eq!(moved, vec!["$init$A", "$init$B"]);
        assert!(plan
            .merged()
            .methods
            .iter()
            .filter(|m| m.sig.name.as_ref() == INIT)
            .all(|m| m.synthesized));
    }
}
