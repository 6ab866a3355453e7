//! Per-group merge plans.
//!
//! A [`MergePlan`] is computed for one frozen group against the unmodified program and holds
//! everything needed to commit the merge: the merged target definition and the lens
//! entries for every relocated member. Building a plan never mutates the program, so plans
//! for disjoint groups can be built concurrently and a failed plan simply leaves its classes
//! untouched.

use std::{collections::BTreeMap, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    config::MergerConfig,
    lens::{ExtraParameter, LensBuilder},
    merger::{
        class_initializer, constructors::ConstructorPlan, direct_methods, fields,
        synthesize::{claim_constructor, claim_method_sig, fresh_name},
        virtual_methods::VirtualPlan,
        MergedClass,
    },
    policy::MergeGroup,
    program::{
        ClassAccessFlags, ClassDef, ClassId, Code, FieldAccessFlags, FieldDef, FieldRef, Instruction,
        MethodAccessFlags, MethodDef, MethodRef, MethodSig, Program, Proto, TypeName, TypeRef,
        Visibility,
    },
    Result,
};

/// Name of the synthesized class id field, before collision renaming.
pub const CLASS_ID_FIELD: &str = "$classId";

/// Working state while one group is planned.
pub(crate) struct MergeContext<'a> {
    pub program: &'a Program,
    pub config: &'a MergerConfig,
    pub target_id: ClassId,
    /// Group members, target first; the index is the member's class id
    pub members: Vec<&'a ClassDef>,
    pub marker: &'a TypeName,
    pub lens: LensBuilder,
    /// Pre-merge field references to their merged counterparts
    pub field_map: FxHashMap<FieldRef, FieldRef>,
    /// Pre-merge direct method references to their relocated counterparts
    pub method_map: FxHashMap<MethodRef, MethodRef>,
    pub field_names: FxHashSet<Arc<str>>,
    pub method_sigs: FxHashSet<MethodSig>,
    pub constructor_sigs: FxHashSet<MethodSig>,
    /// Virtual signatures inherited from the superclass chain
    pub inherited: FxHashSet<MethodSig>,
    pub uses_marker: bool,
}

impl<'a> MergeContext<'a> {
    fn new(
        program: &'a Program,
        config: &'a MergerConfig,
        group: &MergeGroup,
        marker: &'a TypeName,
    ) -> Result<Self> {
        let Some(target_id) = group.target() else {
            return Err(invariant_error!("merge group was never finalized"));
        };
        let members = group
            .classes()
            .iter()
            .map(|id| program.get(*id))
            .collect::<Result<Vec<_>>>()?;
        if members.first().map(|c| &c.name) != program.class(target_id).map(|c| &c.name) {
            return Err(invariant_error!("merge group target is not in front"));
        }
        for source in &members[1..] {
            if source.has_pinned_members() {
                return Err(incompatible!(source.name, "pinned members cannot be relocated"));
            }
        }

        let target = members[0];
        let mut method_sigs: FxHashSet<MethodSig> = target
            .methods
            .iter()
            .filter(|m| !m.is_instance_initializer())
            .map(|m| m.sig.clone())
            .collect();
        for member in &members {
            method_sigs.extend(member.virtual_methods().map(|m| m.sig.clone()));
        }
        let field_names = target.fields.iter().map(|f| f.name.clone()).collect();

        let mut inherited = FxHashSet::default();
        for ancestor in program.superclass_chain(target_id) {
            if let Some(class) = program.class(ancestor) {
                inherited.extend(class.virtual_methods().map(|m| m.sig.clone()));
            }
        }

        Ok(MergeContext {
            program,
            config,
            target_id,
            members,
            marker,
            lens: LensBuilder::new(),
            field_map: FxHashMap::default(),
            method_map: FxHashMap::default(),
            field_names,
            method_sigs,
            constructor_sigs: FxHashSet::default(),
            inherited,
            uses_marker: false,
        })
    }

    /// The target class as it was before merging.
    pub fn target(&self) -> &'a ClassDef {
        self.members[0]
    }

    /// Name of the merged class.
    pub fn target_name(&self) -> &'a TypeName {
        &self.members[0].name
    }

    /// Class id of the member at `index`.
    pub fn class_id(index: usize) -> i32 {
        i32::try_from(index).unwrap_or(i32::MAX)
    }

    /// Returns true if `name` is a member of this group.
    pub fn is_member(&self, name: &TypeName) -> bool {
        self.members.iter().any(|m| &m.name == name)
    }

    /// Maps members of this group to the target; every other name is unchanged.
    pub fn map_group(&self, name: &TypeName) -> TypeName {
        if self.is_member(name) {
            self.target_name().clone()
        } else {
            name.clone()
        }
    }

    /// Maps members of this group inside a value type.
    pub fn map_group_type(&self, ty: &TypeRef) -> TypeRef {
        ty.map_classes(&|name: &TypeName| self.map_group(name))
    }

    /// Picks and reserves a method signature derived from `base`, avoiding inherited ones.
    pub fn claim_method(&mut self, base: &str, proto: &Proto) -> MethodSig {
        claim_method_sig(base, proto, &mut self.method_sigs, &self.inherited)
    }

    /// Picks and reserves a field name derived from `base`.
    pub fn claim_field(&mut self, base: &str) -> Arc<str> {
        let name = fresh_name(base, |candidate| self.field_names.contains(candidate));
        self.field_names.insert(name.clone());
        name
    }

    /// Picks and reserves a constructor signature for `proto`.
    pub fn claim_constructor(&mut self, proto: Proto) -> (MethodSig, Vec<ExtraParameter>) {
        let (sig, extra) = claim_constructor(proto, &mut self.constructor_sigs, self.marker);
        self.uses_marker |= !extra.is_empty();
        (sig, extra)
    }

    /// Reference to a member of the merged class, before tree fixing.
    pub fn target_method(&self, sig: MethodSig) -> MethodRef {
        MethodRef::from_sig(self.target_name().clone(), sig)
    }

    /// A constructor or method body with every group-internal reference mapped to where it
    /// will point after merging and debug positions dropped.
    ///
    /// Two bodies with equal normalized instructions behave identically once merged.
    pub fn normalize(&self, code: &Code) -> Vec<Instruction> {
        let field = |f: &FieldRef| {
            self.field_map.get(f).cloned().unwrap_or_else(|| FieldRef {
                holder: self.map_group(&f.holder),
                name: f.name.clone(),
                ty: self.map_group_type(&f.ty),
            })
        };
        let method = |m: &MethodRef| {
            self.method_map.get(m).cloned().unwrap_or_else(|| {
                let proto = m.sig.proto.map_classes(&|n: &TypeName| self.map_group(n));
                MethodRef::from_sig(self.map_group(&m.holder), m.sig.with_proto(proto))
            })
        };
        code.instructions
            .iter()
            .filter(|insn| !matches!(insn, Instruction::Position { .. }))
            .map(|insn| match insn {
                Instruction::GetField(f) => Instruction::GetField(field(f)),
                Instruction::PutField(f) => Instruction::PutField(field(f)),
                Instruction::GetStatic(f) => Instruction::GetStatic(field(f)),
                Instruction::PutStatic(f) => Instruction::PutStatic(field(f)),
                Instruction::Invoke { kind, method: m } => Instruction::Invoke {
                    kind: *kind,
                    method: method(m),
                },
                Instruction::NewInstance(ty) => Instruction::NewInstance(self.map_group(ty)),
                Instruction::CheckCast(ty) => Instruction::CheckCast(self.map_group_type(ty)),
                Instruction::InstanceOf(ty) => Instruction::InstanceOf(self.map_group_type(ty)),
                Instruction::ConstClass(ty) => Instruction::ConstClass(self.map_group_type(ty)),
                other => other.clone(),
            })
            .collect()
    }
}

/// The merge of one group, ready to be committed.
#[derive(Debug)]
pub struct MergePlan {
    target: ClassId,
    sources: Vec<ClassId>,
    merged: ClassDef,
    source_names: Vec<TypeName>,
    lens: LensBuilder,
    class_id_field: Option<FieldRef>,
    uses_marker: bool,
}

impl MergePlan {
    /// Plans the merge of a finalized group.
    ///
    /// `marker` names the class used for unused disambiguating constructor parameters; it is
    /// only created by the caller if some plan reports [`MergePlan::uses_marker`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StructuralIncompatibility`] if the members cannot be
    /// reconciled, or [`crate::Error::Invariant`] if the group is malformed.
    pub fn build(
        program: &Program,
        group: &MergeGroup,
        config: &MergerConfig,
        marker: &TypeName,
    ) -> Result<Self> {
        let mut ctx = MergeContext::new(program, config, group, marker)?;

        let mut field_defs = fields::merge_fields(&mut ctx)?;
        let virtuals = VirtualPlan::analyze(&ctx);
        let direct = direct_methods::relocate(&mut ctx)?;
        let constructors = ConstructorPlan::analyze(&ctx)?;

        let class_id_field = if virtuals.needs_class_id() || constructors.needs_class_id() {
            let name = ctx.claim_field(CLASS_ID_FIELD);
            let mut def = FieldDef::new(
                &name,
                TypeRef::Int,
                FieldAccessFlags::PRIVATE | FieldAccessFlags::FINAL | FieldAccessFlags::SYNTHETIC,
            );
            def.holder = ctx.target_id;
            def.original = FieldRef::new(ctx.target_name().clone(), &name, TypeRef::Int);
            field_defs.push(def);
            Some(FieldRef::new(ctx.target_name().clone(), name, TypeRef::Int))
        } else {
            None
        };

        let mut methods = constructors.emit(&mut ctx, class_id_field.as_ref())?;
        methods.extend(virtuals.emit(&mut ctx, class_id_field.as_ref())?);
        methods.extend(direct);
        if let Some(initializer) = class_initializer::merge(&ctx)? {
            methods.push(initializer);
        }

        let mut merged = merged_header(&ctx);
        merged.fields = field_defs;
        merged.methods = methods;
        if config.allow_access_modification && spans_packages(&ctx.members) {
            publicize(&mut merged);
        }

        let target_name = ctx.target_name().clone();
        let source_names: Vec<TypeName> = ctx.members[1..].iter().map(|c| c.name.clone()).collect();
        for source in &source_names {
            ctx.lens.map_type(source.clone(), target_name.clone())?;
        }
        log::debug!(
            "planned merge of {} into {}{}",
            source_names.len(),
            target_name,
            if class_id_field.is_some() { " with class ids" } else { "" }
        );

        Ok(MergePlan {
            target: ctx.target_id,
            sources: group.sources().collect(),
            merged,
            source_names,
            uses_marker: ctx.uses_marker,
            class_id_field,
            lens: ctx.lens,
        })
    }

    /// The class that survives.
    #[must_use]
    pub fn target(&self) -> ClassId {
        self.target
    }

    /// The classes absorbed into the target, in class id order.
    #[must_use]
    pub fn sources(&self) -> &[ClassId] {
        &self.sources
    }

    /// The merged target definition.
    #[must_use]
    pub fn merged(&self) -> &ClassDef {
        &self.merged
    }

    /// The synthesized class id field, if the merge needed one.
    #[must_use]
    pub fn class_id_field(&self) -> Option<&FieldRef> {
        self.class_id_field.as_ref()
    }

    /// Returns true if a constructor needed an unused marker parameter.
    #[must_use]
    pub fn uses_marker(&self) -> bool {
        self.uses_marker
    }

    /// Virtual methods of the merged class with their final access.
    pub fn virtual_methods(&self) -> impl Iterator<Item = (&MethodSig, Visibility)> {
        self.merged
            .virtual_methods()
            .map(|m| (&m.sig, m.visibility()))
    }

    /// Names of all group members, target first.
    pub fn member_names(&self) -> impl Iterator<Item = &TypeName> {
        std::iter::once(&self.merged.name).chain(self.source_names.iter())
    }

    /// Replaces the target with the merged definition, removes the sources and moves the
    /// plan's lens entries into `lens`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ClassNotFound`] if a member disappeared since planning, or
    /// [`crate::Error::Invariant`] on conflicting lens entries.
    pub fn commit(self, program: &mut Program, lens: &mut LensBuilder) -> Result<MergedClass> {
        program.get(self.target)?;
        if let Some(missing) = self.sources.iter().find(|source| program.class(**source).is_none()) {
            return Err(invariant_error!("merge source {} vanished before commit", missing));
        }
        for source in &self.sources {
            program.remove_class(*source);
        }
        let target_name = self.merged.name.clone();
        *program.get_mut(self.target)? = self.merged;
        lens.absorb(self.lens)?;

        let mut class_ids = BTreeMap::new();
        class_ids.insert(target_name.clone(), 0);
        for (index, source) in self.source_names.iter().enumerate() {
            class_ids.insert(source.clone(), MergeContext::class_id(index + 1));
        }
        Ok(MergedClass {
            target: target_name,
            sources: self.source_names,
            class_id_field: self.class_id_field,
            class_ids,
        })
    }
}

fn merged_header(ctx: &MergeContext<'_>) -> ClassDef {
    let target = ctx.target();
    let mut merged = target.clone();
    merged.fields = Vec::new();
    merged.methods = Vec::new();

    for member in &ctx.members[1..] {
        for interface in &member.interfaces {
            if !merged.interfaces.contains(interface) {
                merged.interfaces.push(interface.clone());
            }
        }
        for nest_member in &member.nest_members {
            if !merged.nest_members.contains(nest_member) {
                merged.nest_members.push(nest_member.clone());
            }
        }
    }
    if ctx.members.iter().any(|m| !m.is_final()) {
        merged.flags.remove(ClassAccessFlags::FINAL);
    }
    if ctx.members.iter().any(|m| m.flags.contains(ClassAccessFlags::PUBLIC)) {
        merged.flags.insert(ClassAccessFlags::PUBLIC);
    }
    merged
}

fn spans_packages(members: &[&ClassDef]) -> bool {
    members
        .windows(2)
        .any(|pair| !pair[0].name.same_package(&pair[1].name))
}

/// Makes the merged class and its package-private non-virtual members public.
fn publicize(merged: &mut ClassDef) {
    merged.flags.insert(ClassAccessFlags::PUBLIC);
    for field in &mut merged.fields {
        if field.flags.is_package_private() {
            field.flags = field.flags.with_visibility(Visibility::Public);
        }
    }
    for method in &mut merged.methods {
        if method.is_direct() && !method.is_class_initializer() && method.flags.is_package_private() {
            method.flags = method.flags.with_visibility(Visibility::Public);
        }
    }
}

/// Flags of a method that takes over from several declarations: the most permissive access.
pub(crate) fn widest_visibility<'m, I>(methods: I) -> Visibility
where
    I: IntoIterator<Item = &'m MethodDef>,
{
    methods
        .into_iter()
        .map(MethodDef::visibility)
        .max()
        .unwrap_or(Visibility::Public)
}

/// Flags for a relocated body that only the merged class itself calls.
pub(crate) fn private_flags(flags: MethodAccessFlags) -> MethodAccessFlags {
    (flags.with_visibility(Visibility::Private) - MethodAccessFlags::ABSTRACT) | MethodAccessFlags::SYNTHETIC
}
