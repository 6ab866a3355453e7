//! Post-merge signature fixing.
//!
//! After all groups are committed, member signatures across the whole program still name
//! merged-away classes. The tree fixer rewrites class headers through the type map, then
//! visits every program class with its supertypes first and gives each member its final
//! signature:
//!
//! - pinned members keep their name, only their types are mapped
//! - a method overriding an inherited virtual method follows that method's new signature
//! - interface methods keep their name, only their types are mapped
//! - everything else keeps its mapped signature unless that collides with a member of the
//!   same class or starts to override an inherited method by accident; then it is renamed
//!   with a `$n` suffix, or for constructors, given unused marker parameters
//!
//! Every rename becomes a fix-up entry of the lens, both for the declaring class and for
//! each subclass through which the member is referenced. Subclasses of a merged-away class
//! still name its members by their pre-merge signatures, so those are translated through
//! the merge stage of the lens to the final members of the target.
//!
//! # Key Types
//!
//! - [`TreeFixer`] - the pass itself
//! - [`validate_access`] - the pre-commit access check for one merge plan

mod access;

use std::{collections::BTreeMap, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    lens::{ExtraParameter, LensBuilder, MethodLookup},
    merger::synthesize::fresh_name,
    program::{ClassId, FieldRef, MethodRef, MethodSig, Program, Proto, TypeName, TypeRef, Visibility},
    Error, Result,
};

pub use access::validate_access;

type FieldKey = (Arc<str>, TypeRef);

/// Members a class exposes to its subclasses: pre-fix signature to final signature.
#[derive(Debug, Clone, Default)]
struct Visible {
    /// Old signature to new signature and whether the method is virtual
    methods: BTreeMap<MethodSig, (MethodSig, bool)>,
    fields: BTreeMap<FieldKey, FieldKey>,
}

impl Visible {
    fn absorb(&mut self, other: &Visible) {
        for (old, new) in &other.methods {
            self.methods.entry(old.clone()).or_insert_with(|| new.clone());
        }
        for (old, new) in &other.fields {
            self.fields.entry(old.clone()).or_insert_with(|| new.clone());
        }
    }
}

/// The final signature chosen for one declared method.
struct MethodFix {
    index: usize,
    sig: MethodSig,
    extra: Vec<ExtraParameter>,
}

/// Gives every member of the merged program its final signature.
pub struct TreeFixer<'a> {
    lens: &'a mut LensBuilder,
    marker: &'a TypeName,
    types: BTreeMap<TypeName, TypeName>,
    visible: FxHashMap<TypeName, Visible>,
    /// Merged-away direct supertypes of each class, before headers were rewritten
    merged_supertypes: FxHashMap<TypeName, Vec<TypeName>>,
    uses_marker: bool,
    renamed: usize,
}

impl<'a> TreeFixer<'a> {
    /// Creates a fixer recording into `lens`, which must already be in its fix-up stage.
    ///
    /// `marker` names the class used for unused constructor parameters.
    pub fn new(lens: &'a mut LensBuilder, marker: &'a TypeName) -> Self {
        let types = lens.type_map().clone();
        TreeFixer {
            lens,
            marker,
            types,
            visible: FxHashMap::default(),
            merged_supertypes: FxHashMap::default(),
            uses_marker: false,
            renamed: 0,
        }
    }

    /// Fixes every program class.
    ///
    /// Returns true if some constructor was given a marker parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvableCollision`] if two members that must keep their
    /// signature collide, or [`Error::Invariant`] on conflicting lens entries.
    pub fn run(mut self, program: &mut Program) -> Result<bool> {
        if self.types.is_empty() {
            return Ok(false);
        }
        self.fix_headers(program);
        for id in supertypes_first(program) {
            self.fix_class(program, id)?;
        }
        log::debug!("tree fixer renamed {} members", self.renamed);
        Ok(self.uses_marker)
    }

    fn map_name(&self, name: &TypeName) -> TypeName {
        self.types.get(name).cloned().unwrap_or_else(|| name.clone())
    }

    fn map_type(&self, ty: &TypeRef) -> TypeRef {
        ty.map_classes(&|name: &TypeName| self.map_name(name))
    }

    fn map_proto(&self, proto: &Proto) -> Proto {
        proto.map_classes(&|name: &TypeName| self.map_name(name))
    }

    fn fix_headers(&mut self, program: &mut Program) {
        for id in program.class_ids() {
            let Some(class) = program.class_mut(id) else {
                continue;
            };
            if class.is_library() {
                continue;
            }
            let own = class.name.clone();
            let merged: Vec<TypeName> = class
                .super_type
                .iter()
                .chain(&class.interfaces)
                .filter(|s| self.types.contains_key(*s))
                .cloned()
                .collect();
            if !merged.is_empty() {
                self.merged_supertypes.insert(own.clone(), merged);
            }
            class.super_type = class.super_type.as_ref().map(|s| self.map_name(s));
            class.interfaces = dedup_mapped(&class.interfaces, &own, |n| self.map_name(n));
            class.nest_members = dedup_mapped(&class.nest_members, &own, |n| self.map_name(n));
            class.nest_host = class
                .nest_host
                .as_ref()
                .map(|h| self.map_name(h))
                .filter(|h| *h != own);
            class.enclosing_class = class.enclosing_class.as_ref().map(|e| self.map_name(e));
        }
    }

    /// Members visible through `name`, computing them for library classes on demand.
    fn visible_of(&mut self, program: &Program, name: &TypeName) -> Visible {
        if let Some(visible) = self.visible.get(name) {
            return visible.clone();
        }
        let Some(class) = program.class_by_name(name) else {
            return Visible::default();
        };
        // program classes are always visited before their subclasses
        let mut visible = Visible::default();
        let inheritable = class
            .methods
            .iter()
            .filter(|m| !m.is_private() && !m.is_instance_initializer() && !m.is_class_initializer());
        for method in inheritable {
            visible
                .methods
                .insert(method.sig.clone(), (method.sig.clone(), method.is_virtual()));
        }
        for field in class.fields.iter().filter(|f| f.flags.visibility() != Visibility::Private) {
            let key = (field.name.clone(), field.ty.clone());
            visible.fields.insert(key.clone(), key);
        }
        let supertypes: Vec<TypeName> = class.super_type.iter().chain(&class.interfaces).cloned().collect();
        for supertype in supertypes {
            let inherited = self.visible_of(program, &supertype);
            visible.absorb(&inherited);
        }
        self.visible.insert(name.clone(), visible.clone());
        visible
    }

    /// Members visible through the merged-away class `source`, keyed by their pre-merge
    /// signatures. The target must already be fixed.
    fn source_visible(&mut self, program: &Program, source: &TypeName) -> Visible {
        if let Some(visible) = self.visible.get(source) {
            return visible.clone();
        }
        let target = self.map_name(source);
        let into = self.visible_of(program, &target);

        let mut visible = Visible::default();
        for (from, to) in self.lens.merged_fields_of(source) {
            if let Some(fixed) = into.fields.get(&(to.name.clone(), to.ty.clone())) {
                visible
                    .fields
                    .insert((from.name.clone(), from.ty.clone()), fixed.clone());
            }
        }
        for (from, to) in self.lens.merged_methods_of(source) {
            if !to.extra.is_empty() {
                continue;
            }
            if let Some(fixed) = into.methods.get(&to.method.sig) {
                visible.methods.insert(from.sig.clone(), fixed.clone());
            }
        }
        visible.absorb(&into);
        self.visible.insert(source.clone(), visible.clone());
        visible
    }

    fn fix_class(&mut self, program: &mut Program, id: ClassId) -> Result<()> {
        let class = program.get(id)?;
        let name = class.name.clone();
        let is_interface = class.is_interface();

        // members of merged-away supertypes first: code in this class still uses their old names
        let mut inherited = Visible::default();
        let sources = self.merged_supertypes.get(&name).cloned().unwrap_or_default();
        for source in &sources {
            let visible = self.source_visible(program, source);
            inherited.absorb(&visible);
        }
        let supertypes: Vec<TypeName> = class.super_type.iter().chain(&class.interfaces).cloned().collect();
        for supertype in &supertypes {
            let visible = self.visible_of(program, supertype);
            inherited.absorb(&visible);
        }
        // new signature of each inherited virtual method to its old one
        let inherited_new: BTreeMap<&MethodSig, &MethodSig> = inherited
            .methods
            .iter()
            .filter(|(_, (_, is_virtual))| *is_virtual)
            .map(|(old, (new, _))| (new, old))
            .collect();

        let class = program.get(id)?;
        let mut used: FxHashSet<MethodSig> = FxHashSet::default();
        let mut fixes: Vec<MethodFix> = Vec::with_capacity(class.methods.len());

        // fixed members first, in declaration order
        let mut floating = Vec::new();
        for (index, method) in class.methods.iter().enumerate() {
            let desired = method.sig.with_proto(self.map_proto(&method.sig.proto));
            let forced = if method.is_virtual() {
                inherited
                    .methods
                    .get(&method.sig)
                    .filter(|(_, is_virtual)| *is_virtual)
                    .map(|(new, _)| new.clone())
            } else {
                None
            };
            let fixed = forced.is_some()
                || method.pinned
                || method.is_class_initializer()
                || (is_interface && method.is_virtual());
            if !fixed {
                floating.push((index, desired));
                continue;
            }
            let sig = forced.unwrap_or(desired);
            if !used.insert(sig.clone()) {
                return Err(Error::UnresolvableCollision {
                    class: name.clone(),
                    signature: sig.to_string(),
                });
            }
            fixes.push(MethodFix {
                index,
                sig,
                extra: Vec::new(),
            });
        }

        for (index, desired) in floating {
            let method = &class.methods[index];
            let accidental = inherited_new
                .get(&desired)
                .is_some_and(|old| **old != desired || method.sig != desired);
            if !used.contains(&desired) && !accidental {
                used.insert(desired.clone());
                fixes.push(MethodFix {
                    index,
                    sig: desired,
                    extra: Vec::new(),
                });
                continue;
            }

            let taken = |sig: &MethodSig| used.contains(sig) || inherited_new.contains_key(sig);
            let (sig, extra) = if method.is_instance_initializer() {
                let mut sig = desired;
                let mut extra = Vec::new();
                while taken(&sig) {
                    sig = sig.with_proto(sig.proto.with_appended(TypeRef::Class(self.marker.clone())));
                    extra.push(ExtraParameter::UnusedNull(self.marker.clone()));
                }
                self.uses_marker = true;
                (sig, extra)
            } else {
                let fresh = fresh_name(&desired.name, |candidate| {
                    taken(&MethodSig::new(candidate, desired.proto.clone()))
                });
                (desired.with_name(fresh), Vec::new())
            };
            log::trace!("renaming {}.{} to {}", name, method.sig, sig);
            self.renamed += 1;
            used.insert(sig.clone());
            fixes.push(MethodFix { index, sig, extra });
        }

        // fields
        let mut used_fields: FxHashSet<FieldKey> = FxHashSet::default();
        let mut field_fixes: Vec<(usize, FieldKey)> = Vec::with_capacity(class.fields.len());
        let mut order: Vec<usize> = (0..class.fields.len()).collect();
        order.sort_by_key(|i| !class.fields[*i].pinned);
        for index in order {
            let field = &class.fields[index];
            let ty = self.map_type(&field.ty);
            let mut key = (field.name.clone(), ty.clone());
            if used_fields.contains(&key) {
                if field.pinned {
                    return Err(Error::UnresolvableCollision {
                        class: name.clone(),
                        signature: format!("{}:{}", field.name, ty),
                    });
                }
                let fresh = fresh_name(&field.name, |candidate| {
                    used_fields.iter().any(|(n, _)| &**n == candidate)
                });
                key = (fresh, ty);
                self.renamed += 1;
            }
            used_fields.insert(key.clone());
            field_fixes.push((index, key));
        }

        // lens entries: declared members, then members referenced through this class
        let mut own = Visible::default();
        let mut declared_methods: FxHashSet<MethodSig> = FxHashSet::default();
        for fix in &fixes {
            let method = &class.methods[fix.index];
            declared_methods.insert(method.sig.clone());
            if !method.is_private() && !method.is_instance_initializer() && !method.is_class_initializer() {
                own.methods
                    .insert(method.sig.clone(), (fix.sig.clone(), method.is_virtual()));
            }
            self.record_method(&name, &method.sig, &fix.sig, &fix.extra)?;
        }
        let mut declared_fields: FxHashSet<FieldKey> = FxHashSet::default();
        for (index, key) in &field_fixes {
            let field = &class.fields[*index];
            let old = (field.name.clone(), field.ty.clone());
            declared_fields.insert(old.clone());
            if field.flags.visibility() != Visibility::Private {
                own.fields.insert(old.clone(), key.clone());
            }
            self.record_field(&name, &old, key)?;
        }
        for (old, (new, _)) in &inherited.methods {
            if !declared_methods.contains(old) {
                self.record_method(&name, old, new, &[])?;
            }
        }
        for (old, new) in &inherited.fields {
            if !declared_fields.contains(old) {
                self.record_field(&name, old, new)?;
            }
        }
        own.absorb(&inherited);
        self.visible.insert(name, own);

        let class = program.get_mut(id)?;
        for fix in fixes {
            class.methods[fix.index].sig = fix.sig;
        }
        for (index, (field_name, ty)) in field_fixes {
            let field = &mut class.fields[index];
            field.name = field_name;
            field.ty = ty;
        }
        Ok(())
    }

    fn record_method(
        &mut self,
        holder: &TypeName,
        old: &MethodSig,
        new: &MethodSig,
        extra: &[ExtraParameter],
    ) -> Result<()> {
        let mapped = old.with_proto(self.map_proto(&old.proto));
        if mapped == *new && extra.is_empty() {
            return Ok(());
        }
        self.lens.map_method_with(
            MethodRef::from_sig(holder.clone(), old.clone()),
            MethodLookup::with_extra(MethodRef::from_sig(holder.clone(), new.clone()), extra.to_vec()),
        )
    }

    fn record_field(&mut self, holder: &TypeName, old: &FieldKey, new: &FieldKey) -> Result<()> {
        if old.0 == new.0 && self.map_type(&old.1) == new.1 {
            return Ok(());
        }
        self.lens.map_field(
            FieldRef::new(holder.clone(), &old.0, old.1.clone()),
            FieldRef::new(holder.clone(), &new.0, new.1.clone()),
        )
    }
}

fn dedup_mapped<F>(names: &[TypeName], own: &TypeName, map: F) -> Vec<TypeName>
where
    F: Fn(&TypeName) -> TypeName,
{
    let mut result: Vec<TypeName> = Vec::with_capacity(names.len());
    for name in names {
        let mapped = map(name);
        if mapped != *own && !result.contains(&mapped) {
            result.push(mapped);
        }
    }
    result
}

/// Program classes ordered so that every class comes after its program supertypes; ties
/// are broken by name.
fn supertypes_first(program: &Program) -> Vec<ClassId> {
    let mut roots: Vec<(&TypeName, ClassId)> = program
        .program_classes()
        .map(|(id, class)| (&class.name, id))
        .collect();
    roots.sort_by(|a, b| a.0.cmp(b.0));

    let mut order = Vec::with_capacity(roots.len());
    let mut visited: FxHashSet<ClassId> = FxHashSet::default();
    for (_, root) in roots {
        // iterative post-order over supertype edges
        let mut stack: Vec<(ClassId, bool)> = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            let Some(class) = program.class(id) else {
                continue;
            };
            let mut supertypes: Vec<ClassId> = class
                .super_type
                .iter()
                .chain(&class.interfaces)
                .filter_map(|s| program.lookup(s))
                .filter(|s| program.class(*s).is_some_and(|c| !c.is_library()))
                .filter(|s| !visited.contains(s))
                .collect();
            supertypes.reverse();
            stack.extend(supertypes.into_iter().map(|s| (s, false)));
        }
    }
    order
}
