//! The rewrite lens.
//!
//! Merging moves and renames definitions, but code everywhere else in the program still
//! names the old ones. Rather than patching references while the merger runs, every
//! move is recorded in a [`LensBuilder`]; once all groups are committed and the tree fixer
//! has finished, the builder is frozen into a [`RewriteLens`] and applied program-wide in
//! one pass.
//!
//! # Architecture
//!
//! Entries are recorded in two stages:
//!
//! ```text
//!   pre-merge reference ──[merge stage]──► post-merge reference ──[fix-up stage]──► final
//!        B.f()                                  A.f()                               A.f()
//!        B.<init>()                             A.<init>(int) +ClassId(1)           A.<init>(int)
//!        X.m(B)                                 X.m(B)                              X.m(A)
//! ```
//!
//! The merge stage is written by the class merger and maps references into merged
//! targets. References without an explicit entry only get their holder mapped, so the
//! keys of the fix-up stage are always "holder after merging, signature before fix-up".
//! The fix-up stage is written by the tree fixer; references without an entry there get
//! every class name in their signature mapped. [`LensBuilder::freeze`] precomposes the
//! explicit merge entries with the fix-up stage.
//!
//! # Key Types
//!
//! - [`LensBuilder`] - append-only recorder
//! - [`RewriteLens`] - the frozen, queryable mapping
//! - [`MethodLookup`] - a rewritten method plus trailing arguments call sites must add
//! - [`ExtraParameter`] - one such trailing argument
//! - [`CodeRewriter`] - applies a lens to method bodies

mod resources;
mod rewriter;

use std::collections::BTreeMap;

pub use resources::{rewrite_annotations, rewrite_resources, rewrite_startup_profile};
pub use rewriter::{verify_references, CodeRewriter};

use crate::{
    program::{FieldRef, Instruction, MethodRef, Reference, TypeName, TypeRef},
    Result,
};

/// A trailing argument that call sites of a rewritten method must supply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtraParameter {
    /// The class id of the merged class the call site originally constructed
    ClassId(i32),
    /// An unused parameter of a marker type, passed as `null`, that keeps two
    /// otherwise identical constructor signatures apart
    UnusedNull(TypeName),
}

impl ExtraParameter {
    /// Declared type of the parameter.
    #[must_use]
    pub fn ty(&self) -> TypeRef {
        match self {
            ExtraParameter::ClassId(_) => TypeRef::Int,
            ExtraParameter::UnusedNull(marker) => TypeRef::Class(marker.clone()),
        }
    }

    /// Instruction that pushes the argument.
    #[must_use]
    pub fn push_instruction(&self) -> Instruction {
        match self {
            ExtraParameter::ClassId(id) => Instruction::ConstInt(i64::from(*id)),
            ExtraParameter::UnusedNull(_) => Instruction::ConstNull,
        }
    }
}

/// Result of rewriting a method reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodLookup {
    /// The method to invoke instead
    pub method: MethodRef,
    /// Arguments to append after the original ones, in order
    pub extra: Vec<ExtraParameter>,
}

impl MethodLookup {
    /// A lookup without extra parameters.
    #[must_use]
    pub fn unchanged(method: MethodRef) -> Self {
        MethodLookup {
            method,
            extra: Vec::new(),
        }
    }

    /// Creates a lookup with extra parameters.
    #[must_use]
    pub fn with_extra(method: MethodRef, extra: Vec<ExtraParameter>) -> Self {
        MethodLookup { method, extra }
    }

    fn then(self, next: MethodLookup) -> MethodLookup {
        let mut extra = self.extra;
        extra.extend(next.extra);
        MethodLookup {
            method: next.method,
            extra,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Stage {
    fields: BTreeMap<FieldRef, FieldRef>,
    methods: BTreeMap<MethodRef, MethodLookup>,
    originals: BTreeMap<MethodRef, MethodRef>,
}

impl Stage {
    fn len(&self) -> usize {
        self.fields.len() + self.methods.len()
    }
}

/// Append-only recorder of reference rewrites.
///
/// Recording the same mapping twice is harmless; mapping one reference to two different
/// targets is an invariant violation.
#[derive(Debug, Clone, Default)]
pub struct LensBuilder {
    types: BTreeMap<TypeName, TypeName>,
    merge: Stage,
    fixups: Stage,
    fixing: bool,
}

impl LensBuilder {
    /// Creates an empty builder recording into the merge stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches to the fix-up stage; every later record is keyed by post-merge references.
    pub fn begin_fixups(&mut self) {
        self.fixing = true;
    }

    fn stage(&mut self) -> &mut Stage {
        if self.fixing {
            &mut self.fixups
        } else {
            &mut self.merge
        }
    }

    /// Records that class `from` was merged into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `from` is already mapped elsewhere.
    pub fn map_type(&mut self, from: TypeName, to: TypeName) -> Result<()> {
        insert_unique(&mut self.types, from, to, "type")
    }

    /// Records a field move or rename.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `from` is already mapped elsewhere.
    pub fn map_field(&mut self, from: FieldRef, to: FieldRef) -> Result<()> {
        if from == to {
            return Ok(());
        }
        insert_unique(&mut self.stage().fields, from, to, "field")
    }

    /// Records a method move or rename without extra parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `from` is already mapped elsewhere.
    pub fn map_method(&mut self, from: MethodRef, to: MethodRef) -> Result<()> {
        self.map_method_with(from, MethodLookup::unchanged(to))
    }

    /// Records a method move or rename.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] if `from` is already mapped elsewhere.
    pub fn map_method_with(&mut self, from: MethodRef, to: MethodLookup) -> Result<()> {
        if from == to.method && to.extra.is_empty() {
            return Ok(());
        }
        insert_unique(&mut self.stage().methods, from, to, "method")
    }

    /// Records the original of a relocated or synthesized method, for retracing.
    pub fn record_original(&mut self, method: MethodRef, original: MethodRef) {
        self.stage().originals.entry(method).or_insert(original);
    }

    /// Moves every entry of `other` into this builder, in the current stage.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Invariant`] on conflicting entries.
    pub fn absorb(&mut self, other: LensBuilder) -> Result<()> {
        for (from, to) in other.types {
            self.map_type(from, to)?;
        }
        for stage in [other.merge, other.fixups] {
            for (from, to) in stage.fields {
                self.map_field(from, to)?;
            }
            for (from, to) in stage.methods {
                self.map_method_with(from, to)?;
            }
            for (method, original) in stage.originals {
                self.record_original(method, original);
            }
        }
        Ok(())
    }

    /// Merge-stage field entries whose pre-merge holder is `holder`.
    pub(crate) fn merged_fields_of<'s>(
        &'s self,
        holder: &'s TypeName,
    ) -> impl Iterator<Item = (&'s FieldRef, &'s FieldRef)> + 's {
        self.merge.fields.iter().filter(move |(from, _)| from.holder == *holder)
    }

    /// Merge-stage method entries whose pre-merge holder is `holder`.
    pub(crate) fn merged_methods_of<'s>(
        &'s self,
        holder: &'s TypeName,
    ) -> impl Iterator<Item = (&'s MethodRef, &'s MethodLookup)> + 's {
        self.merge.methods.iter().filter(move |(from, _)| from.holder == *holder)
    }

    /// The classes merged so far, source to target.
    #[must_use]
    pub fn type_map(&self) -> &BTreeMap<TypeName, TypeName> {
        &self.types
    }

    /// Number of recorded member entries, both stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.merge.len() + self.fixups.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.len() == 0
    }

    /// Freezes the builder, composing merge entries with the fix-ups.
    #[must_use]
    pub fn freeze(self) -> RewriteLens {
        let mut lens = RewriteLens {
            types: self.types,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
            fixed_fields: self.fixups.fields,
            fixed_methods: self.fixups.methods,
            originals: BTreeMap::new(),
        };

        let fields: Vec<(FieldRef, FieldRef)> = self
            .merge
            .fields
            .into_iter()
            .map(|(from, to)| {
                let fixed = lens.fix_field(&to);
                (from, fixed)
            })
            .collect();
        lens.fields.extend(fields);

        let methods: Vec<(MethodRef, MethodLookup)> = self
            .merge
            .methods
            .into_iter()
            .map(|(from, to)| {
                let fixed = lens.fix_method(&to.method);
                (from, to.then(fixed))
            })
            .collect();
        lens.methods.extend(methods);

        for (method, original) in self.merge.originals {
            let fixed = lens.fix_method(&method).method;
            lens.originals.entry(fixed).or_insert(original);
        }
        for (method, original) in self.fixups.originals {
            lens.originals.entry(method).or_insert(original);
        }
        let renamed: Vec<(MethodRef, MethodRef)> = lens
            .fixed_methods
            .iter()
            .map(|(from, to)| (to.method.clone(), from.clone()))
            .collect();
        for (method, original) in renamed {
            lens.originals.entry(method).or_insert(original);
        }
        lens
    }
}

fn insert_unique<K, V>(map: &mut BTreeMap<K, V>, key: K, value: V, what: &str) -> Result<()>
where
    K: Ord + std::fmt::Debug,
    V: PartialEq + std::fmt::Debug,
{
    match map.get(&key) {
        Some(existing) if *existing != value => Err(invariant_error!(
            "{} {:?} mapped to both {:?} and {:?}",
            what,
            key,
            existing,
            value
        )),
        Some(_) => Ok(()),
        None => {
            map.insert(key, value);
            Ok(())
        }
    }
}

/// Frozen mapping from pre-merge references to their final replacements.
///
/// Every later phase rewrites the references it holds through this lens and never looks
/// up moved definitions in the program directly.
#[derive(Debug, Clone, Default)]
pub struct RewriteLens {
    types: BTreeMap<TypeName, TypeName>,
    fields: BTreeMap<FieldRef, FieldRef>,
    methods: BTreeMap<MethodRef, MethodLookup>,
    fixed_fields: BTreeMap<FieldRef, FieldRef>,
    fixed_methods: BTreeMap<MethodRef, MethodLookup>,
    originals: BTreeMap<MethodRef, MethodRef>,
}

impl RewriteLens {
    /// A lens that maps every reference to itself.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Returns true if the lens maps nothing.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.types.is_empty()
            && self.fields.is_empty()
            && self.methods.is_empty()
            && self.fixed_fields.is_empty()
            && self.fixed_methods.is_empty()
    }

    /// Rewrites a class name.
    #[must_use]
    pub fn rewrite_type(&self, name: &TypeName) -> TypeName {
        self.types.get(name).cloned().unwrap_or_else(|| name.clone())
    }

    /// Rewrites every class name inside a value type.
    #[must_use]
    pub fn rewrite_type_ref(&self, ty: &TypeRef) -> TypeRef {
        ty.map_classes(&|name: &TypeName| self.rewrite_type(name))
    }

    /// Rewrites a field reference.
    #[must_use]
    pub fn rewrite_field(&self, field: &FieldRef) -> FieldRef {
        if let Some(mapped) = self.fields.get(field) {
            return mapped.clone();
        }
        let moved = FieldRef {
            holder: self.rewrite_type(&field.holder),
            name: field.name.clone(),
            ty: field.ty.clone(),
        };
        self.fix_field(&moved)
    }

    /// Rewrites a method reference, returning the arguments call sites must append.
    #[must_use]
    pub fn rewrite_method(&self, method: &MethodRef) -> MethodLookup {
        if let Some(mapped) = self.methods.get(method) {
            return mapped.clone();
        }
        let moved = MethodRef::from_sig(self.rewrite_type(&method.holder), method.sig.clone());
        self.fix_method(&moved)
    }

    /// Rewrites any reference; extra parameters of methods are dropped.
    #[must_use]
    pub fn rewrite(&self, reference: &Reference) -> Reference {
        match reference {
            Reference::Type(name) => Reference::Type(self.rewrite_type(name)),
            Reference::Field(field) => Reference::Field(self.rewrite_field(field)),
            Reference::Method(method) => Reference::Method(self.rewrite_method(method).method),
        }
    }

    /// The pre-merge method a final method was created from, for retracing.
    ///
    /// Returns `None` for methods that were neither moved nor renamed.
    #[must_use]
    pub fn original_method(&self, method: &MethodRef) -> Option<&MethodRef> {
        self.originals.get(method)
    }

    /// Source classes and the target each was merged into.
    pub fn merged_classes(&self) -> impl Iterator<Item = (&TypeName, &TypeName)> {
        self.types.iter()
    }

    /// Returns true if `name` was merged into another class.
    #[must_use]
    pub fn is_merged_away(&self, name: &TypeName) -> bool {
        self.types.contains_key(name)
    }

    fn fix_field(&self, field: &FieldRef) -> FieldRef {
        if let Some(fixed) = self.fixed_fields.get(field) {
            return fixed.clone();
        }
        FieldRef {
            holder: field.holder.clone(),
            name: field.name.clone(),
            ty: self.rewrite_type_ref(&field.ty),
        }
    }

    fn fix_method(&self, method: &MethodRef) -> MethodLookup {
        if let Some(fixed) = self.fixed_methods.get(method) {
            return fixed.clone();
        }
        let proto = method
            .sig
            .proto
            .map_classes(&|name: &TypeName| self.rewrite_type(name));
        MethodLookup::unchanged(MethodRef::from_sig(
            method.holder.clone(),
            method.sig.with_proto(proto),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Proto, INIT};

    fn a() -> TypeName {
        TypeName::new("a.A")
    }

    fn b() -> TypeName {
        TypeName::new("a.B")
    }

    #[test]
    fn test_holder_fallback_and_signature_mapping() {
        let mut builder = LensBuilder::new();
        builder.map_type(b(), a()).unwrap();
        let lens = builder.freeze();

        let call = MethodRef::new(b(), "f", Proto::void(vec![TypeRef::Class(b())]));
        let rewritten = lens.rewrite_method(&call);
        assert_eq!(rewritten.method.holder, a());
        assert_eq!(rewritten.method.sig.proto.params, vec![TypeRef::Class(a())]);
        assert!(rewritten.extra.is_empty());

        let field = FieldRef::new(TypeName::new("a.X"), "f", TypeRef::array_of(TypeRef::Class(b())));
        assert_eq!(lens.rewrite_field(&field).ty, TypeRef::array_of(TypeRef::Class(a())));
        assert!(lens.is_merged_away(&b()));
        assert!(!lens.is_merged_away(&a()));
    }

    #[test]
    fn test_merge_entries_compose_with_fixups() {
        let mut builder = LensBuilder::new();
        builder.map_type(b(), a()).unwrap();
        let entry = MethodRef::new(a(), INIT, Proto::void(vec![TypeRef::Int]));
        builder
            .map_method_with(
                MethodRef::new(b(), INIT, Proto::void(vec![])),
                MethodLookup::with_extra(entry.clone(), vec![ExtraParameter::ClassId(1)]),
            )
            .unwrap();

        builder.begin_fixups();
        let marker = TypeName::new("a.Marker");
        let renamed = MethodRef::new(
            a(),
            INIT,
            Proto::void(vec![TypeRef::Int, TypeRef::Class(marker.clone())]),
        );
        builder
            .map_method_with(
                entry,
                MethodLookup::with_extra(renamed.clone(), vec![ExtraParameter::UnusedNull(marker.clone())]),
            )
            .unwrap();

        let lens = builder.freeze();
        let lookup = lens.rewrite_method(&MethodRef::new(b(), INIT, Proto::void(vec![])));
        assert_eq!(lookup.method, renamed);
        assert_eq!(
            lookup.extra,
            vec![ExtraParameter::ClassId(1), ExtraParameter::UnusedNull(marker)]
        );
        assert_eq!(lookup.extra[0].push_instruction(), Instruction::ConstInt(1));
    }

    #[test]
    fn test_conflicting_entries_are_invariant_errors() {
        let mut builder = LensBuilder::new();
        builder.map_type(b(), a()).unwrap();
        builder.map_type(b(), a()).unwrap();
        assert!(builder.map_type(b(), TypeName::new("a.C")).is_err());
    }

    #[test]
    fn test_original_method_follows_renames() {
        let mut builder = LensBuilder::new();
        let moved = MethodRef::new(a(), "f$B", Proto::void(vec![]));
        let original = MethodRef::new(b(), "f", Proto::void(vec![]));
        builder.record_original(moved.clone(), original.clone());
        builder.begin_fixups();
        let renamed = MethodRef::new(a(), "f$B$1", Proto::void(vec![]));
        builder.map_method(moved, renamed.clone()).unwrap();

        let lens = builder.freeze();
        assert_eq!(lens.original_method(&renamed), Some(&original));
        assert!(RewriteLens::identity().is_identity());
    }
}
