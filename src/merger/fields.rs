//! Field merging.
//!
//! Instance fields of all members are packed into shared slots. A source field joins a slot
//! of the target layout in three passes:
//!
//! 1. a slot assigned from the same constructor parameter (`this.f = arg_k`) with a
//!    compatible type
//! 2. a slot of exactly the same type
//! 3. otherwise a new slot
//!
//! Reference slots are widened to the least upper bound of their occupants; readers of a
//! widened slot get a `checkcast` back to the type they expect when the lens is applied.
//! Primitive slots never change type, and neither do slots of pinned target fields. Static
//! fields are never shared, each one is relocated, renamed if its name is taken.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{
    merger::plan::MergeContext,
    program::{ClassDef, FieldAccessFlags, FieldDef, FieldRef, Instruction},
    Result,
};

const LAYOUT_FLAGS: FieldAccessFlags = FieldAccessFlags::VOLATILE.union(FieldAccessFlags::TRANSIENT);

struct Slot {
    def: FieldDef,
    role: Option<u16>,
    occupants: Vec<usize>,
    all_final: bool,
}

impl Slot {
    fn accepts(&self, member: usize, field: &FieldDef) -> bool {
        if self.occupants.contains(&member) {
            return false;
        }
        if self.def.flags & LAYOUT_FLAGS != field.flags & LAYOUT_FLAGS {
            return false;
        }
        // a pinned field keeps its exact signature and finality
        if self.def.pinned {
            return self.def.ty == field.ty && self.def.is_final() == field.is_final();
        }
        self.def.ty == field.ty || (self.def.ty.is_reference() && field.ty.is_reference())
    }
}

/// The constructor parameter each field is assigned from, by field name.
///
/// Only the `this.f = arg` pattern counts; the first constructor that assigns a field
/// decides its role.
fn constructor_roles(class: &ClassDef) -> FxHashMap<Arc<str>, u16> {
    let mut roles = FxHashMap::default();
    for constructor in class.constructors() {
        let Some(code) = &constructor.code else {
            continue;
        };
        for window in code.instructions.windows(3) {
            if let [Instruction::Load(0), Instruction::Load(arg), Instruction::PutField(field)] = window {
                if *arg > 0 && field.holder == class.name {
                    roles.entry(field.name.clone()).or_insert(*arg);
                }
            }
        }
    }
    roles
}

/// Merges the fields of every member and records where each one went.
///
/// Returns the field definitions of the merged class: instance slots first, then statics.
pub(crate) fn merge_fields(ctx: &mut MergeContext<'_>) -> Result<Vec<FieldDef>> {
    let target = ctx.target();
    let target_roles = constructor_roles(target);
    let mut slots: Vec<Slot> = target
        .instance_fields()
        .map(|f| Slot {
            def: f.clone(),
            role: target_roles.get(&f.name).copied(),
            occupants: vec![0],
            all_final: f.is_final(),
        })
        .collect();
    let mut placement: Vec<(usize, FieldDef, usize)> = target
        .instance_fields()
        .enumerate()
        .map(|(index, f)| (0, f.clone(), index))
        .collect();

    let members = ctx.members.clone();
    for (member_index, member) in members.iter().enumerate().skip(1) {
        let roles = constructor_roles(member);
        let mut pending: Vec<&FieldDef> = member.instance_fields().collect();

        pending.retain(|field| {
            let Some(role) = roles.get(&field.name).copied() else {
                return true;
            };
            let found = slots
                .iter()
                .position(|s| s.role == Some(role) && s.accepts(member_index, field));
            match found {
                Some(index) => {
                    slots[index].occupants.push(member_index);
                    placement.push((member_index, (*field).clone(), index));
                    false
                }
                None => true,
            }
        });

        pending.retain(|field| {
            let found = slots
                .iter()
                .position(|s| s.def.ty == field.ty && s.accepts(member_index, field));
            match found {
                Some(index) => {
                    slots[index].occupants.push(member_index);
                    placement.push((member_index, (*field).clone(), index));
                    false
                }
                None => true,
            }
        });

        for field in pending {
            let name = ctx.claim_field(&field.name);
            let mut def = field.clone();
            def.name = name;
            slots.push(Slot {
                def,
                role: roles.get(&field.name).copied(),
                occupants: vec![member_index],
                all_final: field.is_final(),
            });
            placement.push((member_index, field.clone(), slots.len() - 1));
        }
    }

    for (member_index, field, slot_index) in &placement {
        let member = members[*member_index];
        let slot = &mut slots[*slot_index];
        if slot.def.ty != field.ty {
            if slot.def.pinned {
                return Err(incompatible!(
                    member.name,
                    "field {} would change the type of pinned field {}",
                    field.name,
                    slot.def.name
                ));
            }
            let widened = ctx
                .program
                .least_upper_bound(&ctx.map_group_type(&slot.def.ty), &ctx.map_group_type(&field.ty))
                .ok_or_else(|| {
                    incompatible!(member.name, "field {} cannot share a slot of type {}", field.name, slot.def.ty)
                })?;
            slot.def.ty = widened;
        }
        if field.flags.visibility() > slot.def.flags.visibility() {
            slot.def.flags = slot.def.flags.with_visibility(field.flags.visibility());
        }
        slot.all_final &= field.is_final();
    }

    let target_id = ctx.target_id;
    let target_name = ctx.target_name().clone();
    let mut result = Vec::with_capacity(slots.len());
    for slot in &mut slots {
        if !slot.all_final {
            slot.def.flags.remove(FieldAccessFlags::FINAL);
        }
        slot.def.holder = target_id;
    }
    for (member_index, field, slot_index) in placement {
        let member = members[member_index];
        let slot = &slots[slot_index];
        let from = member.field_ref(&field);
        let to = FieldRef::new(target_name.clone(), &slot.def.name, slot.def.ty.clone());
        ctx.lens.map_field(from.clone(), to.clone())?;
        ctx.field_map.insert(from, to);
    }
    result.extend(slots.into_iter().map(|s| s.def));

    for (member_index, member) in members.iter().enumerate() {
        for field in member.static_fields() {
            let mut def = field.clone();
            if member_index > 0 {
                def.name = ctx.claim_field(&field.name);
            }
            def.holder = target_id;
            let from = member.field_ref(field);
            let to = FieldRef::new(target_name.clone(), &def.name, def.ty.clone());
            ctx.lens.map_field(from.clone(), to.clone())?;
            ctx.field_map.insert(from, to);
            result.push(def);
        }
    }
    Ok(result)
}
