//! Access checks for merged virtual methods.

use rustc_hash::FxHashMap;

use crate::{
    merger::MergePlan,
    program::{MethodSig, Program, SubtypeIndex, Visibility},
};

/// Checks that no subclass of a group member overrides a merged virtual method with weaker
/// access than the merged method ends up with.
///
/// Merging widens a virtual method to the most permissive access of its declarations. An
/// existing override with narrower access would no longer load.
///
/// # Errors
///
/// Returns a description of the first offending override.
pub fn validate_access(program: &Program, subtypes: &SubtypeIndex, plan: &MergePlan) -> Result<(), String> {
    let merged: FxHashMap<&MethodSig, Visibility> = plan.virtual_methods().collect();
    if merged.is_empty() {
        return Ok(());
    }
    for member in plan.member_names() {
        for subtype in subtypes.all_subtypes(member) {
            let Some(class) = program.class_by_name(&subtype) else {
                continue;
            };
            for method in class.methods.iter().filter(|m| m.is_virtual()) {
                let Some(required) = merged.get(&method.sig) else {
                    continue;
                };
                if method.visibility() < *required {
                    return Err(format!(
                        "{}.{} is {:?} but overrides a merged method that became {:?}",
                        class.name,
                        method.sig,
                        method.visibility(),
                        required
                    ));
                }
            }
        }
    }
    Ok(())
}
