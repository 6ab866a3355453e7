//! Merge groups.

use std::fmt;

use crate::program::{ClassId, Program};

/// An ordered set of classes that will be merged into one.
///
/// Until [`crate::policy::policies::FinalizeMergeGroup`] runs, a group is just an ordered
/// candidate set. Finalization chooses the target and moves it to the front, so that
/// afterwards `classes()[0]` is the target and the remaining classes are the sources in
/// group order. Class ids of the merged class follow this order: the target gets `0`.
#[derive(Clone, PartialEq, Eq)]
pub struct MergeGroup {
    classes: Vec<ClassId>,
    target: Option<ClassId>,
    required_target: Option<ClassId>,
}

impl MergeGroup {
    /// Creates a group from classes in their deterministic order.
    #[must_use]
    pub fn new(classes: Vec<ClassId>) -> Self {
        MergeGroup {
            classes,
            target: None,
            required_target: None,
        }
    }

    /// Classes in group order.
    #[must_use]
    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    /// Number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if the group has no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// A group of fewer than two classes merges nothing.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.classes.len() < 2
    }

    /// Returns true if `class` is a member.
    #[must_use]
    pub fn contains(&self, class: ClassId) -> bool {
        self.classes.contains(&class)
    }

    /// The chosen target, once the group is finalized.
    #[must_use]
    pub fn target(&self) -> Option<ClassId> {
        self.target
    }

    /// Members other than the target, in group order.
    pub fn sources(&self) -> impl Iterator<Item = ClassId> + '_ {
        let target = self.target;
        self.classes.iter().copied().filter(move |c| Some(*c) != target)
    }

    /// Class that must become the target, if a policy demanded one.
    #[must_use]
    pub fn required_target(&self) -> Option<ClassId> {
        self.required_target
    }

    /// Demands that `class` becomes the target.
    pub fn require_target(&mut self, class: ClassId) {
        self.required_target = Some(class);
    }

    /// Appends a class.
    pub fn push(&mut self, class: ClassId) {
        self.classes.push(class);
    }

    /// Keeps only the classes for which `keep` returns true.
    pub fn retain<F: FnMut(ClassId) -> bool>(&mut self, mut keep: F) {
        self.classes.retain(|c| keep(*c));
        if self.required_target.is_some_and(|t| !self.classes.contains(&t)) {
            self.required_target = None;
        }
        if self.target.is_some_and(|t| !self.classes.contains(&t)) {
            self.target = None;
        }
    }

    /// Creates a sub-group of `classes`, carrying over the required target when it is
    /// among them.
    #[must_use]
    pub fn subgroup(&self, classes: Vec<ClassId>) -> MergeGroup {
        let required_target = self.required_target.filter(|t| classes.contains(t));
        MergeGroup {
            classes,
            target: None,
            required_target,
        }
    }

    /// Makes `target` the target and moves it to the front.
    ///
    /// Returns false if `target` is not a member.
    pub fn set_target(&mut self, target: ClassId) -> bool {
        let Some(position) = self.classes.iter().position(|c| *c == target) else {
            return false;
        };
        let class = self.classes.remove(position);
        self.classes.insert(0, class);
        self.target = Some(target);
        true
    }

    /// Class id assigned to `class` in the merged target.
    #[must_use]
    pub fn class_id_of(&self, class: ClassId) -> Option<i32> {
        self.classes
            .iter()
            .position(|c| *c == class)
            .and_then(|p| i32::try_from(p).ok())
    }

    /// Renders the member names, for logging.
    #[must_use]
    pub fn describe(&self, program: &Program) -> String {
        let names: Vec<String> = self
            .classes
            .iter()
            .map(|c| {
                program
                    .class(*c)
                    .map_or_else(|| c.to_string(), |class| class.name.to_string())
            })
            .collect();
        format!("[{}]", names.join(", "))
    }
}

impl fmt::Debug for MergeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeGroup")
            .field("classes", &self.classes)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[usize]) -> Vec<ClassId> {
        raw.iter().copied().map(ClassId::new).collect()
    }

    #[test]
    fn test_set_target_moves_to_front() {
        let mut group = MergeGroup::new(ids(&[1, 2, 3]));
        assert!(group.set_target(ClassId::new(3)));
        assert_eq!(group.classes(), ids(&[3, 1, 2]).as_slice());
        assert_eq!(group.sources().collect::<Vec<_>>(), ids(&[1, 2]));
        assert_eq!(group.class_id_of(ClassId::new(2)), Some(2));
        assert!(!group.set_target(ClassId::new(9)));
    }

    #[test]
    fn test_retain_clears_required_target() {
        let mut group = MergeGroup::new(ids(&[1, 2, 3]));
        group.require_target(ClassId::new(2));
        let sub = group.subgroup(ids(&[2, 3]));
        assert_eq!(sub.required_target(), Some(ClassId::new(2)));

        group.retain(|c| c.index() != 2);
        assert_eq!(group.required_target(), None);
        assert!(!group.is_trivial());
        group.retain(|c| c.index() == 1);
        assert!(group.is_trivial());
    }
}
