//! Structured diagnostics for merge decisions.
//!
//! Every class that a policy removes from merging, every group that is abandoned halfway,
//! and every completed merge is recorded as a [`Diagnostic`]. Compatibility tooling relies
//! on these records to explain why a class was not merged, so rejections are never
//! skipped silently.
//!
//! # Example
//!
//! ```rust,ignore
//! use classfold::diagnostics::{DiagnosticKind, DiagnosticLog};
//!
//! let log = DiagnosticLog::new();
//! log.record(DiagnosticKind::PolicyRejection)
//!     .policy("NoNativeMethods")
//!     .class(name)
//!     .message("declares native method nativeHash()");
//!
//! for diagnostic in log.rejected_by("NoNativeMethods") {
//!     println!("{diagnostic}");
//! }
//! ```

use std::{collections::BTreeMap, fmt};

use strum::{Display, EnumIter, IntoStaticStr};

use crate::program::TypeName;

/// Categories of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum DiagnosticKind {
    /// A policy excluded classes from merging
    PolicyRejection,
    /// A group was abandoned while building its merge plan
    StructuralIncompatibility,
    /// A group was abandoned because a merged member would be overridden with weaker access
    AccessViolation,
    /// A group was merged
    Merged,
    /// Informational message
    Info,
}

impl DiagnosticKind {
    /// Returns true for kinds that explain why classes stayed unmerged.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::PolicyRejection | Self::StructuralIncompatibility | Self::AccessViolation
        )
    }
}

/// A single merge decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Category
    pub kind: DiagnosticKind,
    /// Policy or phase that produced the diagnostic
    pub policy: &'static str,
    /// Affected classes, in group order
    pub classes: Vec<TypeName>,
    /// Human-readable explanation
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: ", self.kind, self.policy)?;
        for (index, class) in self.classes.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{class}")?;
        }
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}

/// Builder for diagnostics with a fluent API.
///
/// Created by [`DiagnosticLog::record`]. The diagnostic is added to the log when the
/// builder is dropped.
pub struct DiagnosticBuilder<'a> {
    log: &'a DiagnosticLog,
    kind: DiagnosticKind,
    policy: &'static str,
    classes: Vec<TypeName>,
    message: Option<String>,
}

impl DiagnosticBuilder<'_> {
    /// Names the policy or phase responsible.
    pub fn policy(mut self, policy: &'static str) -> Self {
        self.policy = policy;
        self
    }

    /// Adds an affected class.
    pub fn class(mut self, class: TypeName) -> Self {
        self.classes.push(class);
        self
    }

    /// Adds several affected classes.
    pub fn classes<I: IntoIterator<Item = TypeName>>(mut self, classes: I) -> Self {
        self.classes.extend(classes);
        self
    }

    /// Sets the explanation.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Drop for DiagnosticBuilder<'_> {
    fn drop(&mut self) {
        let diagnostic = Diagnostic {
            kind: self.kind,
            policy: self.policy,
            classes: std::mem::take(&mut self.classes),
            message: self.message.take().unwrap_or_default(),
        };
        if self.log.verbose && diagnostic.kind.is_rejection() {
            log::info!("{diagnostic}");
        } else {
            log::debug!("{diagnostic}");
        }
        self.log.entries.push(diagnostic);
    }
}

/// Append-only collection of diagnostics.
///
/// Diagnostics can be recorded through a shared reference from several threads; the
/// merger itself records in a deterministic order so that the log of two runs over the
/// same program is identical.
#[derive(Debug)]
pub struct DiagnosticLog {
    entries: boxcar::Vec<Diagnostic>,
    verbose: bool,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self {
            entries: boxcar::Vec::new(),
            verbose: false,
        }
    }
}

impl Clone for DiagnosticLog {
    fn clone(&self) -> Self {
        let log = DiagnosticLog {
            entries: boxcar::Vec::new(),
            verbose: self.verbose,
        };
        for (_, diagnostic) in &self.entries {
            log.entries.push(diagnostic.clone());
        }
        log
    }
}

impl DiagnosticLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty log that logs rejections at info level.
    #[must_use]
    pub fn verbose() -> Self {
        DiagnosticLog {
            entries: boxcar::Vec::new(),
            verbose: true,
        }
    }

    /// Starts building a diagnostic of the given kind.
    pub fn record(&self, kind: DiagnosticKind) -> DiagnosticBuilder<'_> {
        DiagnosticBuilder {
            log: self,
            kind,
            policy: "",
            classes: Vec::new(),
            message: None,
        }
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.record(DiagnosticKind::Info).message(message);
    }

    /// Number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.count()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.count() == 0
    }

    /// Iterates diagnostics in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.iter().filter(move |d| d.kind == kind)
    }

    /// Rejections attributed to `policy`.
    pub fn rejected_by<'a>(&'a self, policy: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.iter()
            .filter(move |d| d.kind.is_rejection() && d.policy == policy)
    }

    /// Diagnostics mentioning `class`.
    pub fn for_class<'a>(&'a self, class: &'a TypeName) -> impl Iterator<Item = &'a Diagnostic> {
        self.iter().filter(move |d| d.classes.contains(class))
    }

    /// Returns true if `class` was rejected by `policy`.
    #[must_use]
    pub fn was_rejected(&self, class: &TypeName, policy: &str) -> bool {
        self.rejected_by(policy).any(|d| d.classes.contains(class))
    }

    /// Appends all diagnostics of `other`.
    pub fn merge(&self, other: &DiagnosticLog) {
        for (_, diagnostic) in &other.entries {
            self.entries.push(diagnostic.clone());
        }
    }

    /// Rejection counts per policy, sorted by policy name.
    #[must_use]
    pub fn rejection_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in self.iter().filter(|d| d.kind.is_rejection()) {
            *counts.entry(diagnostic.policy).or_insert(0) += diagnostic.classes.len();
        }
        counts
    }

    /// One-line summary of the log.
    #[must_use]
    pub fn summary(&self) -> String {
        let merged = self.of_kind(DiagnosticKind::Merged).count();
        let rejected: usize = self.rejection_counts().values().sum();
        let mut summary = format!("{merged} groups merged, {rejected} classes rejected");
        for (policy, count) in self.rejection_counts() {
            summary.push_str(&format!("; {policy}: {count}"));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_query() {
        let log = DiagnosticLog::new();
        let a = TypeName::new("a.A");
        let b = TypeName::new("a.B");

        log.record(DiagnosticKind::PolicyRejection)
            .policy("NoNativeMethods")
            .class(a.clone())
            .message("declares native method");
        log.record(DiagnosticKind::Merged)
            .policy("ClassMerger")
            .classes([b.clone(), TypeName::new("a.C")]);

        assert_eq!(log.len(), 2);
        assert!(log.was_rejected(&a, "NoNativeMethods"));
        assert!(!log.was_rejected(&b, "NoNativeMethods"));
        assert_eq!(log.for_class(&b).count(), 1);
        assert_eq!(log.rejection_counts().get("NoNativeMethods"), Some(&1));
        assert_eq!(
            log.summary(),
            "1 groups merged, 1 classes rejected; NoNativeMethods: 1"
        );
    }

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::PolicyRejection,
            policy: "NoKeptClasses",
            classes: vec![TypeName::new("a.A")],
            message: "pinned".to_string(),
        };
        assert_eq!(diagnostic.to_string(), "[PolicyRejection] NoKeptClasses: a.A (pinned)");
    }
}
