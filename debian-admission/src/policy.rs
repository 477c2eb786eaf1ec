// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Which validation failures a caller may force past. */

use {
    crate::error::{AdmissionError, Result},
    std::collections::BTreeSet,
};

/// How strictly a `.changes` field is required.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldRequirement {
    /// Absence is always fatal.
    Mandatory,
    /// Absence is fatal unless tolerated by a [ForcePolicy].
    Overridable,
}

/// Fields of a `.changes` file, in the order they are checked.
pub const CHANGES_FIELDS: &[(&str, FieldRequirement)] = &[
    ("Format", FieldRequirement::Overridable),
    ("Date", FieldRequirement::Overridable),
    ("Source", FieldRequirement::Mandatory),
    ("Binary", FieldRequirement::Mandatory),
    ("Architecture", FieldRequirement::Mandatory),
    ("Version", FieldRequirement::Mandatory),
    ("Distribution", FieldRequirement::Mandatory),
    ("Urgency", FieldRequirement::Overridable),
    ("Maintainer", FieldRequirement::Overridable),
    ("Description", FieldRequirement::Overridable),
    ("Changes", FieldRequirement::Overridable),
    ("Files", FieldRequirement::Mandatory),
];

/// Look up the requirement of a `.changes` field.
pub fn changes_field_requirement(name: &str) -> Option<FieldRequirement> {
    CHANGES_FIELDS
        .iter()
        .find(|(field, _)| field.eq_ignore_ascii_case(name))
        .map(|(_, requirement)| *requirement)
}

/// The set of problems an admission is allowed to proceed past.
///
/// The default policy is strict: nothing is tolerated.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ForcePolicy {
    tolerated_missing: BTreeSet<String>,
    allow_undeclared_architecture: bool,
}

impl ForcePolicy {
    /// A policy tolerating nothing.
    pub fn strict() -> Self {
        Self::default()
    }

    /// A policy tolerating everything that can be tolerated.
    pub fn forced() -> Self {
        Self {
            tolerated_missing: CHANGES_FIELDS
                .iter()
                .filter(|(_, requirement)| *requirement == FieldRequirement::Overridable)
                .map(|(name, _)| name.to_string())
                .collect(),
            allow_undeclared_architecture: true,
        }
    }

    /// Tolerate absence of the named `.changes` field.
    ///
    /// Errors if the field is mandatory or not a known `.changes` field.
    pub fn tolerate_missing(mut self, field: &str) -> Result<Self> {
        match changes_field_requirement(field) {
            Some(FieldRequirement::Overridable) => {
                self.tolerated_missing.insert(
                    CHANGES_FIELDS
                        .iter()
                        .find(|(name, _)| name.eq_ignore_ascii_case(field))
                        .map(|(name, _)| name.to_string())
                        .unwrap_or_else(|| field.to_string()),
                );
                Ok(self)
            }
            _ => Err(AdmissionError::FieldNotOverridable(
                ".changes".to_string(),
                field.to_string(),
            )),
        }
    }

    /// Admit binaries whose architecture the distribution does not declare.
    pub fn allow_undeclared_architecture(mut self, allow: bool) -> Self {
        self.allow_undeclared_architecture = allow;
        self
    }

    /// Whether absence of the named field is tolerated.
    pub fn tolerates_missing(&self, field: &str) -> bool {
        self.tolerated_missing
            .iter()
            .any(|name| name.eq_ignore_ascii_case(field))
    }

    /// Whether binaries of undeclared architectures are admitted.
    pub fn allows_undeclared_architecture(&self) -> bool {
        self.allow_undeclared_architecture
    }
}

/// Caller-supplied placement of admitted packages.
///
/// Each value, when set, replaces what would otherwise be read or guessed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Overrides {
    pub component: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_tolerates_nothing() {
        let policy = ForcePolicy::strict();
        assert!(CHANGES_FIELDS
            .iter()
            .all(|(name, _)| !policy.tolerates_missing(name)));
        assert!(!policy.allows_undeclared_architecture());
    }

    #[test]
    fn forced_tolerates_overridable_only() {
        let policy = ForcePolicy::forced();
        assert!(policy.tolerates_missing("date"));
        assert!(policy.tolerates_missing("Changes"));
        assert!(!policy.tolerates_missing("Source"));
        assert!(!policy.tolerates_missing("Files"));
        assert!(policy.allows_undeclared_architecture());
    }

    #[test]
    fn tolerate_individually() -> Result<()> {
        let policy = ForcePolicy::strict().tolerate_missing("urgency")?;
        assert!(policy.tolerates_missing("Urgency"));
        assert!(!policy.tolerates_missing("Date"));

        assert!(ForcePolicy::strict().tolerate_missing("Version").is_err());
        assert!(ForcePolicy::strict().tolerate_missing("Bogus").is_err());

        Ok(())
    }
}
