//! Three-valued logic for `and`/`or`/`xor`/`implies`/`not`.
//!
//! Encoding emptiness as a dedicated `Unknown` variant here, rather than
//! rechecking `Collection::is_empty()` at every boolean operator site,
//! keeps the truth tables in one place.

use crate::model::{Collection, FhirPathValue};

/// Boolean extended with "unknown" (FHIRPath's empty-as-unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tribool {
    True,
    False,
    Unknown,
}

impl Tribool {
    /// Map a (possibly non-boolean, possibly multi-element) focus
    /// collection to a Tribool: singleton `true`/`false` map directly,
    /// anything else — empty, non-boolean, or multi-element — is
    /// `Unknown`. Multi-element and wrong-type are folded into `Unknown`
    /// rather than erroring here; operators decide whether that's fatal.
    pub fn from_collection(c: &Collection) -> Tribool {
        match c.as_singleton() {
            Some(FhirPathValue::Boolean(true)) => Tribool::True,
            Some(FhirPathValue::Boolean(false)) => Tribool::False,
            _ => Tribool::Unknown,
        }
    }

    pub fn to_collection(self) -> Collection {
        match self {
            Tribool::True => Collection::single(FhirPathValue::Boolean(true)),
            Tribool::False => Collection::single(FhirPathValue::Boolean(false)),
            Tribool::Unknown => Collection::empty(),
        }
    }

    pub fn and(self, other: Tribool) -> Tribool {
        match (self, other) {
            (Tribool::False, _) | (_, Tribool::False) => Tribool::False,
            (Tribool::True, Tribool::True) => Tribool::True,
            _ => Tribool::Unknown,
        }
    }

    pub fn or(self, other: Tribool) -> Tribool {
        match (self, other) {
            (Tribool::True, _) | (_, Tribool::True) => Tribool::True,
            (Tribool::False, Tribool::False) => Tribool::False,
            _ => Tribool::Unknown,
        }
    }

    pub fn xor(self, other: Tribool) -> Tribool {
        match (self, other) {
            (Tribool::Unknown, _) | (_, Tribool::Unknown) => Tribool::Unknown,
            (a, b) => Tribool::from(a.as_bool().unwrap() != b.as_bool().unwrap()),
        }
    }

    pub fn implies(self, other: Tribool) -> Tribool {
        match self {
            Tribool::False => Tribool::True,
            Tribool::True => other,
            Tribool::Unknown => match other {
                Tribool::True => Tribool::True,
                _ => Tribool::Unknown,
            },
        }
    }

    pub fn not(self) -> Tribool {
        match self {
            Tribool::True => Tribool::False,
            Tribool::False => Tribool::True,
            Tribool::Unknown => Tribool::Unknown,
        }
    }

    fn as_bool(self) -> Option<bool> {
        match self {
            Tribool::True => Some(true),
            Tribool::False => Some(false),
            Tribool::Unknown => None,
        }
    }
}

impl From<bool> for Tribool {
    fn from(b: bool) -> Self {
        if b {
            Tribool::True
        } else {
            Tribool::False
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use Tribool::{False, True, Unknown};

    #[rstest]
    #[case(True, True, True)]
    #[case(True, False, False)]
    #[case(True, Unknown, Unknown)]
    #[case(False, True, False)]
    #[case(False, False, False)]
    #[case(False, Unknown, False)]
    #[case(Unknown, True, Unknown)]
    #[case(Unknown, False, False)]
    #[case(Unknown, Unknown, Unknown)]
    fn and_truth_table(#[case] lhs: Tribool, #[case] rhs: Tribool, #[case] expected: Tribool) {
        assert_eq!(lhs.and(rhs), expected);
    }

    #[rstest]
    #[case(True, True, True)]
    #[case(True, False, True)]
    #[case(True, Unknown, True)]
    #[case(False, True, True)]
    #[case(False, False, False)]
    #[case(False, Unknown, Unknown)]
    #[case(Unknown, True, True)]
    #[case(Unknown, False, Unknown)]
    #[case(Unknown, Unknown, Unknown)]
    fn or_truth_table(#[case] lhs: Tribool, #[case] rhs: Tribool, #[case] expected: Tribool) {
        assert_eq!(lhs.or(rhs), expected);
    }

    #[rstest]
    #[case(True, False)]
    #[case(False, True)]
    #[case(Unknown, Unknown)]
    fn not_table(#[case] input: Tribool, #[case] expected: Tribool) {
        assert_eq!(input.not(), expected);
    }

    #[rstest]
    #[case(True, True, True)]
    #[case(True, False, False)]
    #[case(False, True, True)]
    #[case(False, False, True)]
    #[case(Unknown, True, True)]
    #[case(Unknown, False, Unknown)]
    #[case(Unknown, Unknown, Unknown)]
    fn implies_table(#[case] lhs: Tribool, #[case] rhs: Tribool, #[case] expected: Tribool) {
        assert_eq!(lhs.implies(rhs), expected);
    }
}
