use serde::Serialize;
use thiserror::Error;

use crate::models::{ComparisonMethod, EntityKind, FieldClassification, FilterCondition, ValueType};

/// How many arguments a comparison method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Exactly(n) => count == n,
            Self::AtLeast(n) => count >= n,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {}", n),
            Self::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// What went wrong with a single filter condition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileErrorKind {
    #[error("unknown field `{field}`")]
    UnknownField { field: String },

    #[error("field `{field}` is classified {actual}, but the condition declares {declared}")]
    ClassificationMismatch {
        field: String,
        declared: FieldClassification,
        actual: FieldClassification,
    },

    #[error("periodic field `{field}` requires a round number")]
    MissingRoundNumber { field: String },

    #[error("round {round} is out of range for `{field}`, which has {number_of_rounds} round(s)")]
    RoundNumberOutOfRange {
        field: String,
        round: u32,
        number_of_rounds: u32,
    },

    #[error("{method} expects {expected} argument(s), got {actual}")]
    InvalidArgumentCount {
        method: ComparisonMethod,
        expected: Arity,
        actual: usize,
    },

    #[error("argument `{argument}` is not a valid {value_type} value for `{field}`")]
    InvalidArgumentType {
        field: String,
        value_type: ValueType,
        argument: String,
    },

    #[error("{owner} field `{field}` cannot be used in {context} filters")]
    CrossEntityField {
        field: String,
        owner: EntityKind,
        context: EntityKind,
    },

    #[error("{method} is not supported for {value_type} field `{field}`")]
    UnsupportedComparison {
        field: String,
        method: ComparisonMethod,
        value_type: ValueType,
    },
}

impl CompileErrorKind {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownField { .. } => "UnknownFieldError",
            Self::ClassificationMismatch { .. } => "ClassificationMismatchError",
            Self::MissingRoundNumber { .. } => "MissingRoundNumberError",
            Self::RoundNumberOutOfRange { .. } => "RoundNumberOutOfRangeError",
            Self::InvalidArgumentCount { .. } => "InvalidArgumentCountError",
            Self::InvalidArgumentType { .. } => "InvalidArgumentTypeError",
            Self::CrossEntityField { .. } => "CrossEntityFieldError",
            Self::UnsupportedComparison { .. } => "UnsupportedComparisonError",
        }
    }
}

/// Position of a condition inside the criteria.
///
/// `block` is `None` for household-level filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConditionLocation {
    pub rule: usize,
    pub block: Option<usize>,
    pub filter: usize,
}

impl ConditionLocation {
    pub fn household(rule: usize, filter: usize) -> Self {
        Self {
            rule,
            block: None,
            filter,
        }
    }

    pub fn block(rule: usize, block: usize, filter: usize) -> Self {
        Self {
            rule,
            block: Some(block),
            filter,
        }
    }
}

impl std::fmt::Display for ConditionLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.block {
            Some(block) => write!(
                f,
                "rule {}, individual block {}, filter {}",
                self.rule, block, self.filter
            ),
            None => write!(f, "rule {}, household filter {}", self.rule, self.filter),
        }
    }
}

/// A terminal compile failure, carrying the offending condition.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} ({location})")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub location: ConditionLocation,
    pub condition: FilterCondition,
}

impl CompileError {
    pub fn new(
        kind: CompileErrorKind,
        location: ConditionLocation,
        condition: &FilterCondition,
    ) -> Self {
        Self {
            kind,
            location,
            condition: condition.clone(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
