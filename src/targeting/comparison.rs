//! Comparison methods, checked and coerced once at compile time.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::error::{Arity, CompileErrorKind};
use super::value::TypedValue;
use crate::models::{ComparisonMethod, FieldDescriptor, ValueType};

/// A validated comparison with arguments already coerced to the field type.
///
/// Evaluation is infallible: every argument problem is reported by
/// [`Comparison::compile`].
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Equals(TypedValue),
    NotEquals(TypedValue),
    /// `EQUALS` on a multi-select field: every selected option is in the set.
    InSet(BTreeSet<String>),
    /// `NOT_EQUALS` on a multi-select field.
    NotInSet(BTreeSet<String>),
    Substring(String),
    /// `CONTAINS` on a multi-select field: at least one selected option is in the set.
    Intersects(BTreeSet<String>),
    Range(TypedValue, TypedValue),
    GreaterThan(TypedValue),
    LessThan(TypedValue),
}

/// Number of arguments `method` takes for a field of `value_type`.
pub fn arity(method: ComparisonMethod, value_type: ValueType) -> Arity {
    match method {
        ComparisonMethod::Equals | ComparisonMethod::NotEquals | ComparisonMethod::Contains
            if value_type == ValueType::List =>
        {
            Arity::AtLeast(1)
        }
        ComparisonMethod::Range => Arity::Exactly(2),
        _ => Arity::Exactly(1),
    }
}

pub fn supports(method: ComparisonMethod, value_type: ValueType) -> bool {
    match method {
        ComparisonMethod::Equals | ComparisonMethod::NotEquals => true,
        ComparisonMethod::Contains => matches!(value_type, ValueType::String | ValueType::List),
        ComparisonMethod::Range | ComparisonMethod::GreaterThan | ComparisonMethod::LessThan => {
            value_type.is_ordered()
        }
    }
}

impl Comparison {
    pub fn compile(
        descriptor: &FieldDescriptor,
        method: ComparisonMethod,
        arguments: &[String],
    ) -> Result<Self, CompileErrorKind> {
        let value_type = descriptor.value_type;
        if !supports(method, value_type) {
            return Err(CompileErrorKind::UnsupportedComparison {
                field: descriptor.name.clone(),
                method,
                value_type,
            });
        }

        let expected = arity(method, value_type);
        if !expected.accepts(arguments.len()) {
            return Err(CompileErrorKind::InvalidArgumentCount {
                method,
                expected,
                actual: arguments.len(),
            });
        }

        let scalar = |i: usize| coerce(descriptor, &arguments[i]);
        let comparison = match method {
            ComparisonMethod::Equals if value_type == ValueType::List => {
                Self::InSet(option_set(descriptor, arguments)?)
            }
            ComparisonMethod::NotEquals if value_type == ValueType::List => {
                Self::NotInSet(option_set(descriptor, arguments)?)
            }
            ComparisonMethod::Contains if value_type == ValueType::List => {
                Self::Intersects(option_set(descriptor, arguments)?)
            }
            ComparisonMethod::Equals => Self::Equals(scalar(0)?),
            ComparisonMethod::NotEquals => Self::NotEquals(scalar(0)?),
            ComparisonMethod::Contains => Self::Substring(arguments[0].clone()),
            ComparisonMethod::Range => Self::Range(scalar(0)?, scalar(1)?),
            ComparisonMethod::GreaterThan => Self::GreaterThan(scalar(0)?),
            ComparisonMethod::LessThan => Self::LessThan(scalar(0)?),
        };
        Ok(comparison)
    }

    /// Whether a resolved field value satisfies the comparison.
    ///
    /// A missing value never matches, except for the complement methods
    /// (`NOT_EQUALS`), which match whatever `EQUALS` rejects.
    pub fn evaluate(&self, value: Option<&TypedValue>) -> bool {
        match self {
            Self::Equals(expected) => value == Some(expected),
            Self::NotEquals(expected) => value != Some(expected),
            Self::InSet(set) => value.is_some_and(|v| is_subset(v, set)),
            Self::NotInSet(set) => !value.is_some_and(|v| is_subset(v, set)),
            Self::Substring(needle) => {
                matches!(value, Some(TypedValue::String(s)) if s.contains(needle.as_str()))
            }
            Self::Intersects(set) => {
                value.is_some_and(|v| v.as_options().iter().any(|o| set.contains(o)))
            }
            Self::Range(low, high) => value.is_some_and(|v| {
                matches!(v.compare(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(v.compare(high), Some(Ordering::Less | Ordering::Equal))
            }),
            Self::GreaterThan(bound) => {
                value.is_some_and(|v| v.compare(bound) == Some(Ordering::Greater))
            }
            Self::LessThan(bound) => value.is_some_and(|v| v.compare(bound) == Some(Ordering::Less)),
        }
    }
}

/// One-shot compile and evaluate, for callers holding a single value.
pub fn evaluate(
    descriptor: &FieldDescriptor,
    method: ComparisonMethod,
    arguments: &[String],
    value: Option<&TypedValue>,
) -> Result<bool, CompileErrorKind> {
    Ok(Comparison::compile(descriptor, method, arguments)?.evaluate(value))
}

fn coerce(descriptor: &FieldDescriptor, raw: &str) -> Result<TypedValue, CompileErrorKind> {
    let value = TypedValue::parse_argument(descriptor.value_type, raw)
        .filter(|_| descriptor.value_type != ValueType::Enum || descriptor.allows_choice(raw));
    value.ok_or_else(|| invalid_argument(descriptor, raw))
}

fn option_set(
    descriptor: &FieldDescriptor,
    arguments: &[String],
) -> Result<BTreeSet<String>, CompileErrorKind> {
    arguments
        .iter()
        .map(|raw| {
            if descriptor.allows_choice(raw) {
                Ok(raw.clone())
            } else {
                Err(invalid_argument(descriptor, raw))
            }
        })
        .collect()
}

fn invalid_argument(descriptor: &FieldDescriptor, raw: &str) -> CompileErrorKind {
    CompileErrorKind::InvalidArgumentType {
        field: descriptor.name.clone(),
        value_type: descriptor.value_type,
        argument: raw.to_string(),
    }
}

fn is_subset(value: &TypedValue, set: &BTreeSet<String>) -> bool {
    let options = value.as_options();
    !options.is_empty() && options.iter().all(|o| set.contains(o))
}
