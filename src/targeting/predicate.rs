//! Compiled predicate tree evaluated against household records.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::comparison::Comparison;
use super::core_fields::{CoreField, CoreReader};
use super::pdu::RoundSelector;
use super::value::TypedValue;
use crate::models::{Household, HouseholdRecord, Individual, ValueType};

/// An entity that atomic predicates can read fields from.
pub trait FieldSubject {
    fn core_value(&self, field: &CoreField, as_of: NaiveDate) -> Option<TypedValue>;
    fn flex_fields(&self) -> &Map<String, Value>;
}

impl FieldSubject for Household {
    fn core_value(&self, field: &CoreField, _as_of: NaiveDate) -> Option<TypedValue> {
        match field.reader {
            CoreReader::Household(read) => read(self),
            CoreReader::Individual(_) => None,
        }
    }

    fn flex_fields(&self) -> &Map<String, Value> {
        &self.flex_fields
    }
}

impl FieldSubject for Individual {
    fn core_value(&self, field: &CoreField, as_of: NaiveDate) -> Option<TypedValue> {
        match field.reader {
            CoreReader::Individual(read) => read(self, as_of),
            CoreReader::Household(_) => None,
        }
    }

    fn flex_fields(&self) -> &Map<String, Value> {
        &self.flex_fields
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ValueSource {
    Core(&'static CoreField),
    Flex { name: String, value_type: ValueType },
    Periodic(RoundSelector),
}

/// One comparison against one field of one entity.
#[derive(Debug, Clone)]
pub struct AtomicPredicate {
    pub(crate) field: String,
    pub(crate) source: ValueSource,
    pub(crate) comparison: Comparison,
    pub(crate) as_of: NaiveDate,
}

impl AtomicPredicate {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn resolve<S: FieldSubject>(&self, subject: &S) -> Option<TypedValue> {
        match &self.source {
            ValueSource::Core(field) => subject.core_value(field, self.as_of),
            ValueSource::Flex { name, value_type } => subject
                .flex_fields()
                .get(name)
                .and_then(|raw| TypedValue::from_stored(*value_type, raw)),
            ValueSource::Periodic(selector) => selector.resolve(subject.flex_fields()),
        }
    }

    pub fn matches<S: FieldSubject>(&self, subject: &S) -> bool {
        self.comparison.evaluate(self.resolve(subject).as_ref())
    }
}

/// Which members an individual block quantifies over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberScope {
    AnyMember,
    HeadOfHousehold,
}

/// A boolean predicate over a household and its members.
///
/// `All(vec![])` is true and `Any(vec![])` is false.
#[derive(Debug, Clone)]
pub enum HouseholdPredicate {
    All(Vec<HouseholdPredicate>),
    Any(Vec<HouseholdPredicate>),
    Household(AtomicPredicate),
    /// Some member in `scope` satisfies every condition at once.
    Members {
        scope: MemberScope,
        conditions: Vec<AtomicPredicate>,
    },
}

impl HouseholdPredicate {
    pub fn always() -> Self {
        Self::All(Vec::new())
    }

    pub fn never() -> Self {
        Self::Any(Vec::new())
    }

    pub fn matches(&self, record: &HouseholdRecord) -> bool {
        match self {
            Self::All(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Any(parts) => parts.iter().any(|p| p.matches(record)),
            Self::Household(atom) => atom.matches(&record.household),
            Self::Members { scope, conditions } => {
                let satisfies_all = |member: &Individual| {
                    !member.withdrawn && conditions.iter().all(|c| c.matches(member))
                };
                match scope {
                    MemberScope::HeadOfHousehold => record.head().is_some_and(satisfies_all),
                    MemberScope::AnyMember => record.members.iter().any(satisfies_all),
                }
            }
        }
    }
}
