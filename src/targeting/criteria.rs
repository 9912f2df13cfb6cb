use chrono::NaiveDate;

use super::error::CompileError;
use super::predicate::HouseholdPredicate;
use super::registry::FieldSchemaRegistry;
use crate::models::TargetingCriteria;

/// Compiles targeting criteria against one program's schema.
///
/// A compiler borrows an immutable registry snapshot and holds no other
/// state, so any number of compiles can run concurrently.
pub struct Compiler<'a> {
    pub(crate) registry: &'a dyn FieldSchemaRegistry,
    pub(crate) as_of: NaiveDate,
}

impl<'a> Compiler<'a> {
    /// `as_of` is the reference date for derived fields such as `age`.
    pub fn new(registry: &'a dyn FieldSchemaRegistry, as_of: NaiveDate) -> Self {
        Self { registry, as_of }
    }

    /// OR of all rules. Criteria without rules match no household.
    pub fn compile(&self, criteria: &TargetingCriteria) -> Result<HouseholdPredicate, CompileError> {
        if criteria.rules.is_empty() {
            return Ok(HouseholdPredicate::never());
        }

        let rules = criteria
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| self.compile_rule(index, rule))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(rules = rules.len(), "Compiled targeting criteria");
        Ok(HouseholdPredicate::Any(rules))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComparisonMethod, FilterCondition, ProgramFields, Rule};
    use crate::targeting::SchemaSnapshot;
    use uuid::Uuid;

    #[test]
    fn test_empty_criteria_compiles_to_never() {
        let snapshot = SchemaSnapshot::new(Uuid::new_v4(), ProgramFields::default());
        let compiler = Compiler::new(&snapshot, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let predicate = compiler.compile(&TargetingCriteria::default()).unwrap();
        assert!(matches!(predicate, HouseholdPredicate::Any(ref rules) if rules.is_empty()));
    }

    #[test]
    fn test_empty_rule_compiles_to_always() {
        let snapshot = SchemaSnapshot::new(Uuid::new_v4(), ProgramFields::default());
        let compiler = Compiler::new(&snapshot, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let predicate = compiler.compile_rule(0, &Rule::default()).unwrap();
        assert!(matches!(predicate, HouseholdPredicate::All(ref parts) if parts.is_empty()));
    }

    #[test]
    fn test_first_failing_rule_is_reported() {
        let snapshot = SchemaSnapshot::new(Uuid::new_v4(), ProgramFields::default());
        let compiler = Compiler::new(&snapshot, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let criteria = TargetingCriteria {
            rules: vec![
                Rule::default(),
                Rule {
                    household_filters: vec![FilterCondition::core(
                        "nope",
                        ComparisonMethod::Equals,
                        &["1"],
                    )],
                    individual_blocks: vec![],
                },
            ],
        };
        let err = compiler.compile(&criteria).unwrap_err();
        assert_eq!(err.location.rule, 1);
        assert_eq!(err.code(), "UnknownFieldError");
    }
}
