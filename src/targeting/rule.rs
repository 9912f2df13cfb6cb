use super::criteria::Compiler;
use super::error::{CompileError, ConditionLocation};
use super::predicate::HouseholdPredicate;
use crate::models::{EntityKind, Rule};

impl Compiler<'_> {
    /// AND of the rule's household filters and individual blocks.
    /// A rule with neither matches every household.
    pub fn compile_rule(
        &self,
        rule_index: usize,
        rule: &Rule,
    ) -> Result<HouseholdPredicate, CompileError> {
        if rule.household_filters.is_empty() && rule.individual_blocks.is_empty() {
            tracing::debug!(rule = rule_index, "Compiled empty rule");
            return Ok(HouseholdPredicate::always());
        }

        let mut parts = Vec::with_capacity(rule.household_filters.len() + rule.individual_blocks.len());

        for (filter_index, condition) in rule.household_filters.iter().enumerate() {
            let atom = self
                .compile_condition(condition, EntityKind::Household)
                .map_err(|kind| {
                    CompileError::new(
                        kind,
                        ConditionLocation::household(rule_index, filter_index),
                        condition,
                    )
                })?;
            parts.push(HouseholdPredicate::Household(atom));
        }

        for (block_index, block) in rule.individual_blocks.iter().enumerate() {
            parts.push(self.compile_block(rule_index, block_index, block)?);
        }

        tracing::debug!(
            rule = rule_index,
            household_filters = rule.household_filters.len(),
            individual_blocks = rule.individual_blocks.len(),
            "Compiled rule"
        );
        Ok(HouseholdPredicate::All(parts))
    }
}
