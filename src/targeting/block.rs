use super::criteria::Compiler;
use super::error::{CompileError, ConditionLocation};
use super::predicate::{HouseholdPredicate, MemberScope};
use crate::models::{EntityKind, IndividualFilterBlock};

impl Compiler<'_> {
    /// Existential predicate over the block's conjunction.
    ///
    /// The household matches iff one member in range satisfies every filter.
    /// Two filters met by two different members do not match.
    pub fn compile_block(
        &self,
        rule_index: usize,
        block_index: usize,
        block: &IndividualFilterBlock,
    ) -> Result<HouseholdPredicate, CompileError> {
        let conditions = block
            .filters
            .iter()
            .enumerate()
            .map(|(filter_index, condition)| {
                self.compile_condition(condition, EntityKind::Individual)
                    .map_err(|kind| {
                        CompileError::new(
                            kind,
                            ConditionLocation::block(rule_index, block_index, filter_index),
                            condition,
                        )
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scope = if block.target_only_head_of_household {
            MemberScope::HeadOfHousehold
        } else {
            MemberScope::AnyMember
        };

        Ok(HouseholdPredicate::Members { scope, conditions })
    }
}
