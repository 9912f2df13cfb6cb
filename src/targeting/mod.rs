//! Targeting criteria compiler.
//!
//! Turns a [`TargetingCriteria`] document into a [`HouseholdPredicate`]
//! against one program's schema, then layers an [`ExclusionFilter`] on top.
//!
//! ```text
//! criteria ── Compiler::compile ──► OR over rules
//!                rule ──────────► AND(household atoms, blocks)
//!                block ─────────► ∃ member: AND(individual atoms)
//!                atom ──────────► registry → round resolver → comparison
//! ```
//!
//! Every validation problem is reported at compile time as a
//! [`CompileError`]; evaluating a compiled predicate cannot fail.

mod block;
mod comparison;
mod condition;
mod core_fields;
mod criteria;
mod error;
mod exclusion;
mod pdu;
mod population;
mod predicate;
mod registry;
mod rule;
mod value;

pub use comparison::{arity, evaluate, supports, Comparison};
pub use core_fields::{age_on, core_field, CoreField, CoreReader, CORE_FIELDS};
pub use criteria::Compiler;
pub use error::{Arity, CompileError, CompileErrorKind, ConditionLocation};
pub use exclusion::{apply_exclusions, ExclusionFilter, ExclusionSet};
pub use pdu::{resolve_round_value, RoundSelector};
pub use population::HouseholdStore;
pub use predicate::{AtomicPredicate, FieldSubject, HouseholdPredicate, MemberScope};
pub use registry::{FieldSchemaRegistry, ProgramFieldCatalog, SchemaSnapshot};
pub use value::TypedValue;

use chrono::NaiveDate;

use crate::models::{ExclusionSpec, HouseholdRecord, ProgramMode, TargetingCriteria};

/// Compiled criteria plus the exclusion list, ready to run over a population.
#[derive(Debug, Clone)]
pub struct CompiledTargeting {
    predicate: HouseholdPredicate,
    exclusions: ExclusionFilter,
}

impl CompiledTargeting {
    pub fn predicate(&self) -> &HouseholdPredicate {
        &self.predicate
    }

    pub fn exclusions(&self) -> &ExclusionFilter {
        &self.exclusions
    }

    pub fn program_mode(&self) -> ProgramMode {
        self.exclusions.mode()
    }

    /// Whether the rules accept the record, ignoring exclusions.
    pub fn matches_rules(&self, record: &HouseholdRecord) -> bool {
        self.predicate.matches(record)
    }

    pub fn matches(&self, record: &HouseholdRecord) -> bool {
        self.matches_rules(record) && !self.exclusions.excludes(record)
    }

    pub fn select<'r>(&self, records: &'r [HouseholdRecord]) -> Vec<&'r HouseholdRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }

    /// Split rule matches into (selected, excluded).
    pub fn partition<'r>(
        &self,
        records: &'r [HouseholdRecord],
    ) -> (Vec<&'r HouseholdRecord>, Vec<&'r HouseholdRecord>) {
        records
            .iter()
            .filter(|r| self.matches_rules(r))
            .partition(|r| !self.exclusions.excludes(r))
    }
}

/// Compile criteria and exclusions in one call.
///
/// The program mode is taken from `exclusions` and applied uniformly.
pub fn compile_targeting(
    registry: &dyn FieldSchemaRegistry,
    criteria: &TargetingCriteria,
    exclusions: &ExclusionSpec,
    as_of: NaiveDate,
) -> Result<CompiledTargeting, CompileError> {
    let predicate = Compiler::new(registry, as_of).compile(criteria)?;
    let exclusions = ExclusionFilter::from_spec(exclusions);

    tracing::debug!(
        rules = criteria.rules.len(),
        excluded = exclusions.len(),
        mode = exclusions.mode().as_str(),
        "Compiled targeting"
    );

    Ok(CompiledTargeting {
        predicate,
        exclusions,
    })
}
