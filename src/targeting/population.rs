use uuid::Uuid;

use crate::models::{Household, HouseholdRecord, Individual};

/// Queryable store of registered households and individuals.
///
/// Implementations return only current entities: withdrawn households and
/// withdrawn members are never part of a targeting population.
pub trait HouseholdStore {
    fn households_for_program(&self, program_id: Uuid) -> anyhow::Result<Vec<Household>>;

    fn members(&self, household_id: Uuid) -> anyhow::Result<Vec<Individual>>;

    fn head_of_household(&self, household_id: Uuid) -> anyhow::Result<Option<Individual>>;

    /// The program's households with their current members.
    fn population(&self, program_id: Uuid) -> anyhow::Result<Vec<HouseholdRecord>> {
        self.households_for_program(program_id)?
            .into_iter()
            .map(|household| {
                let members = self.members(household.id)?;
                Ok(HouseholdRecord { household, members })
            })
            .collect()
    }
}
