use std::collections::HashSet;

use crate::models::{ExclusionSpec, HouseholdRecord, ProgramMode};

/// Ordered, de-duplicated list of entity IDs to exclude.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    ids: Vec<String>,
}

impl ExclusionSet {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();
        Self { ids }
    }

    /// Parse IDs pasted as free text, separated by commas, semicolons or whitespace.
    pub fn parse(text: &str) -> Self {
        Self::new(text.split(|c: char| c == ',' || c == ';' || c.is_whitespace()))
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Removes excluded entities from a targeting result.
///
/// In `Household` mode IDs are matched against household unicef IDs; in
/// `Person` mode against the unicef IDs of the household's members.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    mode: ProgramMode,
    ids: HashSet<String>,
}

impl ExclusionFilter {
    pub fn new(set: &ExclusionSet, mode: ProgramMode) -> Self {
        Self {
            mode,
            ids: set.ids().iter().cloned().collect(),
        }
    }

    /// Each entry may itself hold several pasted IDs.
    pub fn from_spec(spec: &ExclusionSpec) -> Self {
        Self::new(&ExclusionSet::parse(&spec.ids.join(",")), spec.program_mode)
    }

    pub fn mode(&self) -> ProgramMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn excludes(&self, record: &HouseholdRecord) -> bool {
        if self.ids.is_empty() {
            return false;
        }
        match self.mode {
            ProgramMode::Household => self.ids.contains(&record.household.unicef_id),
            ProgramMode::Person => record
                .members
                .iter()
                .any(|m| self.ids.contains(&m.unicef_id)),
        }
    }

    pub fn apply<'r, I>(&self, matched: I) -> Vec<&'r HouseholdRecord>
    where
        I: IntoIterator<Item = &'r HouseholdRecord>,
    {
        matched.into_iter().filter(|r| !self.excludes(r)).collect()
    }
}

pub fn apply_exclusions<'r>(
    matched: Vec<&'r HouseholdRecord>,
    exclusions: &ExclusionSet,
    mode: ProgramMode,
) -> Vec<&'r HouseholdRecord> {
    if exclusions.is_empty() {
        return matched;
    }
    ExclusionFilter::new(exclusions, mode).apply(matched)
}
