use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::program::ProgramMode;

/// Result of running compiled criteria against a program's population.
///
/// IDs are household unicef IDs for household programs and individual
/// unicef IDs for person programs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetingPreview {
    pub program_id: Uuid,
    pub program_mode: ProgramMode,
    pub as_of: NaiveDate,
    /// Households considered (current, non-withdrawn).
    pub total_candidates: usize,
    pub matched_ids: Vec<String>,
    /// IDs that matched the rules but were removed by the exclusion list.
    pub excluded_ids: Vec<String>,
}

/// Shape summary of criteria that compiled successfully.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CriteriaSummary {
    pub rules: usize,
    pub household_filters: usize,
    pub individual_blocks: usize,
    pub excluded_ids: usize,
}
