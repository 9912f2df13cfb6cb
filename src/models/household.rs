use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A registered household.
///
/// Core attributes are columns; program-specific attributes (flex and
/// periodic) live in `flex_fields`, keyed by field name. Periodic fields are
/// stored as `{"<round>": {"value": ..., "collection_date": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Household {
    pub id: Uuid,
    pub program_id: Uuid,
    /// Human-facing identifier, e.g. `HH-20-0000.0001`.
    pub unicef_id: String,
    pub head_id: Option<Uuid>,
    pub size: Option<i64>,
    pub residence_status: Option<String>,
    pub admin1: Option<String>,
    pub admin2: Option<String>,
    pub village: Option<String>,
    pub address: Option<String>,
    pub first_registration_date: Option<NaiveDate>,
    pub returnee: Option<bool>,
    #[serde(default)]
    pub consent_sharing: Vec<String>,
    #[serde(default)]
    pub flex_fields: Map<String, Value>,
    #[serde(default)]
    pub withdrawn: bool,
    pub created_at: DateTime<Utc>,
}

/// A registered person. Belongs to exactly one household.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    pub id: Uuid,
    pub household_id: Uuid,
    /// Human-facing identifier, e.g. `IND-20-0000.0001`.
    pub unicef_id: String,
    pub full_name: String,
    pub sex: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub marital_status: Option<String>,
    pub relationship: Option<String>,
    pub disability: Option<bool>,
    #[serde(default)]
    pub observed_disability: Vec<String>,
    pub pregnant: Option<bool>,
    pub phone_no: Option<String>,
    #[serde(default)]
    pub flex_fields: Map<String, Value>,
    #[serde(default)]
    pub withdrawn: bool,
}

/// A household together with its current members.
///
/// This is the unit a compiled targeting predicate is evaluated against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HouseholdRecord {
    #[serde(flatten)]
    pub household: Household,
    pub members: Vec<Individual>,
}

impl HouseholdRecord {
    /// The household's head, if it is a current member.
    pub fn head(&self) -> Option<&Individual> {
        let head_id = self.household.head_id?;
        self.members.iter().find(|m| m.id == head_id)
    }
}

/// Input for registering a person as part of a household.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateIndividualInput {
    pub unicef_id: String,
    pub full_name: String,
    /// Marks the member as head of household. Exactly one member must be head.
    #[serde(default)]
    pub is_head: bool,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub marital_status: Option<String>,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub disability: Option<bool>,
    #[serde(default)]
    pub observed_disability: Vec<String>,
    #[serde(default)]
    pub pregnant: Option<bool>,
    #[serde(default)]
    pub phone_no: Option<String>,
    #[serde(default)]
    pub flex_fields: Map<String, Value>,
}

/// Input for registering a household with its members.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateHouseholdInput {
    pub unicef_id: String,
    /// Defaults to the number of members if not specified.
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub residence_status: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub admin2: Option<String>,
    #[serde(default)]
    pub village: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub first_registration_date: Option<NaiveDate>,
    #[serde(default)]
    pub returnee: Option<bool>,
    #[serde(default)]
    pub consent_sharing: Vec<String>,
    #[serde(default)]
    pub flex_fields: Map<String, Value>,
    pub members: Vec<CreateIndividualInput>,
}

/// Input for recording one round of a periodic field for an individual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPeriodicValueInput {
    pub field: String,
    pub round: u32,
    pub value: Value,
    #[serde(default)]
    pub collection_date: Option<NaiveDate>,
}
