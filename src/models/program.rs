use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A beneficiary program that owns a population and a field schema.
///
/// The program's [`ProgramMode`] is fixed at creation. It decides how
/// targeting results and exclusion IDs are interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    /// Business area (country office) the program runs in.
    pub business_area: String,
    pub mode: ProgramMode,
    pub created_at: DateTime<Utc>,
}

/// Whether a program registers families or single people.
///
/// - `Household`: targeting selects households; IDs are household IDs
/// - `Person`: each household is a synthetic wrapper around exactly one
///   individual; IDs are individual IDs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramMode {
    #[default]
    Household,
    Person,
}

impl ProgramMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Household => "HOUSEHOLD",
            Self::Person => "PERSON",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HOUSEHOLD" => Some(Self::Household),
            "PERSON" => Some(Self::Person),
            _ => None,
        }
    }
}

/// Input for creating a new program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProgramInput {
    pub name: String,
    pub business_area: String,
    /// Defaults to `Household` if not specified.
    #[serde(default)]
    pub mode: Option<ProgramMode>,
}
