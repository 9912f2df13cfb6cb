use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The entity a field belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Household,
    Individual,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Household => "HOUSEHOLD",
            Self::Individual => "INDIVIDUAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "HOUSEHOLD" => Some(Self::Household),
            "INDIVIDUAL" => Some(Self::Individual),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The declared type of a field's value.
///
/// Registration payloads exported from other tools use `DECIMAL`/`INTEGER`
/// for numbers and `SELECT_ONE`/`SELECT_MANY` for choice fields, so those
/// spellings are accepted as aliases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    String,
    #[serde(alias = "DECIMAL", alias = "INTEGER")]
    Number,
    #[serde(alias = "BOOL")]
    Boolean,
    Date,
    #[serde(alias = "SELECT_ONE")]
    Enum,
    #[serde(alias = "SELECT_MANY")]
    List,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOLEAN",
            Self::Date => "DATE",
            Self::Enum => "ENUM",
            Self::List => "LIST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STRING" => Some(Self::String),
            "NUMBER" | "DECIMAL" | "INTEGER" => Some(Self::Number),
            "BOOLEAN" | "BOOL" => Some(Self::Boolean),
            "DATE" => Some(Self::Date),
            "ENUM" | "SELECT_ONE" => Some(Self::Enum),
            "LIST" | "SELECT_MANY" => Some(Self::List),
            _ => None,
        }
    }

    /// Whether values of this type are totally ordered (`RANGE`, `<`, `>`).
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Number | Self::Date)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field is defined.
///
/// The serialized names are the ones rule payloads carry in
/// `flexFieldClassification`.
///
/// - `Core`: static attribute present for every program
/// - `Flex`: free-form attribute registered by the program
/// - `Pdu`: periodic attribute recorded once per collection round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FieldClassification {
    #[serde(rename = "NOT_FLEX_FIELD")]
    Core,
    #[serde(rename = "FLEX_FIELD_BASIC")]
    Flex,
    #[serde(rename = "FLEX_FIELD_PDU")]
    Pdu,
}

impl FieldClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "NOT_FLEX_FIELD",
            Self::Flex => "FLEX_FIELD_BASIC",
            Self::Pdu => "FLEX_FIELD_PDU",
        }
    }
}

impl std::fmt::Display for FieldClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Round configuration of a periodic field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodicSpec {
    pub number_of_rounds: u32,
    /// Display names of the rounds, in round order. May be shorter than
    /// `number_of_rounds` when some rounds are unnamed.
    #[serde(default)]
    pub round_names: Vec<String>,
    /// Value type recorded in each round.
    pub subtype: ValueType,
}

/// A typed description of a field that targeting rules can reference.
///
/// Descriptors are produced by the schema registry from the static core
/// table and the program's flex and periodic catalogs. For periodic fields
/// `value_type` always equals `periodic.subtype`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub owner: EntityKind,
    pub value_type: ValueType,
    pub classification: FieldClassification,
    #[serde(default)]
    pub label: Option<String>,
    /// Allowed option values for `ENUM` and `LIST` fields. Empty means any value.
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub periodic: Option<PeriodicSpec>,
}

impl FieldDescriptor {
    pub fn allows_choice(&self, value: &str) -> bool {
        self.choices.is_empty() || self.choices.iter().any(|c| c == value)
    }
}

/// A free-form attribute registered for a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlexAttribute {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub owner: EntityKind,
    pub value_type: ValueType,
    pub label: Option<String>,
    pub choices: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl FlexAttribute {
    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            owner: self.owner,
            value_type: self.value_type,
            classification: FieldClassification::Flex,
            label: self.label.clone(),
            choices: self.choices.clone(),
            periodic: None,
        }
    }
}

/// Input for registering a flex attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFlexAttributeInput {
    pub name: String,
    pub owner: EntityKind,
    pub value_type: ValueType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub choices: Vec<String>,
}

/// A periodic ("PDU") attribute whose value is collected once per round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicField {
    pub id: Uuid,
    pub program_id: Uuid,
    pub name: String,
    pub owner: EntityKind,
    pub label: Option<String>,
    pub spec: PeriodicSpec,
    pub created_at: DateTime<Utc>,
}

impl PeriodicField {
    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.clone(),
            owner: self.owner,
            value_type: self.spec.subtype,
            classification: FieldClassification::Pdu,
            label: self.label.clone(),
            choices: Vec::new(),
            periodic: Some(self.spec.clone()),
        }
    }
}

/// Input for registering a periodic field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePeriodicFieldInput {
    pub name: String,
    /// Defaults to `Individual`; periodic data is usually collected per person.
    #[serde(default)]
    pub owner: Option<EntityKind>,
    #[serde(default)]
    pub label: Option<String>,
    pub subtype: ValueType,
    pub number_of_rounds: u32,
    #[serde(default)]
    pub round_names: Vec<String>,
}

/// The full targeting schema of a program, as raw catalog rows.
#[derive(Debug, Clone, Default)]
pub struct ProgramFields {
    pub flex_attributes: Vec<FlexAttribute>,
    pub periodic_fields: Vec<PeriodicField>,
}
