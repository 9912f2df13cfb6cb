use serde::{Deserialize, Serialize};

use super::field::FieldClassification;
use super::program::ProgramMode;

/// The operator applied between a field's value and a condition's arguments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonMethod {
    Equals,
    NotEquals,
    Contains,
    Range,
    GreaterThan,
    LessThan,
}

impl ComparisonMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "EQUALS",
            Self::NotEquals => "NOT_EQUALS",
            Self::Contains => "CONTAINS",
            Self::Range => "RANGE",
            Self::GreaterThan => "GREATER_THAN",
            Self::LessThan => "LESS_THAN",
        }
    }
}

impl std::fmt::Display for ComparisonMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One comparison against one field.
///
/// Arguments are always transmitted as strings and coerced to the field's
/// declared type at compile time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub field_name: String,
    pub flex_field_classification: FieldClassification,
    /// Required for periodic fields, rejected for all others.
    #[serde(default)]
    pub round_number: Option<u32>,
    pub comparison_method: ComparisonMethod,
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl FilterCondition {
    /// Shorthand for a core-field condition.
    pub fn core(
        field_name: impl Into<String>,
        comparison_method: ComparisonMethod,
        arguments: &[&str],
    ) -> Self {
        Self {
            field_name: field_name.into(),
            flex_field_classification: FieldClassification::Core,
            round_number: None,
            comparison_method,
            arguments: arguments.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Shorthand for a flex-field condition.
    pub fn flex(
        field_name: impl Into<String>,
        comparison_method: ComparisonMethod,
        arguments: &[&str],
    ) -> Self {
        Self {
            flex_field_classification: FieldClassification::Flex,
            ..Self::core(field_name, comparison_method, arguments)
        }
    }

    /// Shorthand for a periodic-field condition on one round.
    pub fn periodic(
        field_name: impl Into<String>,
        round_number: Option<u32>,
        comparison_method: ComparisonMethod,
        arguments: &[&str],
    ) -> Self {
        Self {
            flex_field_classification: FieldClassification::Pdu,
            round_number,
            ..Self::core(field_name, comparison_method, arguments)
        }
    }
}

/// Conditions that must all hold for one and the same household member.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndividualFilterBlock {
    /// Restrict the block to the head of household instead of any member.
    #[serde(default)]
    pub target_only_head_of_household: bool,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
}

/// A conjunction of household conditions and individual blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub household_filters: Vec<FilterCondition>,
    #[serde(default, rename = "individualsFilterBlocks")]
    pub individual_blocks: Vec<IndividualFilterBlock>,
}

/// The root rule container. A household qualifies if it matches any rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetingCriteria {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// IDs removed from a targeting result regardless of rule outcome.
///
/// `program_mode` decides whether the IDs are household or individual IDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionSpec {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub program_mode: ProgramMode,
}

/// Criteria plus exclusions, as submitted for validation or preview.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TargetingRequest {
    pub criteria: TargetingCriteria,
    #[serde(default)]
    pub exclusions: Option<ExclusionSpec>,
}
