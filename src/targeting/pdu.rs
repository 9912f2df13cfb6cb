//! Round resolution for periodic (PDU) fields.
//!
//! A periodic value is stored under the field name as a map from round
//! number to `{"value": ..., "collection_date": ...}`.

use serde_json::{Map, Value};

use super::error::CompileErrorKind;
use super::value::TypedValue;
use crate::models::{FieldClassification, FieldDescriptor, ValueType};

/// A validated reference to one round of a periodic field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSelector {
    field: String,
    round: u32,
    value_type: ValueType,
}

impl RoundSelector {
    /// Check a round reference. The first violation wins:
    /// classification, then presence, then range.
    pub fn validate(
        descriptor: &FieldDescriptor,
        round_number: Option<u32>,
    ) -> Result<Self, CompileErrorKind> {
        let Some(spec) = descriptor
            .periodic
            .as_ref()
            .filter(|_| descriptor.classification == FieldClassification::Pdu)
        else {
            return Err(CompileErrorKind::ClassificationMismatch {
                field: descriptor.name.clone(),
                declared: FieldClassification::Pdu,
                actual: descriptor.classification,
            });
        };

        let round = round_number.ok_or_else(|| CompileErrorKind::MissingRoundNumber {
            field: descriptor.name.clone(),
        })?;

        if round == 0 || round > spec.number_of_rounds {
            return Err(CompileErrorKind::RoundNumberOutOfRange {
                field: descriptor.name.clone(),
                round,
                number_of_rounds: spec.number_of_rounds,
            });
        }

        Ok(Self {
            field: descriptor.name.clone(),
            round,
            value_type: descriptor.value_type,
        })
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// The round's value, or `None` if the round was never populated.
    pub fn resolve(&self, flex_fields: &Map<String, Value>) -> Option<TypedValue> {
        let rounds = flex_fields.get(&self.field)?.as_object()?;
        let entry = rounds.get(&self.round.to_string())?.as_object()?;
        TypedValue::from_stored(self.value_type, entry.get("value")?)
    }
}

/// Validate the round reference and extract the value in one step.
pub fn resolve_round_value(
    descriptor: &FieldDescriptor,
    round_number: Option<u32>,
    flex_fields: &Map<String, Value>,
) -> Result<Option<TypedValue>, CompileErrorKind> {
    Ok(RoundSelector::validate(descriptor, round_number)?.resolve(flex_fields))
}
