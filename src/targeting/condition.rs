use super::comparison::Comparison;
use super::core_fields::core_field;
use super::criteria::Compiler;
use super::error::CompileErrorKind;
use super::pdu::RoundSelector;
use super::predicate::{AtomicPredicate, ValueSource};
use crate::models::{EntityKind, FieldClassification, FilterCondition};

impl Compiler<'_> {
    /// Compile one condition evaluated against an entity of kind `context`.
    pub(crate) fn compile_condition(
        &self,
        condition: &FilterCondition,
        context: EntityKind,
    ) -> Result<AtomicPredicate, CompileErrorKind> {
        let descriptor = self
            .registry
            .resolve(&condition.field_name, condition.flex_field_classification)?;

        let round = if descriptor.classification == FieldClassification::Pdu
            || condition.round_number.is_some()
        {
            Some(RoundSelector::validate(descriptor, condition.round_number)?)
        } else {
            None
        };

        if descriptor.owner != context {
            return Err(CompileErrorKind::CrossEntityField {
                field: descriptor.name.clone(),
                owner: descriptor.owner,
                context,
            });
        }

        let source = match (descriptor.classification, round) {
            (_, Some(selector)) => ValueSource::Periodic(selector),
            (FieldClassification::Flex, None) => ValueSource::Flex {
                name: descriptor.name.clone(),
                value_type: descriptor.value_type,
            },
            (_, None) => ValueSource::Core(core_field(&descriptor.name).ok_or_else(|| {
                CompileErrorKind::UnknownField {
                    field: descriptor.name.clone(),
                }
            })?),
        };

        let comparison = Comparison::compile(
            descriptor,
            condition.comparison_method,
            &condition.arguments,
        )?;

        Ok(AtomicPredicate {
            field: descriptor.name.clone(),
            source,
            comparison,
            as_of: self.as_of,
        })
    }
}
