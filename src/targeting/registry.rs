//! Field schema resolution against a per-compile snapshot.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::core_fields::CORE_FIELDS;
use super::error::CompileErrorKind;
use crate::models::{FieldClassification, FieldDescriptor, ProgramFields};

/// Source of a program's flex and periodic field definitions.
pub trait ProgramFieldCatalog {
    /// All field definitions of a program, read consistently in one go.
    fn program_fields(&self, program_id: Uuid) -> anyhow::Result<ProgramFields>;
}

/// Resolves a field reference to its descriptor.
pub trait FieldSchemaRegistry {
    fn resolve(
        &self,
        field_name: &str,
        classification: FieldClassification,
    ) -> Result<&FieldDescriptor, CompileErrorKind>;
}

/// Immutable view of one program's schema, held for the duration of a compile.
///
/// Later catalog edits never affect a snapshot that was already captured.
#[derive(Debug, Clone)]
pub struct SchemaSnapshot {
    core: BTreeMap<String, FieldDescriptor>,
    flex: BTreeMap<String, FieldDescriptor>,
    pdu: BTreeMap<String, FieldDescriptor>,
}

impl SchemaSnapshot {
    pub fn capture(program_id: Uuid, catalog: &dyn ProgramFieldCatalog) -> anyhow::Result<Self> {
        let fields = catalog.program_fields(program_id)?;
        Ok(Self::new(program_id, fields))
    }

    pub fn new(program_id: Uuid, fields: ProgramFields) -> Self {
        let core = CORE_FIELDS
            .iter()
            .map(|f| (f.name.to_string(), f.descriptor()))
            .collect();
        let flex = fields
            .flex_attributes
            .iter()
            .map(|a| (a.name.clone(), a.descriptor()))
            .collect();
        let pdu = fields
            .periodic_fields
            .iter()
            .map(|p| (p.name.clone(), p.descriptor()))
            .collect();

        tracing::debug!(
            %program_id,
            flex = fields.flex_attributes.len(),
            periodic = fields.periodic_fields.len(),
            "Captured schema snapshot"
        );

        Self { core, flex, pdu }
    }

    /// Every descriptor in the snapshot: core, then flex, then periodic.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.core
            .values()
            .chain(self.flex.values())
            .chain(self.pdu.values())
    }

    fn table(&self, classification: FieldClassification) -> &BTreeMap<String, FieldDescriptor> {
        match classification {
            FieldClassification::Core => &self.core,
            FieldClassification::Flex => &self.flex,
            FieldClassification::Pdu => &self.pdu,
        }
    }
}

impl FieldSchemaRegistry for SchemaSnapshot {
    fn resolve(
        &self,
        field_name: &str,
        classification: FieldClassification,
    ) -> Result<&FieldDescriptor, CompileErrorKind> {
        if let Some(descriptor) = self.table(classification).get(field_name) {
            return Ok(descriptor);
        }

        let actual = [
            FieldClassification::Core,
            FieldClassification::Flex,
            FieldClassification::Pdu,
        ]
        .into_iter()
        .filter(|c| *c != classification)
        .find(|c| self.table(*c).contains_key(field_name));

        Err(match actual {
            Some(actual) => CompileErrorKind::ClassificationMismatch {
                field: field_name.to_string(),
                declared: classification,
                actual,
            },
            None => CompileErrorKind::UnknownField {
                field: field_name.to_string(),
            },
        })
    }
}
