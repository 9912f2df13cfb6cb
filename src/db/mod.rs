mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::*;
use crate::targeting::{
    self, core_field, CompiledTargeting, HouseholdStore, ProgramFieldCatalog, SchemaSnapshot,
};

const PROGRAM_COLUMNS: &str = "id, name, business_area, mode, created_at";

const FLEX_ATTRIBUTE_COLUMNS: &str =
    "id, program_id, name, owner, value_type, label, choices, created_at";

const PERIODIC_FIELD_COLUMNS: &str =
    "id, program_id, name, owner, label, subtype, number_of_rounds, round_names, created_at";

const HOUSEHOLD_COLUMNS: &str = "id, program_id, unicef_id, head_id, size, residence_status, \
     admin1, admin2, village, address, first_registration_date, returnee, consent_sharing, \
     flex_fields, withdrawn, created_at";

const INDIVIDUAL_COLUMNS: &str = "id, household_id, unicef_id, full_name, sex, birth_date, \
     marital_status, relationship, disability, observed_disability, pregnant, phone_no, \
     flex_fields, withdrawn";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        schema::run_migrations(&self.conn())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database lock poisoned")
    }

    // ============================================================
    // Program operations
    // ============================================================

    pub fn get_all_programs(&self) -> Result<Vec<Program>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM programs ORDER BY name",
            PROGRAM_COLUMNS
        ))?;

        let programs = stmt
            .query_map([], program_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(programs)
    }

    pub fn get_program(&self, id: Uuid) -> Result<Option<Program>> {
        let conn = self.conn();
        let program = conn
            .query_row(
                &format!("SELECT {} FROM programs WHERE id = ?", PROGRAM_COLUMNS),
                [id.to_string()],
                program_from_row,
            )
            .optional()?;
        Ok(program)
    }

    pub fn create_program(&self, input: CreateProgramInput) -> Result<Program> {
        if input.name.trim().is_empty() {
            anyhow::bail!("Program name must not be empty");
        }

        let conn = self.conn();
        let program = Program {
            id: Uuid::new_v4(),
            name: input.name,
            business_area: input.business_area,
            mode: input.mode.unwrap_or_default(),
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO programs (id, name, business_area, mode, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                program.id.to_string(),
                &program.name,
                &program.business_area,
                program.mode.as_str(),
                program.created_at.to_rfc3339(),
            ),
        )?;

        Ok(program)
    }

    fn require_program(&self, id: Uuid) -> Result<Program> {
        self.get_program(id)?
            .ok_or_else(|| anyhow::anyhow!("Program not found"))
    }

    // ============================================================
    // Field catalog operations
    // ============================================================

    pub fn get_flex_attributes(&self, program_id: Uuid) -> Result<Vec<FlexAttribute>> {
        query_flex_attributes(&self.conn(), program_id)
    }

    pub fn get_periodic_fields(&self, program_id: Uuid) -> Result<Vec<PeriodicField>> {
        query_periodic_fields(&self.conn(), program_id)
    }

    pub fn create_flex_attribute(
        &self,
        program_id: Uuid,
        input: CreateFlexAttributeInput,
    ) -> Result<FlexAttribute> {
        self.require_program(program_id)?;
        validate_field_name(&input.name)?;
        if !input.choices.is_empty()
            && !matches!(input.value_type, ValueType::Enum | ValueType::List)
        {
            anyhow::bail!("Choices must only be set on ENUM or LIST fields");
        }

        let conn = self.conn();
        ensure_field_name_available(&conn, program_id, &input.name)?;

        let attribute = FlexAttribute {
            id: Uuid::new_v4(),
            program_id,
            name: input.name,
            owner: input.owner,
            value_type: input.value_type,
            label: input.label,
            choices: input.choices,
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO flex_attributes (id, program_id, name, owner, value_type, label, choices, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                attribute.id.to_string(),
                program_id.to_string(),
                &attribute.name,
                attribute.owner.as_str(),
                attribute.value_type.as_str(),
                &attribute.label,
                serde_json::to_string(&attribute.choices)?,
                attribute.created_at.to_rfc3339(),
            ),
        )?;

        tracing::debug!(program_id = %program_id, name = %attribute.name, "Registered flex attribute");
        Ok(attribute)
    }

    pub fn create_periodic_field(
        &self,
        program_id: Uuid,
        input: CreatePeriodicFieldInput,
    ) -> Result<PeriodicField> {
        self.require_program(program_id)?;
        validate_field_name(&input.name)?;
        if input.number_of_rounds == 0 {
            anyhow::bail!("Periodic fields must have at least one round");
        }
        if matches!(input.subtype, ValueType::Enum | ValueType::List) {
            anyhow::bail!("Periodic field subtype must be STRING, NUMBER, BOOLEAN or DATE");
        }
        if input.round_names.len() > input.number_of_rounds as usize {
            anyhow::bail!("Round names must not outnumber rounds");
        }

        let conn = self.conn();
        ensure_field_name_available(&conn, program_id, &input.name)?;

        let field = PeriodicField {
            id: Uuid::new_v4(),
            program_id,
            name: input.name,
            owner: input.owner.unwrap_or(EntityKind::Individual),
            label: input.label,
            spec: PeriodicSpec {
                number_of_rounds: input.number_of_rounds,
                round_names: input.round_names,
                subtype: input.subtype,
            },
            created_at: Utc::now(),
        };

        conn.execute(
            "INSERT INTO periodic_fields (id, program_id, name, owner, label, subtype, number_of_rounds, round_names, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                field.id.to_string(),
                program_id.to_string(),
                &field.name,
                field.owner.as_str(),
                &field.label,
                field.spec.subtype.as_str(),
                field.spec.number_of_rounds,
                serde_json::to_string(&field.spec.round_names)?,
                field.created_at.to_rfc3339(),
            ),
        )?;

        tracing::debug!(program_id = %program_id, name = %field.name, "Registered periodic field");
        Ok(field)
    }

    /// Every field a rule for this program can reference.
    pub fn get_field_descriptors(&self, program_id: Uuid) -> Result<Vec<FieldDescriptor>> {
        self.require_program(program_id)?;
        let snapshot = SchemaSnapshot::capture(program_id, self)?;
        Ok(snapshot.fields().cloned().collect())
    }

    // ============================================================
    // Household operations
    // ============================================================

    /// Register a household and its members in one transaction.
    ///
    /// Exactly one member must be head. Person programs take exactly one
    /// member, who becomes the head.
    pub fn create_household(
        &self,
        program_id: Uuid,
        input: CreateHouseholdInput,
    ) -> Result<HouseholdRecord> {
        let program = self.require_program(program_id)?;
        let head_index = validate_household_input(&program, &input)?;

        let now = Utc::now();
        let household_id = Uuid::new_v4();
        let member_count = input.members.len() as i64;

        let members: Vec<Individual> = input
            .members
            .into_iter()
            .map(|m| Individual {
                id: Uuid::new_v4(),
                household_id,
                unicef_id: m.unicef_id,
                full_name: m.full_name,
                sex: m.sex,
                birth_date: m.birth_date,
                marital_status: m.marital_status,
                relationship: m.relationship,
                disability: m.disability,
                observed_disability: m.observed_disability,
                pregnant: m.pregnant,
                phone_no: m.phone_no,
                flex_fields: m.flex_fields,
                withdrawn: false,
            })
            .collect();

        let household = Household {
            id: household_id,
            program_id,
            unicef_id: input.unicef_id,
            head_id: Some(members[head_index].id),
            size: input.size.or(Some(member_count)),
            residence_status: input.residence_status,
            admin1: input.admin1,
            admin2: input.admin2,
            village: input.village,
            address: input.address,
            first_registration_date: input.first_registration_date,
            returnee: input.returnee,
            consent_sharing: input.consent_sharing,
            flex_fields: input.flex_fields,
            withdrawn: false,
            created_at: now,
        };

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if unicef_id_taken(&tx, "households", &household.unicef_id)? {
            anyhow::bail!("Household {} already exists", household.unicef_id);
        }

        tx.execute(
            &format!(
                "INSERT INTO households ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                HOUSEHOLD_COLUMNS
            ),
            params![
                household.id.to_string(),
                program_id.to_string(),
                &household.unicef_id,
                household.head_id.map(|id| id.to_string()),
                household.size,
                &household.residence_status,
                &household.admin1,
                &household.admin2,
                &household.village,
                &household.address,
                household.first_registration_date.map(format_date),
                household.returnee,
                serde_json::to_string(&household.consent_sharing)?,
                serde_json::to_string(&household.flex_fields)?,
                household.withdrawn,
                now.to_rfc3339(),
            ],
        )?;

        for member in &members {
            if unicef_id_taken(&tx, "individuals", &member.unicef_id)? {
                anyhow::bail!("Individual {} already exists", member.unicef_id);
            }
            insert_individual(&tx, member)?;
        }

        tx.commit()?;

        tracing::debug!(
            household = %household.unicef_id,
            members = members.len(),
            "Registered household"
        );
        Ok(HouseholdRecord { household, members })
    }

    /// A household with all its members, withdrawn ones included.
    pub fn get_household(&self, id: Uuid) -> Result<Option<HouseholdRecord>> {
        let conn = self.conn();
        let household = conn
            .query_row(
                &format!("SELECT {} FROM households WHERE id = ?", HOUSEHOLD_COLUMNS),
                [id.to_string()],
                household_from_row,
            )
            .optional()?;

        let Some(household) = household else {
            return Ok(None);
        };

        let members = query_individuals(
            &conn,
            "WHERE household_id = ? ORDER BY unicef_id",
            &id.to_string(),
        )?;
        Ok(Some(HouseholdRecord { household, members }))
    }

    /// All households of a program, withdrawn ones included.
    pub fn get_households(&self, program_id: Uuid) -> Result<Vec<HouseholdRecord>> {
        self.load_records(program_id, false)
    }

    pub fn withdraw_household(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE households SET withdrawn = 1 WHERE id = ?",
            [id.to_string()],
        )?;
        tx.execute(
            "UPDATE individuals SET withdrawn = 1 WHERE household_id = ?",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// In `PERSON` programs the household only wraps this individual, so it
    /// is withdrawn along with them.
    pub fn withdraw_individual(&self, id: Uuid) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE individuals SET withdrawn = 1 WHERE id = ?",
            [id.to_string()],
        )?;
        tx.execute(
            "UPDATE households SET withdrawn = 1
             WHERE id = (SELECT household_id FROM individuals WHERE id = ?)
               AND program_id IN (SELECT id FROM programs WHERE mode = 'PERSON')",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn get_individual(&self, id: Uuid) -> Result<Option<Individual>> {
        let conn = self.conn();
        let mut individuals = query_individuals(&conn, "WHERE id = ?", &id.to_string())?;
        Ok(individuals.pop())
    }

    /// Store one round of a periodic field on an individual.
    ///
    /// The field must be registered for the individual's program and the
    /// round must be within its configured rounds.
    pub fn record_periodic_value(
        &self,
        individual_id: Uuid,
        input: RecordPeriodicValueInput,
    ) -> Result<Option<Individual>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let Some(mut individual) =
            query_individuals(&tx, "WHERE id = ?", &individual_id.to_string())?.pop()
        else {
            return Ok(None);
        };

        let program_id: String = tx.query_row(
            "SELECT program_id FROM households WHERE id = ?",
            [individual.household_id.to_string()],
            |row| row.get(0),
        )?;
        let field = query_periodic_fields(&tx, parse_uuid(program_id))?
            .into_iter()
            .find(|f| f.name == input.field)
            .ok_or_else(|| anyhow::anyhow!("Periodic field `{}` not found", input.field))?;

        if field.owner != EntityKind::Individual {
            anyhow::bail!("Periodic field `{}` must be an INDIVIDUAL field", field.name);
        }
        if input.round == 0 || input.round > field.spec.number_of_rounds {
            anyhow::bail!(
                "Round {} must be between 1 and {}",
                input.round,
                field.spec.number_of_rounds
            );
        }

        let rounds = individual
            .flex_fields
            .entry(field.name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !rounds.is_object() {
            *rounds = Value::Object(Map::new());
        }
        if let Some(rounds) = rounds.as_object_mut() {
            rounds.insert(
                input.round.to_string(),
                json!({
                    "value": input.value,
                    "collection_date": input.collection_date.map(format_date),
                }),
            );
        }

        tx.execute(
            "UPDATE individuals SET flex_fields = ? WHERE id = ?",
            (
                serde_json::to_string(&individual.flex_fields)?,
                individual_id.to_string(),
            ),
        )?;
        tx.commit()?;

        Ok(Some(individual))
    }

    fn load_records(&self, program_id: Uuid, current_only: bool) -> Result<Vec<HouseholdRecord>> {
        let conn = self.conn();
        let withdrawn_filter = if current_only { " AND withdrawn = 0" } else { "" };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM households WHERE program_id = ?{} ORDER BY unicef_id",
            HOUSEHOLD_COLUMNS, withdrawn_filter
        ))?;
        let households = stmt
            .query_map([program_id.to_string()], household_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let members = query_individuals(
            &conn,
            &format!(
                "WHERE household_id IN (SELECT id FROM households WHERE program_id = ?){} ORDER BY unicef_id",
                withdrawn_filter
            ),
            &program_id.to_string(),
        )?;

        let mut by_household: HashMap<Uuid, Vec<Individual>> = HashMap::new();
        for member in members {
            by_household.entry(member.household_id).or_default().push(member);
        }

        Ok(households
            .into_iter()
            .map(|household| {
                let members = by_household.remove(&household.id).unwrap_or_default();
                HouseholdRecord { household, members }
            })
            .collect())
    }

    // ============================================================
    // Targeting operations
    // ============================================================

    fn compile_for_program(
        &self,
        program_id: Uuid,
        request: &TargetingRequest,
        as_of: NaiveDate,
    ) -> Result<(Program, CompiledTargeting)> {
        let program = self.require_program(program_id)?;
        let exclusions = match &request.exclusions {
            Some(spec) if spec.program_mode != program.mode => anyhow::bail!(
                "Exclusion programMode must match the program mode ({})",
                program.mode.as_str()
            ),
            Some(spec) => spec.clone(),
            None => ExclusionSpec {
                ids: Vec::new(),
                program_mode: program.mode,
            },
        };

        let snapshot = SchemaSnapshot::capture(program_id, self)?;
        let compiled =
            targeting::compile_targeting(&snapshot, &request.criteria, &exclusions, as_of)?;
        Ok((program, compiled))
    }

    /// Compile the request without touching the population.
    pub fn validate_targeting(
        &self,
        program_id: Uuid,
        request: &TargetingRequest,
        as_of: NaiveDate,
    ) -> Result<CriteriaSummary> {
        let (_, compiled) = self.compile_for_program(program_id, request, as_of)?;
        let rules = &request.criteria.rules;
        Ok(CriteriaSummary {
            rules: rules.len(),
            household_filters: rules.iter().map(|r| r.household_filters.len()).sum(),
            individual_blocks: rules.iter().map(|r| r.individual_blocks.len()).sum(),
            excluded_ids: compiled.exclusions().len(),
        })
    }

    /// Compile the request and run it over the program's current population.
    pub fn preview_targeting(
        &self,
        program_id: Uuid,
        request: &TargetingRequest,
        as_of: NaiveDate,
    ) -> Result<TargetingPreview> {
        let (program, compiled) = self.compile_for_program(program_id, request, as_of)?;
        let population = self.population(program_id)?;
        let (selected, excluded) = compiled.partition(&population);

        let ids = |records: Vec<&HouseholdRecord>| -> Vec<String> {
            records
                .into_iter()
                .flat_map(|r| entity_ids(r, program.mode))
                .collect()
        };

        let preview = TargetingPreview {
            program_id,
            program_mode: program.mode,
            as_of,
            total_candidates: population.len(),
            matched_ids: ids(selected),
            excluded_ids: ids(excluded),
        };

        tracing::info!(
            program_id = %program_id,
            candidates = preview.total_candidates,
            matched = preview.matched_ids.len(),
            excluded = preview.excluded_ids.len(),
            "Targeting preview"
        );
        Ok(preview)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

impl ProgramFieldCatalog for Database {
    fn program_fields(&self, program_id: Uuid) -> Result<ProgramFields> {
        let conn = self.conn();
        let tx = conn.unchecked_transaction()?;
        let flex_attributes = query_flex_attributes(&tx, program_id)?;
        let periodic_fields = query_periodic_fields(&tx, program_id)?;
        tx.commit()?;

        Ok(ProgramFields {
            flex_attributes,
            periodic_fields,
        })
    }
}

impl HouseholdStore for Database {
    fn households_for_program(&self, program_id: Uuid) -> Result<Vec<Household>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM households WHERE program_id = ? AND withdrawn = 0 ORDER BY unicef_id",
            HOUSEHOLD_COLUMNS
        ))?;
        let households = stmt
            .query_map([program_id.to_string()], household_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(households)
    }

    fn members(&self, household_id: Uuid) -> Result<Vec<Individual>> {
        query_individuals(
            &self.conn(),
            "WHERE household_id = ? AND withdrawn = 0 ORDER BY unicef_id",
            &household_id.to_string(),
        )
    }

    fn head_of_household(&self, household_id: Uuid) -> Result<Option<Individual>> {
        let mut heads = query_individuals(
            &self.conn(),
            "WHERE id = (SELECT head_id FROM households WHERE id = ?1) AND withdrawn = 0",
            &household_id.to_string(),
        )?;
        Ok(heads.pop())
    }

    fn population(&self, program_id: Uuid) -> Result<Vec<HouseholdRecord>> {
        self.load_records(program_id, true)
    }
}

fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "targeting")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("targeting.db"))
}

fn validate_field_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Field name must not be empty");
    }
    if core_field(name).is_some() {
        anyhow::bail!("Field name `{}` must not shadow a core field", name);
    }
    Ok(())
}

fn ensure_field_name_available(conn: &Connection, program_id: Uuid, name: &str) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM flex_attributes WHERE program_id = ?1 AND name = ?2)
              + (SELECT COUNT(*) FROM periodic_fields WHERE program_id = ?1 AND name = ?2)",
        (program_id.to_string(), name),
        |row| row.get(0),
    )?;
    if count > 0 {
        anyhow::bail!("Field `{}` is already defined for this program", name);
    }
    Ok(())
}

/// Returns the index of the head member.
fn validate_household_input(program: &Program, input: &CreateHouseholdInput) -> Result<usize> {
    if input.unicef_id.trim().is_empty() {
        anyhow::bail!("Household unicef_id must not be empty");
    }
    if input.members.is_empty() {
        anyhow::bail!("Households must have at least one member");
    }

    check_choice("residence_status", input.residence_status.as_deref())?;
    for option in &input.consent_sharing {
        check_choice("consent_sharing", Some(option))?;
    }
    for member in &input.members {
        if member.unicef_id.trim().is_empty() {
            anyhow::bail!("Individual unicef_id must not be empty");
        }
        check_choice("sex", member.sex.as_deref())?;
        check_choice("marital_status", member.marital_status.as_deref())?;
        check_choice("relationship", member.relationship.as_deref())?;
        for option in &member.observed_disability {
            check_choice("observed_disability", Some(option))?;
        }
    }

    match program.mode {
        ProgramMode::Person => {
            if input.members.len() != 1 {
                anyhow::bail!("Person programs must register exactly one member per household");
            }
            Ok(0)
        }
        ProgramMode::Household => {
            let heads: Vec<usize> = input
                .members
                .iter()
                .enumerate()
                .filter(|(_, m)| m.is_head)
                .map(|(i, _)| i)
                .collect();
            match heads.as_slice() {
                [head] => Ok(*head),
                _ => anyhow::bail!("Households must have exactly one head, got {}", heads.len()),
            }
        }
    }
}

fn check_choice(field: &str, value: Option<&str>) -> Result<()> {
    let (Some(value), Some(core)) = (value, core_field(field)) else {
        return Ok(());
    };
    if !core.choices.is_empty() && !core.choices.contains(&value) {
        anyhow::bail!("`{}` must be one of {}", field, core.choices.join(", "));
    }
    Ok(())
}

fn unicef_id_taken(conn: &Connection, table: &str, unicef_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE unicef_id = ?", table),
        [unicef_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn insert_individual(conn: &Connection, member: &Individual) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO individuals ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            INDIVIDUAL_COLUMNS
        ),
        params![
            member.id.to_string(),
            member.household_id.to_string(),
            &member.unicef_id,
            &member.full_name,
            &member.sex,
            member.birth_date.map(format_date),
            &member.marital_status,
            &member.relationship,
            member.disability,
            serde_json::to_string(&member.observed_disability)?,
            member.pregnant,
            &member.phone_no,
            serde_json::to_string(&member.flex_fields)?,
            member.withdrawn,
        ],
    )?;
    Ok(())
}

fn query_flex_attributes(conn: &Connection, program_id: Uuid) -> Result<Vec<FlexAttribute>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM flex_attributes WHERE program_id = ? ORDER BY name",
        FLEX_ATTRIBUTE_COLUMNS
    ))?;
    let attributes = stmt
        .query_map([program_id.to_string()], |row| {
            Ok(FlexAttribute {
                id: parse_uuid(row.get::<_, String>(0)?),
                program_id: parse_uuid(row.get::<_, String>(1)?),
                name: row.get(2)?,
                owner: EntityKind::from_str(&row.get::<_, String>(3)?)
                    .unwrap_or(EntityKind::Individual),
                value_type: ValueType::from_str(&row.get::<_, String>(4)?)
                    .unwrap_or(ValueType::String),
                label: row.get(5)?,
                choices: parse_json(row.get::<_, String>(6)?),
                created_at: parse_datetime(row.get::<_, String>(7)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(attributes)
}

fn query_periodic_fields(conn: &Connection, program_id: Uuid) -> Result<Vec<PeriodicField>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM periodic_fields WHERE program_id = ? ORDER BY name",
        PERIODIC_FIELD_COLUMNS
    ))?;
    let fields = stmt
        .query_map([program_id.to_string()], |row| {
            Ok(PeriodicField {
                id: parse_uuid(row.get::<_, String>(0)?),
                program_id: parse_uuid(row.get::<_, String>(1)?),
                name: row.get(2)?,
                owner: EntityKind::from_str(&row.get::<_, String>(3)?)
                    .unwrap_or(EntityKind::Individual),
                label: row.get(4)?,
                spec: PeriodicSpec {
                    subtype: ValueType::from_str(&row.get::<_, String>(5)?)
                        .unwrap_or(ValueType::String),
                    number_of_rounds: row.get(6)?,
                    round_names: parse_json(row.get::<_, String>(7)?),
                },
                created_at: parse_datetime(row.get::<_, String>(8)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fields)
}

/// `clause` binds a single parameter.
fn query_individuals(conn: &Connection, clause: &str, param: &str) -> Result<Vec<Individual>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM individuals {}",
        INDIVIDUAL_COLUMNS, clause
    ))?;
    let individuals = stmt
        .query_map([param], individual_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(individuals)
}

fn program_from_row(row: &Row<'_>) -> rusqlite::Result<Program> {
    Ok(Program {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        business_area: row.get(2)?,
        mode: ProgramMode::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

fn household_from_row(row: &Row<'_>) -> rusqlite::Result<Household> {
    Ok(Household {
        id: parse_uuid(row.get::<_, String>(0)?),
        program_id: parse_uuid(row.get::<_, String>(1)?),
        unicef_id: row.get(2)?,
        head_id: row.get::<_, Option<String>>(3)?.map(parse_uuid),
        size: row.get(4)?,
        residence_status: row.get(5)?,
        admin1: row.get(6)?,
        admin2: row.get(7)?,
        village: row.get(8)?,
        address: row.get(9)?,
        first_registration_date: row.get::<_, Option<String>>(10)?.and_then(parse_date),
        returnee: row.get(11)?,
        consent_sharing: parse_json(row.get::<_, String>(12)?),
        flex_fields: parse_json(row.get::<_, String>(13)?),
        withdrawn: row.get(14)?,
        created_at: parse_datetime(row.get::<_, String>(15)?),
    })
}

fn individual_from_row(row: &Row<'_>) -> rusqlite::Result<Individual> {
    Ok(Individual {
        id: parse_uuid(row.get::<_, String>(0)?),
        household_id: parse_uuid(row.get::<_, String>(1)?),
        unicef_id: row.get(2)?,
        full_name: row.get(3)?,
        sex: row.get(4)?,
        birth_date: row.get::<_, Option<String>>(5)?.and_then(parse_date),
        marital_status: row.get(6)?,
        relationship: row.get(7)?,
        disability: row.get(8)?,
        observed_disability: parse_json(row.get::<_, String>(9)?),
        pregnant: row.get(10)?,
        phone_no: row.get(11)?,
        flex_fields: parse_json(row.get::<_, String>(12)?),
        withdrawn: row.get(13)?,
    })
}

/// Targeting result IDs for one record in the given mode.
fn entity_ids(record: &HouseholdRecord, mode: ProgramMode) -> Vec<String> {
    match mode {
        ProgramMode::Household => vec![record.household.unicef_id.clone()],
        ProgramMode::Person => record
            .members
            .iter()
            .filter(|m| !m.withdrawn)
            .map(|m| m.unicef_id.clone())
            .collect(),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: String) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(s: String) -> T {
    serde_json::from_str(&s).unwrap_or_default()
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
