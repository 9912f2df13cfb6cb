use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use serde_json::json;
use speculate2::speculate;
use targeting::db::Database;
use targeting::models::*;
use targeting::targeting::{CompileError, HouseholdStore, ProgramFieldCatalog};
use uuid::Uuid;

fn create_test_program(db: &Database, mode: ProgramMode) -> Program {
    db.create_program(CreateProgramInput {
        name: "Cash Assistance".to_string(),
        business_area: "afghanistan".to_string(),
        mode: Some(mode),
    })
    .expect("Failed to create program")
}

fn member(unicef_id: &str, sex: &str, is_head: bool) -> CreateIndividualInput {
    CreateIndividualInput {
        unicef_id: unicef_id.to_string(),
        full_name: format!("Member {}", unicef_id),
        is_head,
        sex: Some(sex.to_string()),
        ..Default::default()
    }
}

fn household_input(unicef_id: &str, members: Vec<CreateIndividualInput>) -> CreateHouseholdInput {
    CreateHouseholdInput {
        unicef_id: unicef_id.to_string(),
        members,
        ..Default::default()
    }
}

fn add_pdu_field(db: &Database, program_id: Uuid) -> PeriodicField {
    db.create_periodic_field(
        program_id,
        CreatePeriodicFieldInput {
            name: "food_score".to_string(),
            owner: None,
            label: Some("Food consumption score".to_string()),
            subtype: ValueType::Number,
            number_of_rounds: 2,
            round_names: vec!["May".to_string()],
        },
    )
    .expect("Failed to create periodic field")
}

fn female_head_request() -> TargetingRequest {
    TargetingRequest {
        criteria: TargetingCriteria {
            rules: vec![Rule {
                household_filters: vec![],
                individual_blocks: vec![IndividualFilterBlock {
                    target_only_head_of_household: true,
                    filters: vec![FilterCondition::core("sex", ComparisonMethod::Equals, &["FEMALE"])],
                }],
            }],
        },
        exclusions: None,
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "programs" {
        it "defaults to household mode" {
            let program = db.create_program(CreateProgramInput {
                name: "Nutrition".to_string(),
                business_area: "ukraine".to_string(),
                mode: None,
            }).expect("Failed to create program");

            assert_eq!(program.mode, ProgramMode::Household);
            let found = db.get_program(program.id).expect("Query failed").expect("Program missing");
            assert_eq!(found.name, "Nutrition");
        }

        it "rejects an empty name" {
            let result = db.create_program(CreateProgramInput {
                name: "  ".to_string(),
                business_area: "ukraine".to_string(),
                mode: None,
            });
            assert!(result.is_err());
        }

        it "returns None for non-existent program" {
            assert!(db.get_program(Uuid::new_v4()).expect("Query failed").is_none());
        }

        it "lists programs by name" {
            create_test_program(&db, ProgramMode::Household);
            db.create_program(CreateProgramInput {
                name: "Above All".to_string(),
                business_area: "sudan".to_string(),
                mode: Some(ProgramMode::Person),
            }).expect("Failed to create program");

            let names: Vec<String> = db.get_all_programs().expect("Query failed")
                .into_iter().map(|p| p.name).collect();
            assert_eq!(names, vec!["Above All", "Cash Assistance"]);
        }
    }

    describe "field catalog" {
        it "registers flex attributes" {
            let program = create_test_program(&db, ProgramMode::Household);
            let attribute = db.create_flex_attribute(program.id, CreateFlexAttributeInput {
                name: "water_source".to_string(),
                owner: EntityKind::Household,
                value_type: ValueType::Enum,
                label: None,
                choices: vec!["WELL".to_string(), "RIVER".to_string()],
            }).expect("Failed to create flex attribute");

            let attributes = db.get_flex_attributes(program.id).expect("Query failed");
            assert_eq!(attributes.len(), 1);
            assert_eq!(attributes[0].id, attribute.id);
            assert_eq!(attributes[0].choices, vec!["WELL", "RIVER"]);
        }

        it "rejects names that shadow core fields" {
            let program = create_test_program(&db, ProgramMode::Household);
            let err = db.create_flex_attribute(program.id, CreateFlexAttributeInput {
                name: "sex".to_string(),
                owner: EntityKind::Individual,
                value_type: ValueType::String,
                label: None,
                choices: vec![],
            }).unwrap_err();
            assert!(err.to_string().contains("core field"));
        }

        it "rejects a name already used by another field" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);

            let err = db.create_flex_attribute(program.id, CreateFlexAttributeInput {
                name: "food_score".to_string(),
                owner: EntityKind::Individual,
                value_type: ValueType::Number,
                label: None,
                choices: vec![],
            }).unwrap_err();
            assert!(err.to_string().contains("already defined"));
        }

        it "rejects choices on non-choice fields" {
            let program = create_test_program(&db, ProgramMode::Household);
            let result = db.create_flex_attribute(program.id, CreateFlexAttributeInput {
                name: "income".to_string(),
                owner: EntityKind::Household,
                value_type: ValueType::Number,
                label: None,
                choices: vec!["LOW".to_string()],
            });
            assert!(result.is_err());
        }

        it "registers periodic fields owned by individuals by default" {
            let program = create_test_program(&db, ProgramMode::Household);
            let field = add_pdu_field(&db, program.id);

            assert_eq!(field.owner, EntityKind::Individual);
            let fields = db.get_periodic_fields(program.id).expect("Query failed");
            assert_eq!(fields[0].spec.number_of_rounds, 2);
            assert_eq!(fields[0].spec.round_names, vec!["May"]);
        }

        it "rejects periodic fields without rounds" {
            let program = create_test_program(&db, ProgramMode::Household);
            let result = db.create_periodic_field(program.id, CreatePeriodicFieldInput {
                name: "score".to_string(),
                owner: None,
                label: None,
                subtype: ValueType::Number,
                number_of_rounds: 0,
                round_names: vec![],
            });
            assert!(result.is_err());
        }

        it "exposes the catalog per program" {
            let program = create_test_program(&db, ProgramMode::Household);
            let other = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);

            assert_eq!(db.program_fields(program.id).expect("Query failed").periodic_fields.len(), 1);
            assert!(db.program_fields(other.id).expect("Query failed").periodic_fields.is_empty());
        }

        it "lists core, flex and periodic descriptors" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);

            let fields = db.get_field_descriptors(program.id).expect("Query failed");
            assert!(fields.iter().any(|f| f.name == "sex" && f.classification == FieldClassification::Core));
            assert!(fields.iter().any(|f| f.name == "food_score" && f.classification == FieldClassification::Pdu));
        }
    }

    describe "households" {
        it "creates a household with its head" {
            let program = create_test_program(&db, ProgramMode::Household);
            let record = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", true),
                member("IND-2", "MALE", false),
            ])).expect("Failed to create household");

            assert_eq!(record.household.size, Some(2));
            assert_eq!(record.head().map(|h| h.unicef_id.as_str()), Some("IND-1"));

            let found = db.get_household(record.household.id).expect("Query failed").expect("Household missing");
            assert_eq!(found.members.len(), 2);
            assert_eq!(found.household.head_id, record.household.head_id);
        }

        it "requires exactly one head" {
            let program = create_test_program(&db, ProgramMode::Household);
            let none = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", false),
            ]));
            let two = db.create_household(program.id, household_input("HH-2", vec![
                member("IND-2", "FEMALE", true),
                member("IND-3", "MALE", true),
            ]));
            assert!(none.is_err());
            assert!(two.is_err());
        }

        it "requires a single member in person programs" {
            let program = create_test_program(&db, ProgramMode::Person);
            let pair = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", false),
                member("IND-2", "MALE", false),
            ]));
            assert!(pair.is_err());

            let single = db.create_household(program.id, household_input("HH-2", vec![
                member("IND-3", "FEMALE", false),
            ])).expect("Failed to create household");
            assert_eq!(single.head().map(|h| h.unicef_id.as_str()), Some("IND-3"));
        }

        it "rejects values outside core choices" {
            let program = create_test_program(&db, ProgramMode::Household);
            let err = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "UNSPECIFIED", true),
            ])).unwrap_err();
            assert!(err.to_string().contains("must be one of"));
        }

        it "rejects duplicate unicef ids" {
            let program = create_test_program(&db, ProgramMode::Household);
            db.create_household(program.id, household_input("HH-1", vec![member("IND-1", "FEMALE", true)]))
                .expect("Failed to create household");

            let err = db.create_household(program.id, household_input("HH-1", vec![member("IND-2", "MALE", true)]))
                .unwrap_err();
            assert!(err.to_string().contains("already exists"));
            assert_eq!(db.get_households(program.id).expect("Query failed").len(), 1);
        }

        it "leaves withdrawn entities out of the population" {
            let program = create_test_program(&db, ProgramMode::Household);
            let first = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", true),
                member("IND-2", "MALE", false),
            ])).expect("Failed to create household");
            let second = db.create_household(program.id, household_input("HH-2", vec![
                member("IND-3", "FEMALE", true),
            ])).expect("Failed to create household");

            assert!(db.withdraw_individual(first.members[1].id).expect("Update failed"));
            assert!(db.withdraw_household(second.household.id).expect("Update failed"));

            let population = db.population(program.id).expect("Query failed");
            assert_eq!(population.len(), 1);
            assert_eq!(population[0].members.len(), 1);
            assert_eq!(db.get_households(program.id).expect("Query failed").len(), 2);
            assert!(db.head_of_household(second.household.id).expect("Query failed").is_none());
        }

        it "withdraws the wrapping household in person programs" {
            let program = create_test_program(&db, ProgramMode::Person);
            let withdrawn = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", false),
            ])).expect("Failed to create household");
            db.create_household(program.id, household_input("HH-2", vec![
                member("IND-2", "MALE", false),
            ])).expect("Failed to create household");

            assert!(db.withdraw_individual(withdrawn.members[0].id).expect("Update failed"));

            let population = db.population(program.id).expect("Query failed");
            assert_eq!(population.len(), 1);
            assert_eq!(population[0].household.unicef_id, "HH-2");

            let everyone = TargetingRequest {
                criteria: TargetingCriteria { rules: vec![Rule::default()] },
                exclusions: None,
            };
            let preview = db.preview_targeting(program.id, &everyone, today()).expect("Preview failed");
            assert_eq!(preview.total_candidates, 1);
            assert_eq!(preview.matched_ids, vec!["IND-2"]);
        }

        it "reports withdrawing an unknown household" {
            assert!(!db.withdraw_household(Uuid::new_v4()).expect("Update failed"));
        }
    }

    describe "periodic data" {
        it "stores a round value on the individual" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);
            let record = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", true),
            ])).expect("Failed to create household");

            let individual = db.record_periodic_value(record.members[0].id, RecordPeriodicValueInput {
                field: "food_score".to_string(),
                round: 1,
                value: json!(42),
                collection_date: NaiveDate::from_ymd_opt(2024, 5, 3),
            }).expect("Update failed").expect("Individual missing");

            assert_eq!(individual.flex_fields["food_score"]["1"]["value"], json!(42));
            assert_eq!(individual.flex_fields["food_score"]["1"]["collection_date"], json!("2024-05-03"));
        }

        it "keeps both rounds when they are recorded concurrently" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);

            for trial in 0..50 {
                let record = db.create_household(program.id, household_input(&format!("HH-{}", trial), vec![
                    member(&format!("IND-{}", trial), "FEMALE", true),
                ])).expect("Failed to create household");
                let individual_id = record.members[0].id;
                let barrier = Arc::new(Barrier::new(2));

                let writers: Vec<_> = [1u32, 2].into_iter().map(|round| {
                    let db = db.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        db.record_periodic_value(individual_id, RecordPeriodicValueInput {
                            field: "food_score".to_string(),
                            round,
                            value: json!(round * 10),
                            collection_date: None,
                        }).expect("Update failed");
                    })
                }).collect();
                for writer in writers {
                    writer.join().expect("Writer panicked");
                }

                let stored = db.get_individual(individual_id).expect("Query failed").expect("Individual missing");
                assert_eq!(stored.flex_fields["food_score"]["1"]["value"], json!(10), "trial {}", trial);
                assert_eq!(stored.flex_fields["food_score"]["2"]["value"], json!(20), "trial {}", trial);
            }
        }

        it "rejects rounds outside the field's range" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);
            let record = db.create_household(program.id, household_input("HH-1", vec![
                member("IND-1", "FEMALE", true),
            ])).expect("Failed to create household");

            let result = db.record_periodic_value(record.members[0].id, RecordPeriodicValueInput {
                field: "food_score".to_string(),
                round: 3,
                value: json!(1),
                collection_date: None,
            });
            assert!(result.is_err());
        }
    }

    describe "targeting previews" {
        it "previews household ids and exclusions" {
            let program = create_test_program(&db, ProgramMode::Household);
            for (hh, ind, sex) in [("HH-1", "IND-1", "FEMALE"), ("HH-2", "IND-2", "FEMALE"), ("HH-3", "IND-3", "MALE")] {
                db.create_household(program.id, household_input(hh, vec![member(ind, sex, true)]))
                    .expect("Failed to create household");
            }

            let mut request = female_head_request();
            request.exclusions = Some(ExclusionSpec {
                ids: vec!["HH-2".to_string()],
                program_mode: ProgramMode::Household,
            });
            let preview = db.preview_targeting(program.id, &request, today()).expect("Preview failed");

            assert_eq!(preview.total_candidates, 3);
            assert_eq!(preview.matched_ids, vec!["HH-1"]);
            assert_eq!(preview.excluded_ids, vec!["HH-2"]);
        }

        it "previews individual ids in person programs" {
            let program = create_test_program(&db, ProgramMode::Person);
            db.create_household(program.id, household_input("HH-1", vec![member("IND-1", "FEMALE", false)]))
                .expect("Failed to create household");

            let preview = db.preview_targeting(program.id, &female_head_request(), today()).expect("Preview failed");
            assert_eq!(preview.program_mode, ProgramMode::Person);
            assert_eq!(preview.matched_ids, vec!["IND-1"]);
        }

        it "matches periodic data recorded per round" {
            let program = create_test_program(&db, ProgramMode::Household);
            add_pdu_field(&db, program.id);
            let record = db.create_household(program.id, household_input("HH-1", vec![member("IND-1", "FEMALE", true)]))
                .expect("Failed to create household");

            let request = TargetingRequest {
                criteria: TargetingCriteria {
                    rules: vec![Rule {
                        household_filters: vec![],
                        individual_blocks: vec![IndividualFilterBlock {
                            target_only_head_of_household: false,
                            filters: vec![FilterCondition::periodic("food_score", Some(1), ComparisonMethod::LessThan, &["21"])],
                        }],
                    }],
                },
                exclusions: None,
            };

            let before = db.preview_targeting(program.id, &request, today()).expect("Preview failed");
            assert!(before.matched_ids.is_empty());

            db.record_periodic_value(record.members[0].id, RecordPeriodicValueInput {
                field: "food_score".to_string(),
                round: 1,
                value: json!("14.5"),
                collection_date: None,
            }).expect("Update failed");

            let after = db.preview_targeting(program.id, &request, today()).expect("Preview failed");
            assert_eq!(after.matched_ids, vec!["HH-1"]);
        }

        it "rejects exclusions for the wrong program mode" {
            let program = create_test_program(&db, ProgramMode::Household);
            let mut request = female_head_request();
            request.exclusions = Some(ExclusionSpec {
                ids: vec!["IND-1".to_string()],
                program_mode: ProgramMode::Person,
            });

            let err = db.validate_targeting(program.id, &request, today()).unwrap_err();
            assert!(err.to_string().contains("must match"));
        }

        it "surfaces compile errors" {
            let program = create_test_program(&db, ProgramMode::Household);
            let request = TargetingRequest {
                criteria: TargetingCriteria {
                    rules: vec![Rule {
                        household_filters: vec![FilterCondition::flex("missing", ComparisonMethod::Equals, &["x"])],
                        individual_blocks: vec![],
                    }],
                },
                exclusions: None,
            };

            let err = db.validate_targeting(program.id, &request, today()).unwrap_err();
            let compile = err.downcast_ref::<CompileError>().expect("compile error");
            assert_eq!(compile.code(), "UnknownFieldError");
        }

        it "summarizes valid criteria" {
            let program = create_test_program(&db, ProgramMode::Household);
            let summary = db.validate_targeting(program.id, &female_head_request(), today()).expect("Validation failed");
            assert_eq!(summary, CriteriaSummary {
                rules: 1,
                household_filters: 0,
                individual_blocks: 1,
                excluded_ids: 0,
            });
        }
    }

    describe "on-disk database" {
        it "persists across reopen" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("targeting.db");

            let program_id = {
                let db = Database::open(path.clone()).expect("Failed to open database");
                db.migrate().expect("Failed to run migrations");
                create_test_program(&db, ProgramMode::Person).id
            };

            let reopened = Database::open(path).expect("Failed to reopen database");
            reopened.migrate().expect("Failed to run migrations");
            let program = reopened.get_program(program_id).expect("Query failed").expect("Program missing");
            assert_eq!(program.mode, ProgramMode::Person);
        }
    }
}
