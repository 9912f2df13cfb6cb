//! Static table of core fields available to every program.

use chrono::{Datelike, NaiveDate};

use super::value::TypedValue;
use crate::models::{EntityKind, FieldClassification, FieldDescriptor, Household, Individual, ValueType};

pub const SEX_CHOICES: &[&str] = &["MALE", "FEMALE", "OTHER", "NOT_COLLECTED", "NOT_ANSWERED"];

pub const MARITAL_STATUS_CHOICES: &[&str] =
    &["SINGLE", "MARRIED", "WIDOWED", "DIVORCED", "SEPARATED"];

pub const RELATIONSHIP_CHOICES: &[&str] = &[
    "HEAD",
    "WIFE_HUSBAND",
    "SON_DAUGHTER",
    "BROTHER_SISTER",
    "MOTHER_FATHER",
    "GRANDSON_GRANDDAUGHTER",
    "OTHER_RELATIVE",
    "NON_RELATIVE",
];

pub const RESIDENCE_STATUS_CHOICES: &[&str] =
    &["HOST", "IDP", "REFUGEE", "OTHERS_OF_CONCERN", "RETURNEE"];

pub const DISABILITY_CHOICES: &[&str] = &[
    "NONE",
    "SEEING",
    "HEARING",
    "WALKING",
    "MEMORY",
    "SELF_CARE",
    "COMMUNICATING",
];

pub const CONSENT_SHARING_CHOICES: &[&str] = &[
    "UNICEF",
    "HUMANITARIAN_PARTNER",
    "PRIVATE_PARTNER",
    "GOVERNMENT_PARTNER",
];

/// Reads a core field's value from its owning entity.
///
/// Individual readers receive the compile's reference date for derived
/// fields such as `age`.
#[derive(Clone, Copy)]
pub enum CoreReader {
    Household(fn(&Household) -> Option<TypedValue>),
    Individual(fn(&Individual, NaiveDate) -> Option<TypedValue>),
}

impl std::fmt::Debug for CoreReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Household(_) => f.write_str("CoreReader::Household"),
            Self::Individual(_) => f.write_str("CoreReader::Individual"),
        }
    }
}

#[derive(Debug)]
pub struct CoreField {
    pub name: &'static str,
    pub label: &'static str,
    pub value_type: ValueType,
    pub choices: &'static [&'static str],
    pub reader: CoreReader,
}

impl CoreField {
    pub fn owner(&self) -> EntityKind {
        match self.reader {
            CoreReader::Household(_) => EntityKind::Household,
            CoreReader::Individual(_) => EntityKind::Individual,
        }
    }

    pub fn descriptor(&self) -> FieldDescriptor {
        FieldDescriptor {
            name: self.name.to_string(),
            owner: self.owner(),
            value_type: self.value_type,
            classification: FieldClassification::Core,
            label: Some(self.label.to_string()),
            choices: self.choices.iter().map(|c| c.to_string()).collect(),
            periodic: None,
        }
    }
}

pub static CORE_FIELDS: &[CoreField] = &[
    CoreField {
        name: "size",
        label: "Household size",
        value_type: ValueType::Number,
        choices: &[],
        reader: CoreReader::Household(household_size),
    },
    CoreField {
        name: "residence_status",
        label: "Residence status",
        value_type: ValueType::Enum,
        choices: RESIDENCE_STATUS_CHOICES,
        reader: CoreReader::Household(household_residence_status),
    },
    CoreField {
        name: "admin1",
        label: "Administrative level 1",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Household(household_admin1),
    },
    CoreField {
        name: "admin2",
        label: "Administrative level 2",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Household(household_admin2),
    },
    CoreField {
        name: "village",
        label: "Village",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Household(household_village),
    },
    CoreField {
        name: "address",
        label: "Address",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Household(household_address),
    },
    CoreField {
        name: "first_registration_date",
        label: "First registration date",
        value_type: ValueType::Date,
        choices: &[],
        reader: CoreReader::Household(household_first_registration_date),
    },
    CoreField {
        name: "returnee",
        label: "Returnee household",
        value_type: ValueType::Boolean,
        choices: &[],
        reader: CoreReader::Household(household_returnee),
    },
    CoreField {
        name: "consent_sharing",
        label: "Consent to share data with",
        value_type: ValueType::List,
        choices: CONSENT_SHARING_CHOICES,
        reader: CoreReader::Household(household_consent_sharing),
    },
    CoreField {
        name: "full_name",
        label: "Full name",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Individual(individual_full_name),
    },
    CoreField {
        name: "sex",
        label: "Sex",
        value_type: ValueType::Enum,
        choices: SEX_CHOICES,
        reader: CoreReader::Individual(individual_sex),
    },
    CoreField {
        name: "birth_date",
        label: "Birth date",
        value_type: ValueType::Date,
        choices: &[],
        reader: CoreReader::Individual(individual_birth_date),
    },
    CoreField {
        name: "age",
        label: "Age (years)",
        value_type: ValueType::Number,
        choices: &[],
        reader: CoreReader::Individual(individual_age),
    },
    CoreField {
        name: "marital_status",
        label: "Marital status",
        value_type: ValueType::Enum,
        choices: MARITAL_STATUS_CHOICES,
        reader: CoreReader::Individual(individual_marital_status),
    },
    CoreField {
        name: "relationship",
        label: "Relationship to head of household",
        value_type: ValueType::Enum,
        choices: RELATIONSHIP_CHOICES,
        reader: CoreReader::Individual(individual_relationship),
    },
    CoreField {
        name: "disability",
        label: "Has a disability",
        value_type: ValueType::Boolean,
        choices: &[],
        reader: CoreReader::Individual(individual_disability),
    },
    CoreField {
        name: "observed_disability",
        label: "Observed disabilities",
        value_type: ValueType::List,
        choices: DISABILITY_CHOICES,
        reader: CoreReader::Individual(individual_observed_disability),
    },
    CoreField {
        name: "pregnant",
        label: "Pregnant",
        value_type: ValueType::Boolean,
        choices: &[],
        reader: CoreReader::Individual(individual_pregnant),
    },
    CoreField {
        name: "phone_no",
        label: "Phone number",
        value_type: ValueType::String,
        choices: &[],
        reader: CoreReader::Individual(individual_phone_no),
    },
];

pub fn core_field(name: &str) -> Option<&'static CoreField> {
    CORE_FIELDS.iter().find(|f| f.name == name)
}

/// Full years between `birth_date` and `as_of`. `None` for future birth dates.
pub fn age_on(birth_date: NaiveDate, as_of: NaiveDate) -> Option<i64> {
    if birth_date > as_of {
        return None;
    }
    let mut years = as_of.year() - birth_date.year();
    if (as_of.month(), as_of.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    Some(i64::from(years))
}

fn text(value: &Option<String>) -> Option<TypedValue> {
    value.clone().map(TypedValue::String)
}

fn options(values: &[String]) -> Option<TypedValue> {
    if values.is_empty() {
        None
    } else {
        Some(TypedValue::List(values.to_vec()))
    }
}

fn household_size(h: &Household) -> Option<TypedValue> {
    h.size.map(|s| TypedValue::Number(s as f64))
}

fn household_residence_status(h: &Household) -> Option<TypedValue> {
    text(&h.residence_status)
}

fn household_admin1(h: &Household) -> Option<TypedValue> {
    text(&h.admin1)
}

fn household_admin2(h: &Household) -> Option<TypedValue> {
    text(&h.admin2)
}

fn household_village(h: &Household) -> Option<TypedValue> {
    text(&h.village)
}

fn household_address(h: &Household) -> Option<TypedValue> {
    text(&h.address)
}

fn household_first_registration_date(h: &Household) -> Option<TypedValue> {
    h.first_registration_date.map(TypedValue::Date)
}

fn household_returnee(h: &Household) -> Option<TypedValue> {
    h.returnee.map(TypedValue::Bool)
}

fn household_consent_sharing(h: &Household) -> Option<TypedValue> {
    options(&h.consent_sharing)
}

fn individual_full_name(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    Some(TypedValue::String(i.full_name.clone()))
}

fn individual_sex(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    text(&i.sex)
}

fn individual_birth_date(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    i.birth_date.map(TypedValue::Date)
}

fn individual_age(i: &Individual, as_of: NaiveDate) -> Option<TypedValue> {
    i.birth_date
        .and_then(|b| age_on(b, as_of))
        .map(|years| TypedValue::Number(years as f64))
}

fn individual_marital_status(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    text(&i.marital_status)
}

fn individual_relationship(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    text(&i.relationship)
}

fn individual_disability(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    i.disability.map(TypedValue::Bool)
}

fn individual_observed_disability(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    options(&i.observed_disability)
}

fn individual_pregnant(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    i.pregnant.map(TypedValue::Bool)
}

fn individual_phone_no(i: &Individual, _: NaiveDate) -> Option<TypedValue> {
    text(&i.phone_no)
}
