//! Domain models for the targeting service.
//!
//! # Core Concepts
//!
//! ## Schema
//!
//! - [`Program`]: A beneficiary program. Its [`ProgramMode`] decides whether
//!   targeting selects households or individual people.
//! - [`FieldDescriptor`]: A typed description of one attribute a rule can
//!   filter on. Core fields are static; [`FlexAttribute`] and
//!   [`PeriodicField`] definitions are registered per program.
//!
//! ## Population
//!
//! - [`Household`] and [`Individual`]: the two entity kinds a rule filters on.
//!   A [`HouseholdRecord`] bundles a household with its current members.
//!
//! ## Rules
//!
//! - [`TargetingCriteria`]: OR of [`Rule`]s.
//! - [`Rule`]: AND of household [`FilterCondition`]s and [`IndividualFilterBlock`]s.
//! - [`ExclusionSpec`]: IDs removed from the result regardless of the rules.

mod criteria;
mod field;
mod household;
mod preview;
mod program;

pub use criteria::*;
pub use field::*;
pub use household::*;
pub use preview::*;
pub use program::*;
