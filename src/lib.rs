//! StudyBridge - clinical study data extraction over SQL schemas
//!
//! This crate exposes clinical study data (patients, visits, questionnaires)
//! stored across database schemas through a REST API:
//! - Study/table/column discovery from a YAML catalog
//! - Layered logical-name to live-column resolution (exact, alias, partial, fuzzy)
//! - Typed SQL generation with filter predicates
//! - Partial-failure extraction with JSON and CSV output

pub mod catalog;
pub mod config;
pub mod extraction;
pub mod resolver;
pub mod server;
pub mod sql_builder;
