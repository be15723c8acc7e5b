//! Audit, clean up and query an OpenStreetMap XML extract.
//!
//! The [`etl`] module holds the three pipeline steps: `audit` reports data
//! quality problems without changing anything, `transform` writes one cleaned
//! JSON document per node, way and relation, and `query` runs the canned
//! aggregations over those documents.

pub mod cli;
pub mod config;
pub mod data;
pub mod errors;
pub mod etl;
pub mod query;
pub mod transform;
pub mod validate;
