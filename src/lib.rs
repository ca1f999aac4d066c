//! Deterministic translation pipeline from provisioning scripts and XML
//! workflow graphs to normalized configuration-management intent.
//!
//! The pipeline is a chain of pure stages: parse, order (graphs), classify,
//! map against a declarative rule table, resolve against an environment
//! profile, and merge per-source intents into one reconciled result. The
//! CLI in `main.rs` is a thin shell over these modules.

pub mod classify;
pub mod mapping;
pub mod merge;
pub mod order;
pub mod output;
pub mod profile;
pub mod report;
pub mod rules;
pub mod schema;
pub mod script;
pub mod templates;
pub mod translate;
pub mod workflow;
