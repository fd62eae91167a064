//! Vietnamese administrative units across the 3-tier (v1) and 2-tier (v2)
//! hierarchies: repository-backed lookups with a JSON-file fallback, an
//! audited unit lifecycle and a cross-version code bridge.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
