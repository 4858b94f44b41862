//! Data access, cache tagging and on-demand revalidation for the FinWage marketing site.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
