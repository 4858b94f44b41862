//! Application services: content reads, enquiries, revalidation, migrations and seeding.

pub mod content;
pub mod enquiries;
pub mod error;
pub mod migrations;
pub mod pages;
pub mod repos;
pub mod revalidation;
pub mod seed;

#[cfg(test)]
pub(crate) mod testing;
