//! Domain layer: content domains, backend records and enquiry rules.

pub mod content;
pub mod enquiry;
pub mod error;
pub mod records;
