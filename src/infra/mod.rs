//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod pocketbase;
pub mod revalidate_client;
pub mod telemetry;
