//! Request handler module
//!
//! Routes requests to the script endpoint and health probes.

pub mod router;
pub mod scripts;

// Re-export main entry point
pub use router::handle_request;
