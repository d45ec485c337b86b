//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

pub mod codec;
mod context;
mod enrollment;
mod store;

pub use codec::TemplateCodec;
pub use context::ContextManager;
pub use enrollment::{EnrollmentService, VerifyOutcome};
pub use store::TemplateStore;
