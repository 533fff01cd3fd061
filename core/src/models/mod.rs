//! Durable entity types shared by the orchestrator, the store adapters,
//! and the HTTP layer.

mod build;
mod chat_message;
mod credit_transaction;
mod principal;
mod project;
mod spec;
mod version;

pub use build::{Build, BuildStatus};
pub use chat_message::{ChatMessage, ChatRole};
pub use credit_transaction::{CreditTransaction, TransactionKind};
pub use principal::{Principal, Role};
pub use project::{Project, ProjectStatus};
pub use spec::ProjectSpec;
pub use version::{CodeDiff, Version};
