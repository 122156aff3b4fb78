//! # Time Capsule
//!
//! Lifecycle and membership core for a shared "digital time capsule" service.
//!
//! Users create a capsule, invite co-owners with a short join code, fill it
//! with content, then seal it until a future date. Once that date has passed
//! the owner opens it and everyone can see what's inside again.
//!
//! ## Features
//!
//! - **Join codes**: 10-character alphanumeric codes, unique under collision
//! - **Bounded membership**: a fixed number of member slots, assigned in join order
//! - **Linear lifecycle**: `preseal → sealed → opened`, never backwards
//! - **Cascading deletion**: content rows removed, blob references handed back
//! - **Reminders**: batched "your capsule is ready" mail, at-least-once
//!
//! ## Architecture
//!
//! ```text
//! Handler (external) → CapsuleService → CapsuleRepository (Postgres / in-memory)
//!                                    ↘ Lifecycle::apply (pure transitions)
//! Scheduler (external) → ReminderDispatcher → CapsuleRepository + MailTransport
//! ```
//!
//! Every external dependency is a trait in [`providers`] or [`environment`],
//! so the whole subsystem runs at memory speed in tests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use time_capsule::*;
//!
//! let service = CapsuleService::new(repository, RandomCodeGenerator, SystemClock, CapsuleConfig::default());
//!
//! let created = service.create_capsule(owner, "box", true).await?;
//! service.join_capsule(friend, &created.code).await?;
//! service.seal_capsule(owner, created.id, "2030-01-01").await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod code;
pub mod config;
pub mod constants;
pub mod content;
pub mod deletion;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod membership;
pub mod providers;
pub mod reminder;
pub mod service;
pub mod state;
pub mod stores;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use code::{CodeGenerator, RandomCodeGenerator};
pub use config::{CapsuleConfig, ReminderConfig};
pub use deletion::DeletionOutcome;
pub use environment::{Clock, SystemClock};
pub use error::{CapsuleError, Result};
pub use lifecycle::{Lifecycle, LifecycleEvent, ReadMode};
pub use reminder::{ReminderDispatcher, ReminderReport};
pub use service::{CapsuleService, CreatedCapsule};
pub use state::{Capsule, CapsuleId, Member, SealedState, UserId, Vessel};
