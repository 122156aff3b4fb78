//! Storage implementations for the capsule subsystem.
//!
//! - **Capsule Repository** (PostgreSQL) - capsules, members, content cleanup

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-exports
#[cfg(feature = "postgres")]
pub use postgres::PostgresCapsuleRepository;
