//! Mock provider implementations for testing.
//!
//! In-memory implementations of every provider trait, plus a pinned clock
//! and a scripted code generator. Each mock is cheaply cloneable; clones
//! share state so a test can keep a handle while the service owns another.

pub mod blob;
pub mod clock;
pub mod code;
pub mod mail;
pub mod repository;

pub use blob::MockBlobStore;
pub use clock::{FixedClock, test_clock};
pub use code::SequenceCodeGenerator;
pub use mail::{MockMailTransport, SentMail};
pub use repository::InMemoryCapsuleRepository;
