//! `PostgreSQL` storage.

mod capsule;

pub use capsule::PostgresCapsuleRepository;
