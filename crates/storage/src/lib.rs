//! Storage layer for the relay moderation tools
//!
//! This crate provides the SQLite database with its migrations, the
//! append-only decision log, human review markers, and snapshot persistence
//! for process state.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod decisions;
pub mod persistence;
pub mod reviews;

pub use database::{
    moderation_migrations, DatabaseConfig, DatabaseError, MigrationDefinition, SqliteDatabase,
    SynchronousMode,
};
pub use decisions::{DecisionRecord, DecisionStore};
pub use persistence::{PersistedState, PersistenceConfig, PersistenceError};
pub use reviews::ReviewStore;
