//! The Onyx chain state machine.
//!
//! Layering, leaves first: the object database with its undo sessions, the
//! entity catalog and secondary indexes, per-operation evaluators, the
//! market engine, block application with maintenance and witness
//! scheduling, and the fork database feeding reorganizations.

pub mod database;
mod error;
pub(crate) mod evaluators;
pub mod fork_database;
pub mod genesis;
pub mod objects;

pub use database::{block::skip, BlockObserver, Database, UndoSession};
pub use error::{Error, Result};
pub use fork_database::ForkDatabase;
pub use genesis::initialize_from_genesis;
