//! # Attribution Database Crate
//!
//! This crate is the only place that knows where the decision/trade ledger lives.
//! Everything above it talks to the ledger through the [`LedgerQueryPort`] trait.
//!
//! ## Architectural Principles
//!
//! - **Adapter Layer:** All storage-specific logic sits here. The rest of the
//!   application sees a clean, abstract API and never touches SQL.
//! - **Aggregation Stays Pure:** Adapters only fetch and join rows. The figures themselves
//!   are computed by the `analytics` crate, so both backends produce identical results.
//! - **Asynchronous & Pooled:** All operations are asynchronous, and the PostgreSQL
//!   backend uses a connection pool (`PgPool`) for concurrent access.
//!
//! ## Public API
//!
//! - `connect`: The async function to establish the database connection pool.
//! - `run_migrations`: Applies the embedded schema migrations.
//! - `LedgerQueryPort`: The query contract consumed by the attribution engine.
//! - `DbRepository`: The PostgreSQL implementation of that contract.
//! - `InMemoryLedger` / `LedgerSnapshot`: An in-memory implementation, loadable from JSON.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use ledger::LedgerQueryPort;
pub use memory::{InMemoryLedger, LedgerSnapshot};
pub use repository::DbRepository;
