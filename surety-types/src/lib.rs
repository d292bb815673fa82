//! Shared vocabulary for the Flight Surety ledger.
//!
//! These types are used by the ledger core and by every collaborator that
//! talks to it (the passenger/airline frontend, the off-chain status bot):
//!
//! - **Identities**: [`AccountId`] for owners, airlines, passengers and oracles
//! - **Keys**: [`FlightKey`] (airline, code, timestamp) and [`RequestKey`]
//! - **Status codes**: the fixed [`StatusCode`] enumeration reported by oracles
//! - **Events**: [`LedgerEvent`], the notifications emitted by committed operations
//! - **Errors**: the [`LedgerError`] taxonomy shared by every operation
//!
//! With the `typescript` feature enabled the types derive `ts_rs::TS` so the
//! frontend can import them directly.

pub mod error;
pub mod events;
pub mod types;

pub use error::{LedgerError, Result};
pub use events::LedgerEvent;
pub use types::*;
