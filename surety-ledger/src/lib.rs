//! Flight Surety - Flight-Delay Insurance Ledger
//!
//! Airlines join by consensus and fund the pool, register flights, and
//! passengers insure them. A quorum of staked oracles reports each flight's
//! status; a confirmed delay credits every policy on the flight.
//!
//! - **Airline registry**: founder, fast-path admission, then majority vote
//! - **Flight registry**: flights keyed by (airline, code, timestamp)
//! - **Insurance ledger**: capped premiums, 1.5x payouts, withdrawals
//! - **Oracle consensus**: index-gated responses, first status to quorum wins
//! - **Access control**: owner-only circuit breaker and the treasury
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                       FlightSurety                        │
//! │     transact: stage ─▶ apply ─▶ check ─▶ commit ─▶ log     │
//! │                            │                              │
//! │  ┌──────────┐ ┌─────────┐ ┌───────────┐ ┌──────────────┐  │
//! │  │ Airlines │ │ Flights │ │ Insurance │ │   Oracles    │  │
//! │  └──────────┘ └─────────┘ └───────────┘ └──────────────┘  │
//! │        └───────── AccessControl + Treasury ───────┘       │
//! │                            │                              │
//! │                    ┌───────▼───────┐                      │
//! │                    │ EventJournal  │                      │
//! │                    └───────────────┘                      │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod access;
pub mod config;
pub mod insurance;
pub mod journal;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod state;

// Re-export main types
pub use access::{AccessControl, Treasury};
pub use config::LedgerConfig;
pub use insurance::{InsuranceLedger, Policy};
pub use journal::{EventJournal, JournalEntry};
pub use ledger::FlightSurety;
pub use oracle::{Oracle, OracleConsensus, PendingRequest, RequestState, Submission};
pub use registry::{Airline, AirlineRegistry, AirlineState, Flight, FlightRegistry};
pub use state::{LedgerSnapshot, LedgerState};
pub use surety_types::*;
