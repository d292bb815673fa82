//! Oracle consensus.
//!
//! Oracles register with a stake and receive a small fixed set of indexes.
//! A status request targets one index, derived from the flight key, and only
//! oracles holding it may vote. The first status backed by a quorum of
//! distinct oracles becomes the flight's final status.

mod consensus;
mod indexes;

pub use consensus::{Oracle, OracleConsensus, PendingRequest, RequestState, Submission};
pub use indexes::{flight_index, oracle_indexes, request_fingerprint};
