//! Notifications emitted by committed ledger operations.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Amount, FlightKey, StatusCode};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// An event produced by a committed operation.
///
/// Operations return their events in emission order; the off-chain status
/// bot watches for [`LedgerEvent::StatusRequested`], the frontend renders
/// the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// The circuit breaker was toggled
    OperationalStatusChanged { operational: bool },
    /// An airline was admitted to the federation
    AirlineRegistered {
        airline: AccountId,
        /// Airline whose call admitted it (`None` for the first airline)
        sponsor: Option<AccountId>,
        /// Unique votes held at admission (0 on the fast path)
        votes: usize,
    },
    /// A funded airline voted for a pending nominee
    VoteRecorded {
        nominee: AccountId,
        voter: AccountId,
        votes: usize,
        registered: usize,
    },
    /// An airline paid its registration fee
    AirlineFunded { airline: AccountId, amount: Amount },
    /// A funded airline registered a flight
    FlightRegistered { flight: FlightKey },
    /// A passenger bought a policy
    InsurancePurchased {
        passenger: AccountId,
        flight: FlightKey,
        premium: Amount,
    },
    /// A passenger withdrew credited funds
    FundsWithdrawn { passenger: AccountId, amount: Amount },
    /// An oracle joined with its stake
    OracleRegistered { oracle: AccountId, indexes: Vec<u8> },
    /// Oracles holding `index` are asked to report on a flight
    StatusRequested {
        index: u8,
        flight: FlightKey,
        requester: AccountId,
    },
    /// An oracle vote was recorded
    OracleReported {
        oracle: AccountId,
        index: u8,
        flight: FlightKey,
        status: StatusCode,
    },
    /// A quorum agreed on the flight's status
    StatusFinalized {
        index: u8,
        flight: FlightKey,
        status: StatusCode,
    },
    /// A policy was credited after a confirmed delay
    PolicyCredited {
        passenger: AccountId,
        flight: FlightKey,
        payout: Amount,
    },
}

impl LedgerEvent {
    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OperationalStatusChanged { .. } => "operational_status_changed",
            Self::AirlineRegistered { .. } => "airline_registered",
            Self::VoteRecorded { .. } => "vote_recorded",
            Self::AirlineFunded { .. } => "airline_funded",
            Self::FlightRegistered { .. } => "flight_registered",
            Self::InsurancePurchased { .. } => "insurance_purchased",
            Self::FundsWithdrawn { .. } => "funds_withdrawn",
            Self::OracleRegistered { .. } => "oracle_registered",
            Self::StatusRequested { .. } => "status_requested",
            Self::OracleReported { .. } => "oracle_reported",
            Self::StatusFinalized { .. } => "status_finalized",
            Self::PolicyCredited { .. } => "policy_credited",
        }
    }
}
