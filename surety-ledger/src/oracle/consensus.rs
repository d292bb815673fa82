//! Oracle consensus: registration, status requests and vote tallying.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

use surety_types::{
    AccountId, Amount, FlightKey, LedgerError, LedgerEvent, RequestKey, Result, StatusCode,
};

use super::indexes::{flight_index, oracle_indexes, request_fingerprint};
use crate::access::Treasury;
use crate::config::OracleConfig;
use crate::registry::Flight;

/// A registered status oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    /// Oracle account
    pub id: AccountId,
    /// Stake deposited at registration
    pub stake: Amount,
    /// Indexes this oracle may respond to
    pub indexes: Vec<u8>,
    /// When the oracle registered
    pub registered_at: DateTime<Utc>,
}

impl Oracle {
    /// Whether the oracle may respond to requests for `index`.
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// State of a status request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Collecting votes, one per oracle
    Open { votes: BTreeMap<AccountId, StatusCode> },
    /// A quorum agreed; terminal
    Resolved {
        status: StatusCode,
        resolved_at: DateTime<Utc>,
    },
}

/// A status request for one flight, answered by oracles holding its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Request key
    pub key: RequestKey,
    /// Account that asked for the status
    pub requester: AccountId,
    /// When the request was opened
    pub opened_at: DateTime<Utc>,
    /// Current state
    pub state: RequestState,
}

impl PendingRequest {
    /// Whether the request still accepts votes.
    pub fn is_open(&self) -> bool {
        matches!(self.state, RequestState::Open { .. })
    }

    /// Final status, once resolved.
    pub fn resolution(&self) -> Option<StatusCode> {
        match self.state {
            RequestState::Resolved { status, .. } => Some(status),
            RequestState::Open { .. } => None,
        }
    }

    /// Oracles per reported status.
    pub fn tally(&self) -> BTreeMap<StatusCode, BTreeSet<AccountId>> {
        let mut tally: BTreeMap<StatusCode, BTreeSet<AccountId>> = BTreeMap::new();
        if let RequestState::Open { votes } = &self.state {
            for (oracle, status) in votes {
                tally.entry(*status).or_default().insert(oracle.clone());
            }
        }
        tally
    }
}

/// Outcome of an oracle response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Vote recorded; `votes` oracles currently back the reported status
    Recorded { votes: usize },
    /// The vote completed a quorum
    Finalized { status: StatusCode },
    /// The request was already resolved
    Ignored,
}

/// Registers oracles and tallies their responses.
#[derive(Debug, Clone, Default)]
pub struct OracleConsensus {
    oracles: HashMap<AccountId, Oracle>,
    requests: HashMap<RequestKey, PendingRequest>,
}

impl OracleConsensus {
    /// Create an empty consensus table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from records.
    pub fn restore(oracles: Vec<Oracle>, requests: Vec<PendingRequest>) -> Result<Self> {
        let mut consensus = Self::new();
        for oracle in oracles {
            if consensus.oracles.insert(oracle.id.clone(), oracle).is_some() {
                return Err(LedgerError::SnapshotError("duplicate oracle".to_string()));
            }
        }
        for request in requests {
            if consensus.requests.insert(request.key.clone(), request).is_some() {
                return Err(LedgerError::SnapshotError("duplicate request".to_string()));
            }
        }
        Ok(consensus)
    }

    /// Register an oracle with its stake.
    pub fn register(
        &mut self,
        oracle: &AccountId,
        stake: Amount,
        config: &OracleConfig,
        treasury: &mut Treasury,
    ) -> Result<Vec<LedgerEvent>> {
        config.validate()?;
        if self.oracles.contains_key(oracle) {
            return Err(LedgerError::DuplicateEntry(format!("oracle {oracle}")));
        }
        if stake != config.registration_fee {
            return Err(LedgerError::OutOfRange {
                amount: stake,
                min: config.registration_fee,
                max: config.registration_fee,
            });
        }

        let indexes = oracle_indexes(oracle, config.indexes_per_oracle, config.index_range)?;
        treasury.escrow_stake(stake)?;
        self.oracles.insert(
            oracle.clone(),
            Oracle {
                id: oracle.clone(),
                stake,
                indexes: indexes.clone(),
                registered_at: Utc::now(),
            },
        );

        info!(oracle = %oracle, indexes = ?indexes, "Oracle registered");
        Ok(vec![LedgerEvent::OracleRegistered {
            oracle: oracle.clone(),
            indexes,
        }])
    }

    /// Indexes assigned to an oracle.
    pub fn indexes(&self, oracle: &AccountId) -> Result<&[u8]> {
        self.oracles
            .get(oracle)
            .map(|o| o.indexes.as_slice())
            .ok_or_else(|| LedgerError::NotFound(format!("oracle {oracle}")))
    }

    /// Open (or re-announce) the status request for a flight.
    pub fn open_request(
        &mut self,
        requester: &AccountId,
        flight: &Flight,
        config: &OracleConfig,
    ) -> Result<Vec<LedgerEvent>> {
        if flight.is_finalized() {
            return Err(LedgerError::AlreadyResolved(format!(
                "flight {} is {}",
                flight.key, flight.status
            )));
        }

        config.validate()?;
        let index = flight_index(&flight.key, config.index_range)?;
        let key = RequestKey::new(index, flight.key.clone());

        match self.requests.get(&key) {
            Some(request) if !request.is_open() => {
                return Err(LedgerError::AlreadyResolved(format!("request {key}")));
            }
            Some(_) => {
                debug!(request = %request_fingerprint(&key), index, "Status request re-announced");
            }
            None => {
                self.requests.insert(
                    key.clone(),
                    PendingRequest {
                        key: key.clone(),
                        requester: requester.clone(),
                        opened_at: Utc::now(),
                        state: RequestState::Open {
                            votes: BTreeMap::new(),
                        },
                    },
                );
                info!(
                    request = %request_fingerprint(&key),
                    flight = %flight.key,
                    index,
                    "Status request opened"
                );
            }
        }

        Ok(vec![LedgerEvent::StatusRequested {
            index,
            flight: flight.key.clone(),
            requester: requester.clone(),
        }])
    }

    /// Record an oracle's response.
    pub fn submit(
        &mut self,
        oracle: &AccountId,
        index: u8,
        flight: &FlightKey,
        status: StatusCode,
        quorum: usize,
    ) -> Result<(Submission, Vec<LedgerEvent>)> {
        let record = self
            .oracles
            .get(oracle)
            .ok_or_else(|| LedgerError::PermissionDenied(format!("{oracle} is not a registered oracle")))?;
        if !record.holds(index) {
            return Err(LedgerError::PermissionDenied(format!(
                "oracle {oracle} does not hold index {index}"
            )));
        }

        let key = RequestKey::new(index, flight.clone());
        let request = self
            .requests
            .get_mut(&key)
            .ok_or_else(|| LedgerError::NotFound(format!("request {key}")))?;

        let votes = match &mut request.state {
            RequestState::Resolved { .. } => {
                debug!(oracle = %oracle, request = %request_fingerprint(&key), "Late response ignored");
                return Ok((Submission::Ignored, Vec::new()));
            }
            RequestState::Open { votes } => {
                votes.insert(oracle.clone(), status);
                votes.values().filter(|s| **s == status).count()
            }
        };

        debug!(
            oracle = %oracle,
            request = %request_fingerprint(&key),
            status = %status,
            votes,
            "Oracle response recorded"
        );

        let mut events = vec![LedgerEvent::OracleReported {
            oracle: oracle.clone(),
            index,
            flight: flight.clone(),
            status,
        }];

        if votes < quorum {
            return Ok((Submission::Recorded { votes }, events));
        }

        request.state = RequestState::Resolved {
            status,
            resolved_at: Utc::now(),
        };
        info!(
            request = %request_fingerprint(&key),
            flight = %flight,
            status = %status,
            votes,
            "Flight status finalized"
        );
        events.push(LedgerEvent::StatusFinalized {
            index,
            flight: flight.clone(),
            status,
        });
        Ok((Submission::Finalized { status }, events))
    }

    /// Get a request.
    pub fn request(&self, key: &RequestKey) -> Option<&PendingRequest> {
        self.requests.get(key)
    }

    /// Requests still collecting votes.
    pub fn open_requests(&self) -> Vec<&PendingRequest> {
        self.requests.values().filter(|r| r.is_open()).collect()
    }

    /// Get an oracle.
    pub fn oracle(&self, id: &AccountId) -> Option<&Oracle> {
        self.oracles.get(id)
    }

    /// Every oracle.
    pub fn oracles(&self) -> impl Iterator<Item = &Oracle> {
        self.oracles.values()
    }

    /// Every request.
    pub fn requests(&self) -> impl Iterator<Item = &PendingRequest> {
        self.requests.values()
    }
}
