//! Airline admission.
//!
//! Airlines progress Pending → Registered → Funded. Until the federation has
//! `consensus_threshold` registered members any funded airline admits a
//! nominee directly; from then on a nominee needs votes from half of the
//! registered airlines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use surety_types::{AccountId, Amount, LedgerError, LedgerEvent, Result};

use crate::access::{checked_add, Treasury};

/// Admission state of an airline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirlineState {
    /// Nominated, collecting votes from funded airlines
    Pending { voters: BTreeSet<AccountId> },
    /// Admitted, fee not yet paid
    Registered,
    /// Admitted and fee paid
    Funded,
}

/// A federation member or nominee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airline {
    /// Airline account
    pub id: AccountId,
    /// Admission state
    pub state: AirlineState,
    /// Registration fees paid
    pub funds_contributed: Amount,
    /// Airline whose call admitted this one
    pub sponsor: Option<AccountId>,
    /// When the airline was first nominated
    pub nominated_at: DateTime<Utc>,
    /// When the airline was admitted
    pub registered_at: Option<DateTime<Utc>>,
    /// When the fee was paid
    pub funded_at: Option<DateTime<Utc>>,
}

impl Airline {
    fn nominee(id: AccountId) -> Self {
        Self {
            id,
            state: AirlineState::Pending {
                voters: BTreeSet::new(),
            },
            funds_contributed: 0,
            sponsor: None,
            nominated_at: Utc::now(),
            registered_at: None,
            funded_at: None,
        }
    }

    /// Registered or funded.
    pub fn is_registered(&self) -> bool {
        matches!(self.state, AirlineState::Registered | AirlineState::Funded)
    }

    /// Fee paid.
    pub fn is_funded(&self) -> bool {
        self.state == AirlineState::Funded
    }

    /// Unique votes collected while pending.
    pub fn votes(&self) -> usize {
        match &self.state {
            AirlineState::Pending { voters } => voters.len(),
            _ => 0,
        }
    }
}

/// Registry of airlines and their admission votes.
#[derive(Debug, Clone)]
pub struct AirlineRegistry {
    airlines: HashMap<AccountId, Airline>,
    /// Airline ids in the order they were admitted
    admission_order: Vec<AccountId>,
    consensus_threshold: usize,
}

impl AirlineRegistry {
    /// Create an empty registry.
    pub fn new(consensus_threshold: usize) -> Self {
        Self {
            airlines: HashMap::new(),
            admission_order: Vec::new(),
            consensus_threshold,
        }
    }

    /// Rebuild a registry from its records. `admission_order` must list the
    /// registered airlines in the order they were admitted.
    pub fn restore(
        consensus_threshold: usize,
        records: Vec<Airline>,
        admission_order: Vec<AccountId>,
    ) -> Result<Self> {
        let airlines: HashMap<AccountId, Airline> =
            records.into_iter().map(|a| (a.id.clone(), a)).collect();

        let registered: BTreeSet<&AccountId> = airlines
            .values()
            .filter(|a| a.is_registered())
            .map(|a| &a.id)
            .collect();
        let ordered: BTreeSet<&AccountId> = admission_order.iter().collect();
        if registered != ordered || ordered.len() != admission_order.len() {
            return Err(LedgerError::SnapshotError(
                "admission order does not match registered airlines".to_string(),
            ));
        }

        Ok(Self {
            airlines,
            admission_order,
            consensus_threshold,
        })
    }

    /// Admit the founding airline. Only allowed while the registry is empty.
    pub fn register_first(&mut self, nominee: &AccountId) -> Result<Vec<LedgerEvent>> {
        if !self.airlines.is_empty() {
            return Err(LedgerError::PermissionDenied(
                "the first airline is already registered".to_string(),
            ));
        }

        self.airlines
            .insert(nominee.clone(), Airline::nominee(nominee.clone()));
        self.admit(nominee, None);

        info!(airline = %nominee, "First airline registered");
        Ok(vec![LedgerEvent::AirlineRegistered {
            airline: nominee.clone(),
            sponsor: None,
            votes: 0,
        }])
    }

    /// Nominate or vote for `nominee` on behalf of the funded airline `caller`.
    pub fn register(&mut self, caller: &AccountId, nominee: &AccountId) -> Result<Vec<LedgerEvent>> {
        if !self.is_funded(caller) {
            return Err(LedgerError::PermissionDenied(format!(
                "{caller} is not a funded airline"
            )));
        }
        if self.is_airline(nominee) {
            return Err(LedgerError::DuplicateEntry(format!(
                "airline {nominee} is already registered"
            )));
        }

        let registered = self.registered_count();
        if registered < self.consensus_threshold {
            self.airlines
                .entry(nominee.clone())
                .or_insert_with(|| Airline::nominee(nominee.clone()));
            self.admit(nominee, Some(caller));

            info!(airline = %nominee, sponsor = %caller, "Airline registered without vote");
            return Ok(vec![LedgerEvent::AirlineRegistered {
                airline: nominee.clone(),
                sponsor: Some(caller.clone()),
                votes: 0,
            }]);
        }

        let airline = self
            .airlines
            .entry(nominee.clone())
            .or_insert_with(|| Airline::nominee(nominee.clone()));
        let votes = match &mut airline.state {
            AirlineState::Pending { voters } => {
                if !voters.insert(caller.clone()) {
                    return Err(LedgerError::DuplicateVote {
                        voter: caller.clone(),
                        nominee: nominee.clone(),
                    });
                }
                voters.len()
            }
            other => {
                return Err(LedgerError::InvariantViolation(format!(
                    "nominee {nominee} in state {other:?}"
                )))
            }
        };

        debug!(
            nominee = %nominee,
            voter = %caller,
            votes,
            registered,
            "Admission vote recorded"
        );

        let mut events = vec![LedgerEvent::VoteRecorded {
            nominee: nominee.clone(),
            voter: caller.clone(),
            votes,
            registered,
        }];

        if 2 * votes >= registered {
            self.admit(nominee, Some(caller));
            info!(airline = %nominee, votes, registered, "Airline registered by majority");
            events.push(LedgerEvent::AirlineRegistered {
                airline: nominee.clone(),
                sponsor: Some(caller.clone()),
                votes,
            });
        }

        Ok(events)
    }

    /// Pay the registration fee for a registered airline.
    pub fn fund(
        &mut self,
        airline: &AccountId,
        amount: Amount,
        fee: Amount,
        treasury: &mut Treasury,
    ) -> Result<Vec<LedgerEvent>> {
        let record = self
            .airlines
            .get_mut(airline)
            .ok_or_else(|| LedgerError::NotFound(format!("airline {airline}")))?;

        match record.state {
            AirlineState::Funded => return Err(LedgerError::AlreadyFunded(airline.clone())),
            AirlineState::Pending { .. } => {
                return Err(LedgerError::PermissionDenied(format!(
                    "airline {airline} is not registered"
                )))
            }
            AirlineState::Registered => {}
        }
        if amount != fee {
            return Err(LedgerError::OutOfRange {
                amount,
                min: fee,
                max: fee,
            });
        }

        treasury.deposit_funding(amount)?;
        record.funds_contributed = checked_add(record.funds_contributed, amount)?;
        record.state = AirlineState::Funded;
        record.funded_at = Some(Utc::now());

        info!(airline = %airline, amount, "Airline funded");
        Ok(vec![LedgerEvent::AirlineFunded {
            airline: airline.clone(),
            amount,
        }])
    }

    fn admit(&mut self, nominee: &AccountId, sponsor: Option<&AccountId>) {
        if let Some(airline) = self.airlines.get_mut(nominee) {
            airline.state = AirlineState::Registered;
            airline.sponsor = sponsor.cloned();
            airline.registered_at = Some(Utc::now());
            self.admission_order.push(nominee.clone());
        }
    }

    /// Get an airline record.
    pub fn get(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    /// Whether `id` is registered (funded or not).
    pub fn is_airline(&self, id: &AccountId) -> bool {
        self.airlines.get(id).is_some_and(Airline::is_registered)
    }

    /// Whether `id` is funded.
    pub fn is_funded(&self, id: &AccountId) -> bool {
        self.airlines.get(id).is_some_and(Airline::is_funded)
    }

    /// Number of registered airlines.
    pub fn registered_count(&self) -> usize {
        self.admission_order.len()
    }

    /// Votes collected by a pending nominee.
    pub fn pending_votes(&self, nominee: &AccountId) -> Option<usize> {
        self.airlines
            .get(nominee)
            .filter(|a| matches!(a.state, AirlineState::Pending { .. }))
            .map(Airline::votes)
    }

    /// Funded airlines in admission order.
    pub fn list_active(&self) -> Vec<&Airline> {
        self.admission_order
            .iter()
            .filter_map(|id| self.airlines.get(id))
            .filter(|a| a.is_funded())
            .collect()
    }

    /// Airline ids in admission order.
    pub fn admission_order(&self) -> &[AccountId] {
        &self.admission_order
    }

    /// Every airline record, including pending nominees.
    pub fn records(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values()
    }
}
