//! Flight Surety ledger service.
//!
//! [`FlightSurety`] is the handle collaborators share. Every mutation runs as
//! a transaction: the state is staged, the operation applied, invariants
//! checked, and only then committed. Events are journaled while the write
//! lock is held, so journal order is commit order.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use surety_types::{
    AccountId, Amount, FlightKey, LedgerError, LedgerEvent, RequestKey, Result, StatusCode,
};

use crate::access::Treasury;
use crate::config::LedgerConfig;
use crate::insurance::Policy;
use crate::journal::{EventJournal, JournalEntry};
use crate::oracle::PendingRequest;
use crate::registry::{Airline, Flight};
use crate::state::{LedgerSnapshot, LedgerState};

/// Shared, concurrency-safe handle to a ledger.
#[derive(Clone)]
pub struct FlightSurety {
    state: Arc<RwLock<LedgerState>>,
    journal: Arc<EventJournal>,
}

impl FlightSurety {
    /// Create a ledger owned by `owner` with default settings.
    pub fn new(owner: impl Into<AccountId>) -> Result<Self> {
        Self::with_config(LedgerConfig::new(owner))
    }

    /// Create a ledger from a configuration.
    pub fn with_config(config: LedgerConfig) -> Result<Self> {
        let state = LedgerState::new(config)?;
        info!(owner = %state.access().owner(), "Flight Surety ledger created");
        Ok(Self::from_state(state))
    }

    /// Rebuild a ledger from a snapshot. The journal starts empty.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        let state = LedgerState::restore(snapshot)?;
        info!(
            airlines = state.airlines().registered_count(),
            flights = state.flights().len(),
            "Flight Surety ledger restored"
        );
        Ok(Self::from_state(state))
    }

    fn from_state(state: LedgerState) -> Self {
        let journal = EventJournal::with_max_entries(state.config().journal.max_events);
        Self {
            state: Arc::new(RwLock::new(state)),
            journal: Arc::new(journal),
        }
    }

    /// Apply `op` to a staged copy and commit it if invariants hold.
    async fn transact<F>(&self, operation: &'static str, op: F) -> Result<Vec<LedgerEvent>>
    where
        F: FnOnce(&mut LedgerState) -> Result<Vec<LedgerEvent>>,
    {
        let mut state = self.state.write().await;
        let mut staged = state.clone();

        let outcome = op(&mut staged).and_then(|events| {
            staged.check_invariants()?;
            Ok(events)
        });

        match outcome {
            Ok(events) => {
                *state = staged;
                let seq = self.journal.append(&events).await;
                let names: Vec<&str> = events.iter().map(LedgerEvent::name).collect();
                debug!(operation, events = ?names, seq, "Transaction committed");
                Ok(events)
            }
            Err(e) => {
                match &e {
                    LedgerError::InvariantViolation(_) => {
                        error!(operation, error = %e, "Transaction aborted");
                    }
                    e if e.is_noop() => debug!(operation, error = %e, "Transaction skipped"),
                    e => warn!(operation, error = %e, "Transaction rejected"),
                }
                Err(e)
            }
        }
    }

    /// Toggle the circuit breaker. Owner only.
    pub async fn set_operational(&self, caller: &AccountId, operational: bool) -> Result<Vec<LedgerEvent>> {
        self.transact("set_operational", |s| s.set_operational(caller, operational))
            .await
    }

    pub async fn is_operational(&self) -> bool {
        self.state.read().await.access().is_operational()
    }

    pub async fn owner(&self) -> AccountId {
        self.state.read().await.access().owner().clone()
    }

    /// Admit the founding airline. Owner only.
    pub async fn register_first_airline(
        &self,
        caller: &AccountId,
        nominee: &AccountId,
    ) -> Result<Vec<LedgerEvent>> {
        self.transact("register_first_airline", |s| {
            s.register_first_airline(caller, nominee)
        })
        .await
    }

    /// Register or vote for `nominee` on behalf of a funded airline.
    pub async fn register_airline(&self, caller: &AccountId, nominee: &AccountId) -> Result<Vec<LedgerEvent>> {
        self.transact("register_airline", |s| s.register_airline(caller, nominee))
            .await
    }

    /// Pay the registration fee for a registered airline.
    pub async fn fund_airline(&self, airline: &AccountId, amount: Amount) -> Result<Vec<LedgerEvent>> {
        self.transact("fund_airline", |s| s.fund_airline(airline, amount))
            .await
    }

    pub async fn airline(&self, id: &AccountId) -> Option<Airline> {
        self.state.read().await.airlines().get(id).cloned()
    }

    pub async fn is_airline(&self, id: &AccountId) -> bool {
        self.state.read().await.airlines().is_airline(id)
    }

    pub async fn is_funded(&self, id: &AccountId) -> bool {
        self.state.read().await.airlines().is_funded(id)
    }

    pub async fn registered_count(&self) -> usize {
        self.state.read().await.airlines().registered_count()
    }

    /// Votes collected by a pending nominee.
    pub async fn pending_votes(&self, nominee: &AccountId) -> Option<usize> {
        self.state.read().await.airlines().pending_votes(nominee)
    }

    /// Funded airlines in admission order.
    pub async fn list_active(&self) -> Vec<Airline> {
        self.state
            .read()
            .await
            .airlines()
            .list_active()
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn register_flight(
        &self,
        airline: &AccountId,
        code: &str,
        timestamp: i64,
    ) -> Result<Vec<LedgerEvent>> {
        self.transact("register_flight", |s| s.register_flight(airline, code, timestamp))
            .await
    }

    pub async fn flight(&self, key: &FlightKey) -> Option<Flight> {
        self.state.read().await.flights().get(key).cloned()
    }

    pub async fn flight_status(&self, key: &FlightKey) -> Result<StatusCode> {
        self.state.read().await.flights().status(key)
    }

    pub async fn flights_for_airline(&self, airline: &AccountId) -> Vec<Flight> {
        self.state
            .read()
            .await
            .flights()
            .list_for_airline(airline)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn buy_insurance(
        &self,
        passenger: &AccountId,
        flight: &FlightKey,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>> {
        self.transact("buy_insurance", |s| s.buy_insurance(passenger, flight, amount))
            .await
    }

    /// Withdraw from a passenger's credited balance.
    pub async fn withdraw(&self, passenger: &AccountId, amount: Amount) -> Result<Vec<LedgerEvent>> {
        self.transact("withdraw", |s| s.withdraw(passenger, amount))
            .await
    }

    pub async fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<Policy> {
        self.state
            .read()
            .await
            .insurance()
            .policy(passenger, flight)
            .cloned()
    }

    pub async fn is_insured(&self, passenger: &AccountId, flight: &FlightKey) -> bool {
        self.state.read().await.insurance().is_insured(passenger, flight)
    }

    /// Policies on a flight, ordered by passenger.
    pub async fn policies_for_flight(&self, flight: &FlightKey) -> Vec<Policy> {
        self.state
            .read()
            .await
            .insurance()
            .policies_for_flight(flight)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn balance_of(&self, passenger: &AccountId) -> Amount {
        self.state.read().await.insurance().balance_of(passenger)
    }

    pub async fn treasury(&self) -> Treasury {
        self.state.read().await.treasury().clone()
    }

    pub async fn register_oracle(&self, oracle: &AccountId, stake: Amount) -> Result<Vec<LedgerEvent>> {
        self.transact("register_oracle", |s| s.register_oracle(oracle, stake))
            .await
    }

    pub async fn oracle_indexes(&self, oracle: &AccountId) -> Result<Vec<u8>> {
        self.state
            .read()
            .await
            .oracles()
            .indexes(oracle)
            .map(<[u8]>::to_vec)
    }

    /// Ask the oracles holding the flight's index for its status.
    pub async fn fetch_flight_status(&self, requester: &AccountId, flight: &FlightKey) -> Result<Vec<LedgerEvent>> {
        self.transact("fetch_flight_status", |s| {
            s.fetch_flight_status(requester, flight)
        })
        .await
    }

    pub async fn submit_oracle_response(
        &self,
        oracle: &AccountId,
        index: u8,
        flight: &FlightKey,
        status: StatusCode,
    ) -> Result<Vec<LedgerEvent>> {
        self.transact("submit_oracle_response", |s| {
            s.submit_oracle_response(oracle, index, flight, status)
        })
        .await
    }

    pub async fn request(&self, key: &RequestKey) -> Option<PendingRequest> {
        self.state.read().await.oracles().request(key).cloned()
    }

    /// Requests still collecting votes.
    pub async fn open_requests(&self) -> Vec<PendingRequest> {
        self.state
            .read()
            .await
            .oracles()
            .open_requests()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Journaled events newer than `seq`, oldest first.
    pub async fn events_since(&self, seq: u64) -> Vec<JournalEntry> {
        self.journal.since(seq).await
    }

    /// The most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Vec<JournalEntry> {
        self.journal.recent(limit).await
    }

    pub async fn last_seq(&self) -> u64 {
        self.journal.last_seq().await
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().await.snapshot()
    }

    pub async fn export_json(&self) -> Result<String> {
        self.snapshot().await.to_json()
    }

    /// Replace the ledger contents with a snapshot and start a fresh journal.
    ///
    /// `caller` must own both the current ledger and the snapshot.
    pub async fn restore(&self, caller: &AccountId, snapshot: LedgerSnapshot) -> Result<()> {
        let mut state = self.state.write().await;
        let outcome = state
            .access()
            .require_operational()
            .and_then(|_| state.access().require_owner(caller))
            .and_then(|_| LedgerState::restore(snapshot))
            .and_then(|restored| {
                restored.access().require_owner(caller)?;
                Ok(restored)
            });

        match outcome {
            Ok(restored) => {
                *state = restored;
                self.journal.reset().await;
                info!(caller = %caller, "Ledger state replaced from snapshot");
                Ok(())
            }
            Err(e) => {
                warn!(operation = "restore", error = %e, "Transaction rejected");
                Err(e)
            }
        }
    }
}
