//! The coordinating ledger state.
//!
//! [`LedgerState`] owns every component and is the only place where
//! operations touching more than one of them are composed. It is cloned into
//! a staging copy for each transaction by [`crate::FlightSurety`], so an
//! operation that fails halfway never leaves a trace in committed state.

use serde::{Deserialize, Serialize};
use tracing::error;

use surety_types::{
    AccountId, Amount, FlightKey, LedgerError, LedgerEvent, Result, StatusCode,
};

use crate::access::{AccessControl, Treasury};
use crate::config::LedgerConfig;
use crate::insurance::{InsuranceLedger, Policy};
use crate::oracle::{Oracle, OracleConsensus, PendingRequest, Submission};
use crate::registry::{Airline, AirlineRegistry, AirlineState, Flight, FlightRegistry};

/// All ledger tables.
#[derive(Debug, Clone)]
pub struct LedgerState {
    config: LedgerConfig,
    access: AccessControl,
    treasury: Treasury,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    insurance: InsuranceLedger,
    oracles: OracleConsensus,
}

impl LedgerState {
    /// Create an empty, operational ledger.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            access: AccessControl::new(config.owner.clone()),
            treasury: Treasury::new(),
            airlines: AirlineRegistry::new(config.airlines.consensus_threshold),
            flights: FlightRegistry::new(),
            insurance: InsuranceLedger::new(),
            oracles: OracleConsensus::new(),
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn airlines(&self) -> &AirlineRegistry {
        &self.airlines
    }

    pub fn flights(&self) -> &FlightRegistry {
        &self.flights
    }

    pub fn insurance(&self) -> &InsuranceLedger {
        &self.insurance
    }

    pub fn oracles(&self) -> &OracleConsensus {
        &self.oracles
    }

    /// Toggle the circuit breaker. Allowed while suspended.
    pub fn set_operational(&mut self, caller: &AccountId, operational: bool) -> Result<Vec<LedgerEvent>> {
        self.access.set_operational(caller, operational)
    }

    pub fn register_first_airline(&mut self, caller: &AccountId, nominee: &AccountId) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.access.require_owner(caller)?;
        self.airlines.register_first(nominee)
    }

    pub fn register_airline(&mut self, caller: &AccountId, nominee: &AccountId) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.airlines.register(caller, nominee)
    }

    pub fn fund_airline(&mut self, airline: &AccountId, amount: Amount) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.airlines.fund(
            airline,
            amount,
            self.config.airlines.registration_fee,
            &mut self.treasury,
        )
    }

    pub fn register_flight(&mut self, airline: &AccountId, code: &str, timestamp: i64) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.flights.register(airline, code, timestamp, &self.airlines)
    }

    pub fn buy_insurance(
        &mut self,
        passenger: &AccountId,
        flight: &FlightKey,
        amount: Amount,
    ) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        let record = self
            .flights
            .get(flight)
            .ok_or_else(|| LedgerError::NotFound(format!("flight {flight}")))?;
        self.insurance.buy(
            passenger,
            record,
            amount,
            &self.config.insurance,
            &mut self.treasury,
        )
    }

    pub fn withdraw(&mut self, passenger: &AccountId, amount: Amount) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.insurance.withdraw(passenger, amount, &mut self.treasury)
    }

    pub fn register_oracle(&mut self, oracle: &AccountId, stake: Amount) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        self.oracles
            .register(oracle, stake, &self.config.oracles, &mut self.treasury)
    }

    pub fn fetch_flight_status(&mut self, requester: &AccountId, flight: &FlightKey) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        let record = self
            .flights
            .get(flight)
            .ok_or_else(|| LedgerError::NotFound(format!("flight {flight}")))?;
        self.oracles
            .open_request(requester, record, &self.config.oracles)
    }

    /// Record an oracle response; on quorum, finalize the flight and settle
    /// its policies.
    pub fn submit_oracle_response(
        &mut self,
        oracle: &AccountId,
        index: u8,
        flight: &FlightKey,
        status: StatusCode,
    ) -> Result<Vec<LedgerEvent>> {
        self.access.require_operational()?;
        let (outcome, mut events) =
            self.oracles
                .submit(oracle, index, flight, status, self.config.oracles.quorum)?;

        if let Submission::Finalized { status } = outcome {
            self.flights.finalize(flight, status)?;
            events.extend(
                self.insurance
                    .credit_insurees(flight, status, &self.config.insurance)?,
            );
        }
        Ok(events)
    }

    /// Verify the cross-table invariants.
    pub fn check_invariants(&self) -> Result<()> {
        let violation = |msg: String| {
            error!(violation = %msg, "Ledger invariant violated");
            Err(LedgerError::InvariantViolation(msg))
        };

        self.treasury.check_balance()?;

        let funding: Amount = self.airlines.records().map(|a| a.funds_contributed).sum();
        if funding != self.treasury.airline_funding() {
            return violation(format!(
                "airline funds {funding} != treasury funding {}",
                self.treasury.airline_funding()
            ));
        }

        let funded = self.airlines.records().filter(|a| a.is_funded()).count();
        let active = self.airlines.list_active().len();
        if funded != active {
            return violation(format!("{funded} funded airlines but {active} active"));
        }

        let premiums: Amount = self.insurance.records().map(|p| p.premium).sum();
        if premiums != self.treasury.premiums() {
            return violation(format!(
                "policy premiums {premiums} != treasury premiums {}",
                self.treasury.premiums()
            ));
        }

        let stakes: Amount = self.oracles.oracles().map(|o| o.stake).sum();
        if stakes != self.treasury.oracle_stakes() {
            return violation(format!(
                "oracle stakes {stakes} != treasury stakes {}",
                self.treasury.oracle_stakes()
            ));
        }

        if self.insurance.withdrawn_total() != self.treasury.withdrawn() {
            return violation(format!(
                "passenger withdrawals {} != treasury withdrawals {}",
                self.insurance.withdrawn_total(),
                self.treasury.withdrawn()
            ));
        }

        let credited: Amount = self
            .insurance
            .records()
            .filter(|p| p.credited)
            .map(|p| p.payout)
            .sum();
        let outstanding: Amount = self.insurance.balances().map(|(_, b)| *b).sum();
        if credited != self.insurance.credited_total()
            || Some(outstanding) != credited.checked_sub(self.insurance.withdrawn_total())
        {
            return violation(format!(
                "balances {outstanding} != credited {credited} - withdrawn {}",
                self.insurance.withdrawn_total()
            ));
        }

        if let Some(policy) = self
            .insurance
            .records()
            .find(|p| self.flights.get(&p.flight).is_none())
        {
            return violation(format!("policy on unknown flight {}", policy.flight));
        }

        if let Some(policy) = self
            .insurance
            .records()
            .find(|p| p.credited && !self.insurance.is_settled(&p.flight))
        {
            return violation(format!(
                "policy of {} credited on unsettled flight {}",
                policy.passenger, policy.flight
            ));
        }

        for airline in self.airlines.records() {
            let AirlineState::Pending { voters } = &airline.state else {
                continue;
            };
            if let Some(voter) = voters.iter().find(|v| !self.airlines.is_funded(v)) {
                return violation(format!(
                    "{voter} voted for {} without being a funded airline",
                    airline.id
                ));
            }
        }

        for request in self.oracles.requests() {
            let flight = &request.key.flight;
            if self.flights.get(flight).is_none() {
                return violation(format!("request {} on unknown flight", request.key));
            }
            let Some(status) = request.resolution() else {
                continue;
            };
            let finalized = self
                .flights
                .get(flight)
                .is_some_and(|f| f.is_finalized() && f.status == status);
            if !finalized || !self.insurance.is_settled(flight) {
                return violation(format!("resolved request {} not applied", request.key));
            }
        }

        Ok(())
    }

    /// Export every table.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut airlines: Vec<Airline> = self.airlines.records().cloned().collect();
        airlines.sort_by(|a, b| a.id.cmp(&b.id));

        let mut flights: Vec<Flight> = self.flights.records().cloned().collect();
        // Registration order survives restore
        flights.sort_by(|a, b| (a.registered_at, &a.key).cmp(&(b.registered_at, &b.key)));

        let mut policies: Vec<Policy> = self.insurance.records().cloned().collect();
        policies.sort_by(|a, b| (&a.flight, &a.passenger).cmp(&(&b.flight, &b.passenger)));

        let mut settled: Vec<FlightKey> = self.insurance.settled().cloned().collect();
        settled.sort();

        let mut oracles: Vec<Oracle> = self.oracles.oracles().cloned().collect();
        oracles.sort_by(|a, b| a.id.cmp(&b.id));

        let mut requests: Vec<PendingRequest> = self.oracles.requests().cloned().collect();
        requests.sort_by(|a, b| a.key.cmp(&b.key));

        LedgerSnapshot {
            config: self.config.clone(),
            access: self.access.clone(),
            treasury: self.treasury.clone(),
            airlines,
            admission_order: self.airlines.admission_order().to_vec(),
            flights,
            policies,
            balances: self
                .insurance
                .balances()
                .map(|(id, amount)| (id.clone(), *amount))
                .collect(),
            settled,
            oracles,
            requests,
        }
    }

    /// Rebuild a ledger from a snapshot, rejecting inconsistent input.
    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.config.validate()?;
        if snapshot.access.owner() != &snapshot.config.owner {
            return Err(LedgerError::SnapshotError(
                "access control owner differs from configured owner".to_string(),
            ));
        }

        let withdrawn = snapshot.treasury.withdrawn();
        let state = Self {
            airlines: AirlineRegistry::restore(
                snapshot.config.airlines.consensus_threshold,
                snapshot.airlines,
                snapshot.admission_order,
            )?,
            flights: FlightRegistry::restore(snapshot.flights)?,
            insurance: InsuranceLedger::restore(
                snapshot.policies,
                snapshot.balances,
                snapshot.settled,
                withdrawn,
            )?,
            oracles: OracleConsensus::restore(snapshot.oracles, snapshot.requests)?,
            access: snapshot.access,
            treasury: snapshot.treasury,
            config: snapshot.config,
        };
        state.check_invariants()?;
        Ok(state)
    }
}

/// Serializable copy of every ledger table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub config: LedgerConfig,
    pub access: AccessControl,
    pub treasury: Treasury,
    pub airlines: Vec<Airline>,
    /// Registered airline ids in admission order
    pub admission_order: Vec<AccountId>,
    pub flights: Vec<Flight>,
    pub policies: Vec<Policy>,
    pub balances: Vec<(AccountId, Amount)>,
    /// Flights whose settlement already ran
    pub settled: Vec<FlightKey>,
    pub oracles: Vec<Oracle>,
    pub requests: Vec<PendingRequest>,
}

impl LedgerSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| LedgerError::SnapshotError(e.to_string()))
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| LedgerError::SnapshotError(e.to_string()))
    }
}
