//! Insurance escrow.
//!
//! Passengers buy one policy per flight while its status is still unknown.
//! When a quorum confirms a delay every open policy on the flight is credited
//! with the premium times the payout multiplier, and passengers withdraw
//! their credited balance at will.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

use surety_types::{AccountId, Amount, FlightKey, LedgerError, LedgerEvent, Result, StatusCode};

use crate::access::{checked_add, Treasury};
use crate::config::InsuranceConfig;
use crate::registry::Flight;

/// A passenger's policy on one flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Insured passenger
    pub passenger: AccountId,
    /// Insured flight
    pub flight: FlightKey,
    /// Premium paid
    pub premium: Amount,
    /// Whether the payout was credited
    pub credited: bool,
    /// Amount credited (0 until credited)
    pub payout: Amount,
    /// When the policy was bought
    pub purchased_at: DateTime<Utc>,
    /// When the payout was credited
    pub credited_at: Option<DateTime<Utc>>,
}

/// Escrow of premiums and passenger balances.
#[derive(Debug, Clone, Default)]
pub struct InsuranceLedger {
    /// Policies per flight, ordered by passenger
    policies: HashMap<FlightKey, BTreeMap<AccountId, Policy>>,
    /// Withdrawable balance per passenger
    balances: BTreeMap<AccountId, Amount>,
    /// Flights whose settlement already ran
    settled: HashSet<FlightKey>,
    /// Sum of all credited payouts
    credited_total: Amount,
    /// Sum of all withdrawals
    withdrawn_total: Amount,
}

impl InsuranceLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from its records.
    pub fn restore(
        policies: Vec<Policy>,
        balances: Vec<(AccountId, Amount)>,
        settled: Vec<FlightKey>,
        withdrawn_total: Amount,
    ) -> Result<Self> {
        let mut ledger = Self::new();
        for policy in policies {
            if policy.credited {
                ledger.credited_total = checked_add(ledger.credited_total, policy.payout)?;
            }
            let by_passenger = ledger.policies.entry(policy.flight.clone()).or_default();
            if by_passenger.contains_key(&policy.passenger) {
                return Err(LedgerError::SnapshotError(format!(
                    "duplicate policy for {} on {}",
                    policy.passenger, policy.flight
                )));
            }
            by_passenger.insert(policy.passenger.clone(), policy);
        }
        ledger.balances = balances.into_iter().collect();
        ledger.settled = settled.into_iter().collect();
        ledger.withdrawn_total = withdrawn_total;
        Ok(ledger)
    }

    /// Buy a policy on `flight` for `passenger`.
    pub fn buy(
        &mut self,
        passenger: &AccountId,
        flight: &Flight,
        amount: Amount,
        config: &InsuranceConfig,
        treasury: &mut Treasury,
    ) -> Result<Vec<LedgerEvent>> {
        if amount == 0 || amount > config.premium_cap {
            return Err(LedgerError::OutOfRange {
                amount,
                min: 1,
                max: config.premium_cap,
            });
        }
        if self.policy(passenger, &flight.key).is_some() {
            return Err(LedgerError::DuplicateEntry(format!(
                "{passenger} already insured on {}",
                flight.key
            )));
        }
        if flight.is_finalized() || flight.status != StatusCode::Unknown {
            return Err(LedgerError::AlreadyResolved(format!(
                "flight {} is {}",
                flight.key, flight.status
            )));
        }

        treasury.deposit_premium(amount)?;
        self.policies.entry(flight.key.clone()).or_default().insert(
            passenger.clone(),
            Policy {
                passenger: passenger.clone(),
                flight: flight.key.clone(),
                premium: amount,
                credited: false,
                payout: 0,
                purchased_at: Utc::now(),
                credited_at: None,
            },
        );

        info!(passenger = %passenger, flight = %flight.key, premium = amount, "Insurance purchased");
        Ok(vec![LedgerEvent::InsurancePurchased {
            passenger: passenger.clone(),
            flight: flight.key.clone(),
            premium: amount,
        }])
    }

    /// Settle a flight once its final status is known.
    ///
    /// A delay credits every uncredited policy on the flight; any other status
    /// settles the flight without payouts.
    pub(crate) fn credit_insurees(
        &mut self,
        flight: &FlightKey,
        status: StatusCode,
        config: &InsuranceConfig,
    ) -> Result<Vec<LedgerEvent>> {
        if !self.settled.insert(flight.clone()) {
            return Err(LedgerError::AlreadyResolved(format!(
                "flight {flight} already settled"
            )));
        }
        if !status.is_delay() {
            debug!(flight = %flight, status = %status, "Flight settled without payouts");
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        let Some(policies) = self.policies.get_mut(flight) else {
            return Ok(events);
        };

        let now = Utc::now();
        for policy in policies.values_mut().filter(|p| !p.credited) {
            let payout = policy
                .premium
                .checked_mul(config.payout_numerator)
                .map(|scaled| scaled / config.payout_denominator)
                .ok_or(LedgerError::OutOfRange {
                    amount: policy.premium,
                    min: 1,
                    max: Amount::MAX / config.payout_numerator.max(1),
                })?;

            let balance = self.balances.entry(policy.passenger.clone()).or_insert(0);
            *balance = checked_add(*balance, payout)?;
            self.credited_total = checked_add(self.credited_total, payout)?;

            policy.credited = true;
            policy.payout = payout;
            policy.credited_at = Some(now);

            debug!(passenger = %policy.passenger, flight = %flight, payout, "Policy credited");
            events.push(LedgerEvent::PolicyCredited {
                passenger: policy.passenger.clone(),
                flight: flight.clone(),
                payout,
            });
        }

        info!(flight = %flight, status = %status, credited = events.len(), "Flight settled");
        Ok(events)
    }

    /// Withdraw credited funds.
    pub fn withdraw(
        &mut self,
        passenger: &AccountId,
        amount: Amount,
        treasury: &mut Treasury,
    ) -> Result<Vec<LedgerEvent>> {
        let available = self.balance_of(passenger);
        if amount == 0 {
            return Err(LedgerError::OutOfRange {
                amount,
                min: 1,
                max: available,
            });
        }
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }

        treasury.pay_out(amount)?;
        let remaining = available - amount;
        if remaining == 0 {
            self.balances.remove(passenger);
        } else {
            self.balances.insert(passenger.clone(), remaining);
        }
        self.withdrawn_total = checked_add(self.withdrawn_total, amount)?;

        info!(passenger = %passenger, amount, remaining, "Funds withdrawn");
        Ok(vec![LedgerEvent::FundsWithdrawn {
            passenger: passenger.clone(),
            amount,
        }])
    }

    /// Get a passenger's policy on a flight.
    pub fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<&Policy> {
        self.policies.get(flight).and_then(|p| p.get(passenger))
    }

    /// Whether a passenger holds a policy on a flight.
    pub fn is_insured(&self, passenger: &AccountId, flight: &FlightKey) -> bool {
        self.policy(passenger, flight).is_some()
    }

    /// Policies on a flight, ordered by passenger.
    pub fn policies_for_flight(&self, flight: &FlightKey) -> Vec<&Policy> {
        self.policies
            .get(flight)
            .map(|p| p.values().collect())
            .unwrap_or_default()
    }

    /// Withdrawable balance of a passenger.
    pub fn balance_of(&self, passenger: &AccountId) -> Amount {
        self.balances.get(passenger).copied().unwrap_or(0)
    }

    /// Whether settlement already ran for a flight.
    pub fn is_settled(&self, flight: &FlightKey) -> bool {
        self.settled.contains(flight)
    }

    /// Every policy.
    pub fn records(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values().flat_map(|p| p.values())
    }

    /// Every non-zero passenger balance.
    pub fn balances(&self) -> impl Iterator<Item = (&AccountId, &Amount)> {
        self.balances.iter()
    }

    /// Every settled flight.
    pub fn settled(&self) -> impl Iterator<Item = &FlightKey> {
        self.settled.iter()
    }

    /// Sum of all credited payouts.
    pub fn credited_total(&self) -> Amount {
        self.credited_total
    }

    /// Sum of all withdrawals.
    pub fn withdrawn_total(&self) -> Amount {
        self.withdrawn_total
    }
}
