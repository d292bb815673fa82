//! Access control and the treasury.
//!
//! [`AccessControl`] holds the owner and the circuit breaker every mutating
//! operation consults. [`Treasury`] is the single source of truth for the
//! funds the ledger holds.

use serde::{Deserialize, Serialize};
use surety_types::{AccountId, Amount, LedgerError, LedgerEvent, Result};
use tracing::{info, warn};

/// Owner-gated operational flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    owner: AccountId,
    operational: bool,
}

impl AccessControl {
    /// Create an operational access control owned by `owner`.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            operational: true,
        }
    }

    /// Contract owner.
    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    /// Whether mutating operations are accepted.
    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Fail unless `caller` is the owner.
    pub fn require_owner(&self, caller: &AccountId) -> Result<()> {
        if caller != &self.owner {
            return Err(LedgerError::PermissionDenied(format!(
                "{caller} is not the contract owner"
            )));
        }
        Ok(())
    }

    /// Fail while the circuit breaker is active.
    pub fn require_operational(&self) -> Result<()> {
        if !self.operational {
            warn!("Rejected call while ledger is suspended");
            return Err(LedgerError::ServiceSuspended);
        }
        Ok(())
    }

    /// Toggle the circuit breaker.
    pub fn set_operational(&mut self, caller: &AccountId, operational: bool) -> Result<Vec<LedgerEvent>> {
        self.require_owner(caller)?;
        self.operational = operational;

        info!(operational, "Operational status changed");
        Ok(vec![LedgerEvent::OperationalStatusChanged { operational }])
    }
}

/// Aggregate funds held by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Funds available for payouts
    balance: Amount,
    /// Airline registration fees collected
    airline_funding: Amount,
    /// Passenger premiums collected
    premiums: Amount,
    /// Credits paid out to passengers
    withdrawn: Amount,
    /// Oracle stakes, escrowed apart from the payout pool
    oracle_stakes: Amount,
}

impl Treasury {
    /// Create an empty treasury.
    pub fn new() -> Self {
        Self::default()
    }

    /// Funds available for payouts.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Airline registration fees collected.
    pub fn airline_funding(&self) -> Amount {
        self.airline_funding
    }

    /// Passenger premiums collected.
    pub fn premiums(&self) -> Amount {
        self.premiums
    }

    /// Credits paid out to passengers.
    pub fn withdrawn(&self) -> Amount {
        self.withdrawn
    }

    /// Oracle stakes held in escrow.
    pub fn oracle_stakes(&self) -> Amount {
        self.oracle_stakes
    }

    pub(crate) fn deposit_funding(&mut self, amount: Amount) -> Result<()> {
        self.airline_funding = checked_add(self.airline_funding, amount)?;
        self.balance = checked_add(self.balance, amount)?;
        Ok(())
    }

    pub(crate) fn deposit_premium(&mut self, amount: Amount) -> Result<()> {
        self.premiums = checked_add(self.premiums, amount)?;
        self.balance = checked_add(self.balance, amount)?;
        Ok(())
    }

    pub(crate) fn escrow_stake(&mut self, amount: Amount) -> Result<()> {
        self.oracle_stakes = checked_add(self.oracle_stakes, amount)?;
        Ok(())
    }

    pub(crate) fn pay_out(&mut self, amount: Amount) -> Result<()> {
        if amount > self.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        self.withdrawn = checked_add(self.withdrawn, amount)?;
        Ok(())
    }

    /// Check the balance against the individual accounts.
    pub fn check_balance(&self) -> Result<()> {
        let expected = self
            .airline_funding
            .checked_add(self.premiums)
            .and_then(|total| total.checked_sub(self.withdrawn));
        if expected != Some(self.balance) {
            return Err(LedgerError::InvariantViolation(format!(
                "treasury balance {} != funding {} + premiums {} - withdrawn {}",
                self.balance, self.airline_funding, self.premiums, self.withdrawn
            )));
        }
        Ok(())
    }
}

pub(crate) fn checked_add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or(LedgerError::OutOfRange {
        amount: b,
        min: 0,
        max: Amount::MAX - a,
    })
}
