//! Configuration for the ledger.

use serde::{Deserialize, Serialize};
use surety_types::{AccountId, Amount, LedgerError, Result, WEI_PER_ETHER};

/// Configuration for a Flight Surety ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Contract owner, the only account allowed to toggle the circuit breaker
    pub owner: AccountId,
    /// Airline admission configuration
    pub airlines: AirlineConfig,
    /// Insurance configuration
    pub insurance: InsuranceConfig,
    /// Oracle configuration
    pub oracles: OracleConfig,
    /// Event journal configuration
    pub journal: JournalConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            owner: AccountId::new("owner"),
            airlines: AirlineConfig::default(),
            insurance: InsuranceConfig::default(),
            oracles: OracleConfig::default(),
            journal: JournalConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Create a new config with the given owner.
    pub fn new(owner: impl Into<AccountId>) -> Self {
        Self {
            owner: owner.into(),
            ..Default::default()
        }
    }

    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Reject configurations the ledger cannot operate under.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(LedgerError::ConfigError(msg.to_string()));

        if self.owner.as_str().is_empty() {
            return fail("owner must not be empty");
        }
        if self.airlines.registration_fee == 0 {
            return fail("airline registration fee must be positive");
        }
        if self.airlines.consensus_threshold == 0 {
            return fail("consensus threshold must be positive");
        }
        if self.insurance.premium_cap == 0 {
            return fail("premium cap must be positive");
        }
        if self.insurance.payout_denominator == 0 {
            return fail("payout denominator must be positive");
        }
        self.oracles.validate()?;
        if self.journal.max_events == 0 {
            return fail("journal must retain at least one event");
        }
        Ok(())
    }
}

/// Airline admission configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirlineConfig {
    /// Exact amount an airline pays to become funded
    pub registration_fee: Amount,
    /// Registered airline count from which admission needs majority votes
    pub consensus_threshold: usize,
}

impl Default for AirlineConfig {
    fn default() -> Self {
        Self {
            registration_fee: 10 * WEI_PER_ETHER,
            consensus_threshold: 4,
        }
    }
}

/// Insurance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceConfig {
    /// Largest premium a passenger may pay for one policy
    pub premium_cap: Amount,
    /// Payout multiplier numerator
    pub payout_numerator: Amount,
    /// Payout multiplier denominator
    pub payout_denominator: Amount,
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            premium_cap: WEI_PER_ETHER,
            payout_numerator: 3,
            payout_denominator: 2,
        }
    }
}

/// Oracle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Exact stake an oracle deposits at registration
    pub registration_fee: Amount,
    /// Distinct indexes assigned to each oracle
    pub indexes_per_oracle: u8,
    /// Size of the shared index range `0..index_range`
    pub index_range: u16,
    /// Distinct matching votes needed to finalize a request
    pub quorum: usize,
}

impl OracleConfig {
    /// Reject oracle settings the index derivation cannot serve.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(LedgerError::ConfigError(msg.to_string()));

        if self.registration_fee == 0 {
            return fail("oracle registration fee must be positive");
        }
        if self.quorum == 0 {
            return fail("oracle quorum must be positive");
        }
        if self.indexes_per_oracle == 0 {
            return fail("oracles need at least one index");
        }
        if self.index_range == 0 || self.index_range > 256 {
            return fail("index range must be within 1..=256");
        }
        if u16::from(self.indexes_per_oracle) > self.index_range {
            return fail("index range is smaller than the indexes per oracle");
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            registration_fee: 10 * WEI_PER_ETHER,
            indexes_per_oracle: 3,
            index_range: 10,
            quorum: 3,
        }
    }
}

/// Event journal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Maximum events retained before the oldest are evicted
    pub max_events: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { max_events: 10_000 }
    }
}
