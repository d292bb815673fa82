//! Core identity, key and status types.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Monetary amount in the smallest ledger unit.
pub type Amount = u128;

/// Base units per whole ether.
pub const WEI_PER_ETHER: Amount = 1_000_000_000_000_000_000;

/// Identity of any ledger participant.
///
/// Owners, airlines, passengers and oracles share one identity space, the
/// same way they share one address space on the ledger this models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Flight status as reported by oracles.
///
/// The discriminants are the wire codes the status bot submits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// No confirmed status yet
    #[default]
    Unknown = 0,
    /// Departed on time
    OnTime = 10,
    /// Delayed by the airline
    LateAirline = 20,
    /// Delayed by weather
    LateWeather = 30,
    /// Delayed by a technical issue
    LateTechnical = 40,
    /// Delayed for another reason
    LateOther = 50,
}

impl StatusCode {
    /// Numeric wire code.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Parse a wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            10 => Some(Self::OnTime),
            20 => Some(Self::LateAirline),
            30 => Some(Self::LateWeather),
            40 => Some(Self::LateTechnical),
            50 => Some(Self::LateOther),
            _ => None,
        }
    }

    /// Whether this status entitles insured passengers to a payout.
    pub fn is_delay(&self) -> bool {
        !matches!(self, Self::Unknown | Self::OnTime)
    }

    /// Get string representation for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::OnTime => "ON_TIME",
            Self::LateAirline => "LATE_AIRLINE",
            Self::LateWeather => "LATE_WEATHER",
            Self::LateTechnical => "LATE_TECHNICAL",
            Self::LateOther => "LATE_OTHER",
        }
    }

    /// Every status code in wire order.
    pub fn all() -> [Self; 6] {
        [
            Self::Unknown,
            Self::OnTime,
            Self::LateAirline,
            Self::LateWeather,
            Self::LateTechnical,
            Self::LateOther,
        ]
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Natural key of a flight: operating airline, flight code, scheduled time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FlightKey {
    /// Airline operating the flight
    pub airline: AccountId,
    /// Flight code, e.g. `ND1309`
    pub code: String,
    /// Scheduled departure as a unix timestamp (seconds)
    pub timestamp: i64,
}

impl FlightKey {
    /// Create a flight key.
    pub fn new(airline: impl Into<AccountId>, code: impl Into<String>, timestamp: i64) -> Self {
        Self {
            airline: airline.into(),
            code: code.into(),
            timestamp,
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.airline, self.code, self.timestamp)
    }
}

/// Key of a status request: the responder index plus the flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct RequestKey {
    /// Index of the oracles allowed to respond
    pub index: u8,
    /// Flight whose status is requested
    pub flight: FlightKey,
}

impl RequestKey {
    /// Create a request key.
    pub fn new(index: u8, flight: FlightKey) -> Self {
        Self { index, flight }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.flight)
    }
}
