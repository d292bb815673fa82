//! Flight registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use surety_types::{AccountId, FlightKey, LedgerError, LedgerEvent, Result, StatusCode};

use super::airlines::AirlineRegistry;

/// A flight registered by a funded airline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    /// Natural key
    pub key: FlightKey,
    /// Current status, Unknown until an oracle quorum resolves it
    pub status: StatusCode,
    /// When the flight was registered
    pub registered_at: DateTime<Utc>,
    /// When the status was finalized
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Flight {
    /// Whether an oracle quorum has resolved the flight.
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }
}

/// Registry of flights keyed by (airline, code, timestamp).
#[derive(Debug, Clone, Default)]
pub struct FlightRegistry {
    flights: HashMap<FlightKey, Flight>,
    by_airline: HashMap<AccountId, Vec<FlightKey>>,
}

impl FlightRegistry {
    /// Create an empty flight registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from its records, preserving their order per airline.
    pub fn restore(records: Vec<Flight>) -> Result<Self> {
        let mut registry = Self::new();
        for flight in records {
            if registry.flights.contains_key(&flight.key) {
                return Err(LedgerError::SnapshotError(format!(
                    "duplicate flight {}",
                    flight.key
                )));
            }
            registry
                .by_airline
                .entry(flight.key.airline.clone())
                .or_default()
                .push(flight.key.clone());
            registry.flights.insert(flight.key.clone(), flight);
        }
        Ok(registry)
    }

    /// Register a flight for a funded airline.
    pub fn register(
        &mut self,
        airline: &AccountId,
        code: &str,
        timestamp: i64,
        airlines: &AirlineRegistry,
    ) -> Result<Vec<LedgerEvent>> {
        if !airlines.is_funded(airline) {
            return Err(LedgerError::PermissionDenied(format!(
                "{airline} is not a funded airline"
            )));
        }

        let key = FlightKey::new(airline.clone(), code, timestamp);
        if self.flights.contains_key(&key) {
            return Err(LedgerError::DuplicateEntry(format!("flight {key}")));
        }

        self.flights.insert(
            key.clone(),
            Flight {
                key: key.clone(),
                status: StatusCode::Unknown,
                registered_at: Utc::now(),
                finalized_at: None,
            },
        );
        self.by_airline
            .entry(airline.clone())
            .or_default()
            .push(key.clone());

        info!(flight = %key, "Flight registered");
        Ok(vec![LedgerEvent::FlightRegistered { flight: key }])
    }

    /// Record the status agreed by an oracle quorum.
    pub(crate) fn finalize(&mut self, key: &FlightKey, status: StatusCode) -> Result<()> {
        let flight = self
            .flights
            .get_mut(key)
            .ok_or_else(|| LedgerError::NotFound(format!("flight {key}")))?;
        if flight.is_finalized() {
            return Err(LedgerError::AlreadyResolved(format!("flight {key}")));
        }
        flight.status = status;
        flight.finalized_at = Some(Utc::now());
        Ok(())
    }

    /// Get a flight.
    pub fn get(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    /// Current status of a flight.
    pub fn status(&self, key: &FlightKey) -> Result<StatusCode> {
        self.flights
            .get(key)
            .map(|f| f.status)
            .ok_or_else(|| LedgerError::NotFound(format!("flight {key}")))
    }

    /// Flights of an airline in registration order.
    pub fn list_for_airline(&self, airline: &AccountId) -> Vec<&Flight> {
        self.by_airline
            .get(airline)
            .map(|keys| keys.iter().filter_map(|k| self.flights.get(k)).collect())
            .unwrap_or_default()
    }

    /// Every flight record.
    pub fn records(&self) -> impl Iterator<Item = &Flight> {
        self.by_airline
            .values()
            .flatten()
            .filter_map(|k| self.flights.get(k))
    }

    /// Number of registered flights.
    pub fn len(&self) -> usize {
        self.flights.len()
    }

    /// Whether no flight is registered.
    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
