//! Deterministic index derivation.
//!
//! Oracles receive their indexes from a SHA-256 stream seeded by their id;
//! requests target the index derived from the flight key. Both are
//! reproducible so any collaborator can recompute them.

use sha2::{Digest, Sha256};
use surety_types::{AccountId, FlightKey, LedgerError, RequestKey, Result};

fn check_range(range: u16) -> Result<()> {
    if range == 0 || range > 256 {
        return Err(LedgerError::ConfigError(format!(
            "index range {range} not within 1..=256"
        )));
    }
    Ok(())
}

fn index_of(seed: &str, range: u16) -> u8 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    // range <= 256, so the remainder fits in a u8
    (u64::from_be_bytes(prefix) % u64::from(range)) as u8
}

/// Assign `count` distinct indexes in `0..range` to an oracle.
///
/// Fails unless `0 < count <= range <= 256`.
pub fn oracle_indexes(oracle: &AccountId, count: u8, range: u16) -> Result<Vec<u8>> {
    check_range(range)?;
    if count == 0 || u16::from(count) > range {
        return Err(LedgerError::ConfigError(format!(
            "cannot draw {count} distinct indexes from a range of {range}"
        )));
    }

    let mut indexes = Vec::with_capacity(count as usize);
    let mut nonce: u64 = 0;
    while indexes.len() < count as usize {
        let index = index_of(&format!("oracle:{oracle}:{nonce}"), range);
        if !indexes.contains(&index) {
            indexes.push(index);
        }
        nonce += 1;
    }
    Ok(indexes)
}

/// Index of the oracles asked to report on a flight.
pub fn flight_index(flight: &FlightKey, range: u16) -> Result<u8> {
    check_range(range)?;
    Ok(index_of(
        &format!("flight:{}:{}:{}", flight.airline, flight.code, flight.timestamp),
        range,
    ))
}

/// Short hex fingerprint of a request, used to correlate log lines.
pub fn request_fingerprint(key: &RequestKey) -> String {
    let digest = Sha256::digest(key.to_string().as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_indexes_are_distinct_and_stable() {
        let oracle = AccountId::new("oracle-0");
        let first = oracle_indexes(&oracle, 3, 10).unwrap();
        let second = oracle_indexes(&oracle, 3, 10).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.iter().all(|i| *i < 10));
        assert!(first[0] != first[1] && first[1] != first[2] && first[0] != first[2]);
    }

    #[test]
    fn test_full_range_assignment() {
        let mut indexes = oracle_indexes(&AccountId::new("oracle-7"), 3, 3).unwrap();
        indexes.sort_unstable();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_flight_index_is_deterministic() {
        let key = FlightKey::new("airline-1", "ND1309", 1_700_000_000);
        let same = FlightKey::new("airline-1", "ND1309", 1_700_000_000);
        let index = flight_index(&key, 10).unwrap();
        assert_eq!(index, flight_index(&same, 10).unwrap());
        assert!(index < 10);
    }

    #[test]
    fn test_unusable_ranges_are_rejected() {
        let oracle = AccountId::new("oracle-0");
        let key = FlightKey::new("airline-1", "ND1309", 1_700_000_000);

        assert!(matches!(oracle_indexes(&oracle, 3, 0), Err(LedgerError::ConfigError(_))));
        assert!(matches!(oracle_indexes(&oracle, 4, 3), Err(LedgerError::ConfigError(_))));
        assert!(matches!(oracle_indexes(&oracle, 0, 3), Err(LedgerError::ConfigError(_))));
        assert!(matches!(oracle_indexes(&oracle, 1, 257), Err(LedgerError::ConfigError(_))));
        assert!(matches!(flight_index(&key, 0), Err(LedgerError::ConfigError(_))));
    }

    #[test]
    fn test_fingerprint_length() {
        let key = RequestKey::new(3, FlightKey::new("airline-1", "ND1309", 1_700_000_000));
        assert_eq!(request_fingerprint(&key).len(), 12);
    }
}
