//! End-to-end ledger scenarios.

use surety_ledger::config::OracleConfig;
use surety_ledger::{
    AccountId, FlightKey, FlightSurety, LedgerConfig, LedgerError, LedgerEvent, LedgerSnapshot,
    RequestKey, StatusCode, WEI_PER_ETHER,
};

const TIMESTAMP: i64 = 1_700_000_000;

fn id(name: &str) -> AccountId {
    AccountId::new(name)
}

fn airline(n: usize) -> AccountId {
    id(&format!("airline-{n}"))
}

fn oracle(n: usize) -> AccountId {
    id(&format!("oracle-{n}"))
}

fn owner() -> AccountId {
    id("owner")
}

/// Every oracle holds indexes 0, 1 and 2.
fn small_range_config() -> LedgerConfig {
    let mut config = LedgerConfig::new("owner");
    config.oracles = OracleConfig {
        index_range: 3,
        ..OracleConfig::default()
    };
    config
}

async fn fee(ledger: &FlightSurety) -> u128 {
    ledger.snapshot().await.config.airlines.registration_fee
}

/// Founding airline registered and funded, with one flight.
async fn founded(config: LedgerConfig) -> (FlightSurety, FlightKey) {
    let ledger = FlightSurety::with_config(config).unwrap();
    let fee = fee(&ledger).await;
    ledger.register_first_airline(&owner(), &airline(1)).await.unwrap();
    ledger.fund_airline(&airline(1), fee).await.unwrap();
    ledger
        .register_flight(&airline(1), "ND1309", TIMESTAMP)
        .await
        .unwrap();
    (ledger, FlightKey::new("airline-1", "ND1309", TIMESTAMP))
}

async fn register_oracles(ledger: &FlightSurety, count: usize) {
    let stake = ledger.snapshot().await.config.oracles.registration_fee;
    for n in 0..count {
        ledger.register_oracle(&oracle(n), stake).await.unwrap();
    }
}

/// Open the status request for `flight`, returning its index.
async fn request_status(ledger: &FlightSurety, flight: &FlightKey) -> u8 {
    let events = ledger.fetch_flight_status(&id("passenger-1"), flight).await.unwrap();
    match events.as_slice() {
        [LedgerEvent::StatusRequested { index, .. }] => *index,
        other => panic!("unexpected events {other:?}"),
    }
}

#[tokio::test]
async fn test_fast_path_then_majority_admission() {
    let (ledger, _) = founded(LedgerConfig::new("owner")).await;
    let fee = fee(&ledger).await;

    for n in 2..=4 {
        let events = ledger.register_airline(&airline(1), &airline(n)).await.unwrap();
        assert!(matches!(
            events.as_slice(),
            [LedgerEvent::AirlineRegistered { votes: 0, .. }]
        ));
    }
    assert_eq!(ledger.registered_count().await, 4);

    // Registered but unfunded airlines cannot vote.
    let err = ledger.register_airline(&airline(3), &airline(5)).await.unwrap_err();
    assert!(matches!(err, LedgerError::PermissionDenied(_)));

    ledger.fund_airline(&airline(2), fee).await.unwrap();

    let events = ledger.register_airline(&airline(1), &airline(5)).await.unwrap();
    assert!(matches!(
        events.as_slice(),
        [LedgerEvent::VoteRecorded { votes: 1, registered: 4, .. }]
    ));
    assert!(!ledger.is_airline(&airline(5)).await);
    assert_eq!(ledger.pending_votes(&airline(5)).await, Some(1));

    let err = ledger.register_airline(&airline(1), &airline(5)).await.unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateVote { .. }));
    assert!(err.is_noop());

    let events = ledger.register_airline(&airline(2), &airline(5)).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(ledger.is_airline(&airline(5)).await);
    assert!(!ledger.is_funded(&airline(5)).await);
    assert_eq!(ledger.registered_count().await, 5);
    assert_eq!(ledger.pending_votes(&airline(5)).await, None);

    let active: Vec<AccountId> = ledger.list_active().await.into_iter().map(|a| a.id).collect();
    assert_eq!(active, vec![airline(1), airline(2)]);
}

#[tokio::test]
async fn test_funding_rules() {
    let ledger = FlightSurety::new("owner").unwrap();
    let fee = fee(&ledger).await;

    let err = ledger.register_first_airline(&id("stranger"), &airline(1)).await.unwrap_err();
    assert!(matches!(err, LedgerError::PermissionDenied(_)));
    ledger.register_first_airline(&owner(), &airline(1)).await.unwrap();

    let err = ledger.fund_airline(&airline(1), fee - 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::OutOfRange { .. }));
    let err = ledger.fund_airline(&airline(9), fee).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    ledger.fund_airline(&airline(1), fee).await.unwrap();
    let err = ledger.fund_airline(&airline(1), fee).await.unwrap_err();
    assert_eq!(err, LedgerError::AlreadyFunded(airline(1)));

    let treasury = ledger.treasury().await;
    assert_eq!(treasury.balance(), fee);
    assert_eq!(treasury.airline_funding(), fee);
}

#[tokio::test]
async fn test_unfunded_airline_cannot_register_flights() {
    let ledger = FlightSurety::new("owner").unwrap();
    ledger.register_first_airline(&owner(), &airline(1)).await.unwrap();

    let err = ledger
        .register_flight(&airline(1), "ND1309", TIMESTAMP)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PermissionDenied(_)));
    assert!(ledger.flights_for_airline(&airline(1)).await.is_empty());
}

#[tokio::test]
async fn test_premium_bounds() {
    let (ledger, flight) = founded(LedgerConfig::new("owner")).await;

    let err = ledger
        .buy_insurance(&id("passenger-1"), &flight, WEI_PER_ETHER + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::OutOfRange { .. }));
    let err = ledger.buy_insurance(&id("passenger-1"), &flight, 0).await.unwrap_err();
    assert!(matches!(err, LedgerError::OutOfRange { .. }));

    ledger
        .buy_insurance(&id("passenger-1"), &flight, WEI_PER_ETHER)
        .await
        .unwrap();
    assert!(ledger.is_insured(&id("passenger-1"), &flight).await);

    let err = ledger
        .buy_insurance(&id("passenger-1"), &flight, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateEntry(_)));

    let missing = FlightKey::new("airline-1", "ND0000", TIMESTAMP);
    let err = ledger.buy_insurance(&id("passenger-1"), &missing, 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn test_delay_round_trip_with_default_indexes() {
    let (ledger, flight) = founded(LedgerConfig::new("owner")).await;
    let fee = fee(&ledger).await;
    register_oracles(&ledger, 20).await;

    let premium = WEI_PER_ETHER;
    ledger.buy_insurance(&id("passenger-1"), &flight, premium).await.unwrap();

    let index = request_status(&ledger, &flight).await;
    let mut holders = Vec::new();
    for n in 0..20 {
        if ledger.oracle_indexes(&oracle(n)).await.unwrap().contains(&index) {
            holders.push(oracle(n));
        }
    }
    assert!(holders.len() >= 3, "only {} oracles hold index {index}", holders.len());

    if let Some(outsider) = (0..20).map(oracle).find(|o| !holders.contains(o)) {
        let err = ledger
            .submit_oracle_response(&outsider, index, &flight, StatusCode::LateAirline)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));
    }

    for responder in &holders[..3] {
        ledger
            .submit_oracle_response(responder, index, &flight, StatusCode::LateAirline)
            .await
            .unwrap();
    }

    assert_eq!(ledger.flight_status(&flight).await.unwrap(), StatusCode::LateAirline);
    let payout = premium * 3 / 2;
    assert_eq!(ledger.balance_of(&id("passenger-1")).await, payout);

    let policy = ledger.policy(&id("passenger-1"), &flight).await.unwrap();
    assert!(policy.credited);
    assert_eq!(ledger.policies_for_flight(&flight).await, vec![policy.clone()]);
    assert_eq!(policy.payout, payout);

    // A fourth holder arriving late changes nothing.
    if let Some(late) = holders.get(3) {
        let events = ledger
            .submit_oracle_response(late, index, &flight, StatusCode::OnTime)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    let err = ledger
        .withdraw(&id("passenger-1"), payout + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

    ledger.withdraw(&id("passenger-1"), payout).await.unwrap();
    assert_eq!(ledger.balance_of(&id("passenger-1")).await, 0);

    let treasury = ledger.treasury().await;
    assert_eq!(treasury.balance(), fee + premium - payout);
    assert_eq!(treasury.withdrawn(), payout);
    assert_eq!(treasury.oracle_stakes(), 20 * 10 * WEI_PER_ETHER);
}

#[tokio::test]
async fn test_on_time_flight_pays_nothing() {
    let (ledger, flight) = founded(small_range_config()).await;
    register_oracles(&ledger, 3).await;
    ledger.buy_insurance(&id("passenger-1"), &flight, 500).await.unwrap();

    let index = request_status(&ledger, &flight).await;
    for n in 0..3 {
        ledger
            .submit_oracle_response(&oracle(n), index, &flight, StatusCode::OnTime)
            .await
            .unwrap();
    }

    assert_eq!(ledger.flight_status(&flight).await.unwrap(), StatusCode::OnTime);
    assert_eq!(ledger.balance_of(&id("passenger-1")).await, 0);
    assert!(!ledger.policy(&id("passenger-1"), &flight).await.unwrap().credited);

    let err = ledger
        .buy_insurance(&id("passenger-2"), &flight, 500)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyResolved(_)));

    let err = ledger.withdraw(&id("passenger-1"), 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
}

#[tokio::test]
async fn test_split_votes_resolve_to_first_quorum() {
    let (ledger, flight) = founded(small_range_config()).await;
    register_oracles(&ledger, 5).await;
    ledger.buy_insurance(&id("passenger-1"), &flight, 200).await.unwrap();
    let index = request_status(&ledger, &flight).await;

    let votes = [
        StatusCode::LateWeather,
        StatusCode::OnTime,
        StatusCode::LateWeather,
        StatusCode::OnTime,
    ];
    for (n, status) in votes.into_iter().enumerate() {
        ledger
            .submit_oracle_response(&oracle(n), index, &flight, status)
            .await
            .unwrap();
    }
    assert_eq!(ledger.flight_status(&flight).await.unwrap(), StatusCode::Unknown);

    let request = ledger
        .request(&RequestKey::new(index, flight.clone()))
        .await
        .unwrap();
    assert!(request.is_open());
    assert_eq!(request.tally().len(), 2);

    let events = ledger
        .submit_oracle_response(&oracle(4), index, &flight, StatusCode::OnTime)
        .await
        .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, LedgerEvent::StatusFinalized { status: StatusCode::OnTime, .. })));
    assert_eq!(ledger.balance_of(&id("passenger-1")).await, 0);
    assert!(ledger.open_requests().await.is_empty());
}

#[tokio::test]
async fn test_fetch_rules() {
    let (ledger, flight) = founded(small_range_config()).await;
    register_oracles(&ledger, 3).await;

    let missing = FlightKey::new("airline-1", "ND0000", TIMESTAMP);
    let err = ledger
        .fetch_flight_status(&id("passenger-1"), &missing)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let index = request_status(&ledger, &flight).await;
    assert_eq!(request_status(&ledger, &flight).await, index);
    assert_eq!(ledger.open_requests().await.len(), 1);

    for n in 0..3 {
        ledger
            .submit_oracle_response(&oracle(n), index, &flight, StatusCode::LateTechnical)
            .await
            .unwrap();
    }
    let err = ledger
        .fetch_flight_status(&id("passenger-1"), &flight)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyResolved(_)));
}

#[tokio::test]
async fn test_circuit_breaker() {
    let (ledger, flight) = founded(small_range_config()).await;

    let err = ledger.set_operational(&airline(1), false).await.unwrap_err();
    assert!(matches!(err, LedgerError::PermissionDenied(_)));

    ledger.set_operational(&owner(), false).await.unwrap();
    assert!(!ledger.is_operational().await);

    let err = ledger
        .buy_insurance(&id("passenger-1"), &flight, 100)
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::ServiceSuspended);
    let err = ledger.register_airline(&airline(1), &airline(2)).await.unwrap_err();
    assert_eq!(err, LedgerError::ServiceSuspended);

    // Reads keep working while suspended.
    assert!(ledger.is_funded(&airline(1)).await);
    assert_eq!(ledger.flight_status(&flight).await.unwrap(), StatusCode::Unknown);

    ledger.set_operational(&owner(), true).await.unwrap();
    ledger
        .buy_insurance(&id("passenger-1"), &flight, 100)
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_purchases() {
    let (ledger, flight) = founded(LedgerConfig::new("owner")).await;
    let fee = fee(&ledger).await;

    let mut handles = Vec::new();
    for n in 0..32u128 {
        let ledger = ledger.clone();
        let flight = flight.clone();
        handles.push(tokio::spawn(async move {
            let passenger = AccountId::new(format!("passenger-{n}"));
            ledger.buy_insurance(&passenger, &flight, 1_000 + n).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let expected: u128 = (0..32u128).map(|n| 1_000 + n).sum();
    let treasury = ledger.treasury().await;
    assert_eq!(treasury.premiums(), expected);
    assert_eq!(treasury.balance(), fee + expected);

    let purchases = ledger
        .events_since(0)
        .await
        .into_iter()
        .filter(|e| matches!(e.event, LedgerEvent::InsurancePurchased { .. }))
        .count();
    assert_eq!(purchases, 32);
}

#[tokio::test]
async fn test_journal_polling() {
    let (ledger, flight) = founded(small_range_config()).await;
    let cursor = ledger.last_seq().await;
    assert_eq!(cursor, 3);

    ledger.buy_insurance(&id("passenger-1"), &flight, 10).await.unwrap();
    let err = ledger
        .buy_insurance(&id("passenger-1"), &flight, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateEntry(_)));
    assert_eq!(ledger.last_seq().await, cursor + 1);

    let entries = ledger.events_since(cursor).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].seq, cursor + 1);
    assert!(matches!(
        entries[0].event,
        LedgerEvent::InsurancePurchased { premium: 10, .. }
    ));

    let recent = ledger.recent_events(2).await;
    assert_eq!(recent[0].seq, cursor + 1);
    assert!(matches!(recent[1].event, LedgerEvent::FlightRegistered { .. }));
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let (ledger, flight) = founded(small_range_config()).await;
    let fee = fee(&ledger).await;
    for n in 2..=4 {
        ledger.register_airline(&airline(1), &airline(n)).await.unwrap();
    }
    ledger.fund_airline(&airline(2), fee).await.unwrap();
    ledger.register_airline(&airline(1), &airline(5)).await.unwrap();
    register_oracles(&ledger, 3).await;
    ledger.buy_insurance(&id("passenger-1"), &flight, 400).await.unwrap();
    let index = request_status(&ledger, &flight).await;
    ledger
        .submit_oracle_response(&oracle(0), index, &flight, StatusCode::LateOther)
        .await
        .unwrap();

    let json = ledger.export_json().await.unwrap();
    let restored = FlightSurety::from_snapshot(LedgerSnapshot::from_json(&json).unwrap()).unwrap();

    assert_eq!(restored.registered_count().await, 4);
    assert_eq!(restored.pending_votes(&airline(5)).await, Some(1));
    assert_eq!(restored.treasury().await, ledger.treasury().await);
    assert_eq!(restored.last_seq().await, 0);

    // Pending vote and open request carry over.
    restored.register_airline(&airline(2), &airline(5)).await.unwrap();
    assert!(restored.is_airline(&airline(5)).await);
    for n in 1..3 {
        restored
            .submit_oracle_response(&oracle(n), index, &flight, StatusCode::LateOther)
            .await
            .unwrap();
    }
    assert_eq!(restored.balance_of(&id("passenger-1")).await, 600);

    // The original ledger is unaffected.
    assert_eq!(ledger.balance_of(&id("passenger-1")).await, 0);
}

#[test]
fn test_ledger_from_yaml_config() {
    let yaml = r#"
owner: deployer
airlines:
  registration_fee: 100
  consensus_threshold: 2
insurance:
  premium_cap: 10
  payout_numerator: 2
  payout_denominator: 1
oracles:
  registration_fee: 5
  indexes_per_oracle: 1
  index_range: 1
  quorum: 1
journal:
  max_events: 8
"#;
    let config = LedgerConfig::from_yaml(yaml).unwrap();

    tokio_test::block_on(async {
        let ledger = FlightSurety::with_config(config).unwrap();
        let deployer = id("deployer");
        ledger.register_first_airline(&deployer, &airline(1)).await.unwrap();
        ledger.fund_airline(&airline(1), 100).await.unwrap();
        ledger.register_flight(&airline(1), "ND1", TIMESTAMP).await.unwrap();

        let flight = FlightKey::new("airline-1", "ND1", TIMESTAMP);
        ledger.buy_insurance(&id("passenger-1"), &flight, 10).await.unwrap();
        ledger.register_oracle(&oracle(0), 5).await.unwrap();
        assert_eq!(ledger.oracle_indexes(&oracle(0)).await.unwrap(), vec![0]);

        ledger
            .fetch_flight_status(&id("passenger-1"), &flight)
            .await
            .unwrap();
        ledger
            .submit_oracle_response(&oracle(0), 0, &flight, StatusCode::LateAirline)
            .await
            .unwrap();
        assert_eq!(ledger.balance_of(&id("passenger-1")).await, 20);
    });
}
