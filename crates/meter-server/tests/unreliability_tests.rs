//! Failure injection must not disturb the generated data
//!
//! Runs the unreliable endpoint many times and checks both the observed
//! failure rate and that every successful page equals the reliable one.

use meter_server::{
    service::{DataService, Endpoint, PageRequest},
    unreliability::UnreliabilityInjector,
    ServiceError,
};

const RUNS: usize = 1000;

#[test]
fn test_failure_rate_and_data_independence() {
    let service = DataService::new(UnreliabilityInjector::new(0.3).unwrap(), 4);
    let request = PageRequest::new(200, 3, 25);
    let reliable = service.fetch_page(&request, Endpoint::Reliable).unwrap();

    let mut failures = 0usize;
    for _ in 0..RUNS {
        match service.fetch_page(&request, Endpoint::Unreliable) {
            Ok(envelope) => assert_eq!(envelope, reliable),
            Err(ServiceError::Unavailable) => failures += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    // Binomial(1000, 0.3) has a standard deviation of ~14.5; allow ~5 sigma.
    let rate = failures as f64 / RUNS as f64;
    assert!((0.23..=0.37).contains(&rate), "failure rate was {rate}");
}

#[test]
fn test_concurrent_readers_see_one_dataset() {
    let service = std::sync::Arc::new(DataService::default());
    let handles: Vec<_> = (1..=8)
        .map(|page| {
            let service = std::sync::Arc::clone(&service);
            std::thread::spawn(move || {
                service
                    .fetch_page(&PageRequest::new(80, page, 10), Endpoint::Reliable)
                    .unwrap()
                    .items
            })
        })
        .collect();

    let rebuilt: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(rebuilt, *service.dataset(80, None));
}
