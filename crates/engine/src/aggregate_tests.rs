// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use valet_adapters::FakeDriver;
use valet_core::Offer;

fn fleet(drivers: Vec<FakeDriver>) -> Vec<Arc<dyn PlatformDriver>> {
    drivers.into_iter().map(|d| Arc::new(d) as Arc<dyn PlatformDriver>).collect()
}

fn query() -> SearchQuery {
    SearchQuery::builder("Home", "Airport").build()
}

#[tokio::test]
async fn one_failing_platform_does_not_poison_the_rest() {
    let drivers = fleet(vec![
        FakeDriver::new("testcab").with_offer("Go Mini", "₹180"),
        FakeDriver::new("quickhop").fail_search("upstream 503"),
        FakeDriver::new("swifteats").with_offer("Go Sedan", "₹250"),
    ]);

    let outcome = search_all(&drivers, &query(), Duration::from_secs(5)).await;
    assert_eq!(outcome.offers.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].platform, "quickhop");
    assert!(outcome.failure_summary().unwrap().contains("upstream 503"));
}

#[tokio::test]
async fn offers_rank_ascending_across_platforms() {
    let drivers = fleet(vec![
        FakeDriver::new("testcab")
            .with_offer("Go Premium", "₹310")
            .with_offer("Go Mini", "₹180"),
        FakeDriver::new("quickhop")
            .with_offer("Surge Special", "N/A")
            .with_offer("Hop", "₹199"),
    ]);

    let outcome = search_all(&drivers, &query(), Duration::from_secs(5)).await;
    let names: Vec<&str> = outcome.offers.iter().map(|o| o.name.as_str()).collect();
    // Unparsable prices rank last.
    assert_eq!(names, ["Go Mini", "Hop", "Go Premium", "Surge Special"]);
}

#[tokio::test]
async fn equal_normalized_prices_keep_discovery_order() {
    let drivers = fleet(vec![
        FakeDriver::new("testcab").with_offer("First", "₹100"),
        FakeDriver::new("quickhop").with_offer("Second", "100.00"),
    ]);

    let outcome = search_all(&drivers, &query(), Duration::from_secs(5)).await;
    let names: Vec<&str> = outcome.offers.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["First", "Second"]);
}

#[tokio::test(start_paused = true)]
async fn slow_driver_times_out_without_stalling_the_fanout() {
    let drivers = fleet(vec![
        FakeDriver::new("testcab").with_offer("Go Mini", "₹180"),
        FakeDriver::new("quickhop")
            .with_offer("Never Seen", "₹1")
            .search_delay(Duration::from_secs(120)),
    ]);

    let outcome = search_all(&drivers, &query(), Duration::from_secs(30)).await;
    assert_eq!(outcome.offers.len(), 1);
    assert_eq!(outcome.offers[0].name, "Go Mini");
    assert!(matches!(outcome.failures[0].error, DriverError::Timeout { .. }));
}

#[tokio::test]
async fn clean_outcome_has_no_failure_summary() {
    let drivers = fleet(vec![FakeDriver::new("testcab").with_offer("Go Mini", "₹180")]);
    let outcome = search_all(&drivers, &query(), Duration::from_secs(5)).await;
    assert!(outcome.failure_summary().is_none());
}

#[test]
fn rank_handles_grouped_and_unparsable_prices() {
    let mut offers: Vec<Offer> = ["₹1,234", "₹99", "N/A", "₹500"]
        .iter()
        .map(|price| Offer::builder().name(*price).price_text(*price).build())
        .collect();
    rank_offers(&mut offers);
    let prices: Vec<&str> = offers.iter().map(|o| o.price_text.as_str()).collect();
    assert_eq!(prices, ["₹99", "₹500", "₹1,234", "N/A"]);
}

#[test]
fn rank_is_a_stable_sort() {
    let mut offers = vec![
        Offer::builder().name("B").price_text("₹200").build(),
        Offer::builder().name("A").price_text("₹200").build(),
        Offer::builder().name("C").price_text("₹50").build(),
    ];
    rank_offers(&mut offers);
    let names: Vec<&str> = offers.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["C", "B", "A"]);
}
