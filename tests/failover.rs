//! End-to-end relay behaviour against mock relay servers.

use std::time::Duration;

use relay_failover::config::SettingsPatch;
use relay_failover::relay::{RelayError, RelayStats, RequestOptions};

mod common;

const TARGET: &str = "https://hdrezka.tv/x";

#[tokio::test]
async fn test_failover_to_next_relay() {
    let p1 = common::start_fixed_server(502, "bad gateway").await;
    let p2 = common::start_fixed_server(200, "from p2").await;
    let engine = common::engine(&common::relay_config(vec![
        common::generic(&p1, 1),
        common::url_replace(&p2, 2),
    ]));

    let response = engine.execute(TARGET, RequestOptions::get()).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, "from p2");
    assert_eq!(p1.hits(), vec!["/?url=https%3A%2F%2Fhdrezka.tv%2Fx"]);
    assert_eq!(p2.hits(), vec!["/https://hdrezka.tv/x"]);
    assert_eq!(engine.current_balancer().unwrap().endpoint, p2.endpoint());
}

#[tokio::test]
async fn test_attempts_capped_by_retry_count() {
    let mut relays = Vec::new();
    for _ in 0..5 {
        relays.push(common::start_fixed_server(503, "down").await);
    }
    let balancers = relays
        .iter()
        .enumerate()
        .map(|(i, r)| common::generic(r, i as i32))
        .collect();
    let engine = common::engine(&common::relay_config(balancers));

    let err = engine.execute(TARGET, RequestOptions::get()).await.unwrap_err();

    assert!(matches!(err, RelayError::AllBalancersFailed { attempts: 3, .. }));
    let total: usize = relays.iter().map(|r| r.hit_count()).sum();
    assert_eq!(total, 3);
    assert_eq!(relays[3].hit_count() + relays[4].hit_count(), 0);
}

#[tokio::test]
async fn test_slow_relay_times_out_and_rotates() {
    let slow = common::start_slow_server(Duration::from_secs(2), "late").await;
    let fast = common::start_fixed_server(200, "fast").await;
    let engine = common::engine(&common::relay_config(vec![
        common::generic(&slow, 1),
        common::generic(&fast, 2),
    ]));
    engine.update_settings(&SettingsPatch {
        timeout_ms: Some(200),
        ..SettingsPatch::default()
    });

    let response = engine.execute(TARGET, RequestOptions::get()).await.unwrap();
    assert_eq!(response.body, "fast");
    assert_eq!(slow.hit_count(), 1);
}

#[tokio::test]
async fn test_concurrent_identical_requests_deduplicated() {
    let relay = common::start_slow_server(Duration::from_millis(300), "shared").await;
    let engine = common::engine(&common::relay_config(vec![common::generic(&relay, 1)]));

    let (a, b, c) = tokio::join!(
        engine.execute(TARGET, RequestOptions::get()),
        engine.execute(TARGET, RequestOptions::get()),
        engine.execute(TARGET, RequestOptions::get()),
    );

    assert_eq!(a.unwrap().body, "shared");
    assert_eq!(b.unwrap().body, "shared");
    assert_eq!(c.unwrap().body, "shared");
    assert_eq!(relay.hit_count(), 1);
    assert_eq!(engine.stats().requests, 1);

    // Settled requests are not reused.
    engine.execute(TARGET, RequestOptions::get()).await.unwrap();
    assert_eq!(relay.hit_count(), 2);
}

#[tokio::test]
async fn test_concurrent_identical_requests_share_failure() {
    let relay = common::start_programmable_server(|_| async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        (500, "broken".to_string())
    })
    .await;
    let engine = common::engine(&common::relay_config(vec![common::generic(&relay, 1)]));

    let (a, b) = tokio::join!(
        engine.execute(TARGET, RequestOptions::get()),
        engine.execute(TARGET, RequestOptions::get()),
    );

    let a = a.unwrap_err();
    let b = b.unwrap_err();
    assert_eq!(a, b);
    assert!(matches!(a, RelayError::AllBalancersFailed { attempts: 1, .. }));
    assert_eq!(
        a.root_cause(),
        &RelayError::NonSuccessStatus(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
    );
    assert_eq!(relay.hit_count(), 1);
    assert_eq!(engine.stats().errors, 1);
}

#[tokio::test]
async fn test_counters_after_success_and_exhaustion() {
    let relay = common::start_programmable_server(|target| async move {
        if target.contains("good") {
            (200, "ok".to_string())
        } else {
            (500, "nope".to_string())
        }
    })
    .await;
    let engine = common::engine(&common::relay_config(vec![common::generic(&relay, 1)]));

    engine
        .execute("https://hdrezka.tv/good", RequestOptions::get())
        .await
        .unwrap();
    engine
        .execute("https://hdrezka.tv/bad", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(
        engine.stats(),
        RelayStats {
            requests: 2,
            successes: 1,
            errors: 1,
        }
    );

    engine.reset_stats();
    assert_eq!(engine.stats(), RelayStats::default());
}

#[tokio::test]
async fn test_boundary_falls_back_to_direct_request() {
    let relay = common::start_fixed_server(502, "relay down").await;
    let origin = common::start_fixed_server(200, "from origin").await;

    let mut config = common::relay_config(vec![common::generic(&relay, 1)]);
    config.blocked_domains = vec!["127.0.0.1".to_string()];
    let engine = common::engine(&config);

    let target = format!("{}video", origin.endpoint());
    assert!(engine.is_blocked(&target));

    let response = engine
        .boundary()
        .fetch(&target, RequestOptions::get())
        .await
        .unwrap();

    assert_eq!(response.body, "from origin");
    assert_eq!(relay.hit_count(), 1);
    assert_eq!(origin.hits(), vec!["/video"]);
    assert_eq!(engine.stats().errors, 1);
}

#[tokio::test]
async fn test_uninstalled_boundary_never_relays() {
    let relay = common::start_fixed_server(200, "relayed").await;
    let origin = common::start_fixed_server(200, "direct").await;

    let mut config = common::relay_config(vec![common::generic(&relay, 1)]);
    config.blocked_domains = vec!["127.0.0.1".to_string()];
    let engine = common::engine(&config);
    let target = format!("{}x", origin.endpoint());

    let relayed = engine.boundary().fetch(&target, RequestOptions::get()).await.unwrap();
    assert_eq!(relayed.body, "relayed");

    engine.uninstall();
    engine.uninstall();
    let direct = engine.boundary().fetch(&target, RequestOptions::get()).await.unwrap();
    assert_eq!(direct.body, "direct");

    engine.install();
    engine.install();
    let relayed = engine.boundary().fetch(&target, RequestOptions::get()).await.unwrap();
    assert_eq!(relayed.body, "relayed");
    assert_eq!(relay.hit_count(), 2);
    assert_eq!(origin.hit_count(), 1);
}

#[tokio::test]
async fn test_probe_reports_each_relay() {
    let up = common::start_fixed_server(200, "").await;
    let down = common::start_fixed_server(503, "").await;
    let engine = common::engine(&common::relay_config(vec![
        common::generic(&up, 1),
        common::url_replace(&down, 2),
    ]));

    let balancers = engine.balancers();
    let report = engine
        .test_balancer(&balancers[0], Some("https://hdrezka.tv/probe"))
        .await;
    assert!(report.ok);
    assert_eq!(report.status, Some(200));

    let report = engine
        .test_balancer(&balancers[1], Some("https://hdrezka.tv/probe"))
        .await;
    assert!(!report.ok);
    assert_eq!(report.status, Some(503));
    assert_eq!(down.hits(), vec!["/https://hdrezka.tv/probe"]);

    // Probes never count as relayed requests.
    assert_eq!(engine.stats(), RelayStats::default());
}
