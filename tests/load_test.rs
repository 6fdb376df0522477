//! Concurrent load against a single server instance.

use std::time::{Duration, Instant};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rounds_are_all_counted() {
    let app = common::spawn_app().await;

    let concurrency = 20;
    let requests_per_task = 30;
    let total_requests = concurrency * requests_per_task;
    let choices = ["rock", "paper", "scissors"];

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = app.url("/play");
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let choice = choices[(task * requests_per_task + i) % choices.len()];
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .body(format!(r#"{{"Form":"{choice}"}}"#))
                    .send()
                    .await
                    .unwrap();
                assert!(res.status().is_success());
                latencies.push(req_start.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    // Opponent plays paper: rock loses, paper draws, scissors wins.
    let snap = app.tally.snapshot();
    assert_eq!(snap.total(), total_requests as u64);
    assert_eq!(snap.losses, (total_requests / 3) as u64);
    assert_eq!(snap.draws, (total_requests / 3) as u64);
    assert_eq!(snap.wins, (total_requests / 3) as u64);
    assert_eq!(app.spans().len(), total_requests);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    app.stop().await;
}
