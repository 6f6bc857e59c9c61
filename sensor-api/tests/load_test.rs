//! Load tests against a running sensor API.
//!
//! Start the server first (`STORAGE_BACKEND=memory cargo run -p sensor-api`),
//! then run `cargo test -p sensor-api --test load_test -- --ignored`.

use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::env;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReading {
    sensor_id: String,
    value: f64,
    timestamp: chrono::DateTime<Utc>,
}

impl CreateReading {
    fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            sensor_id: rng.gen_range(1..=8).to_string(),
            value: rng.gen_range(20.0..100.0),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Login {
    token: String,
}

#[derive(Debug, Deserialize)]
struct Sensor {
    id: String,
    status: String,
}

fn api_url() -> String {
    env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

async fn login(client: &reqwest::Client) -> String {
    let login: Login = client
        .post(format!("{}/api/auth/login", api_url()))
        .json(&json!({ "email": "load-test@plant.local", "password": "load-test" }))
        .send()
        .await
        .expect("API reachable")
        .error_for_status()
        .expect("login accepted")
        .json()
        .await
        .expect("login response");
    login.token
}

#[tokio::test]
#[ignore]
async fn test_200_readings_per_second() {
    println!("\nStarting Load Test: 200 readings/s");

    let test_duration_secs = 10;
    let target_rate = 200;
    let total_readings = test_duration_secs * target_rate;

    let client = reqwest::Client::new();
    let token = login(&client).await;
    let url = format!("{}/api/readings", api_url());

    println!("  Target Rate:    {} readings/s", target_rate);
    println!("  Duration:       {} seconds", test_duration_secs);
    println!("  Total Readings: {}", total_readings);

    let start = Instant::now();
    let mut sent_count = 0;
    let mut error_count = 0;

    let burst_size = 20;
    let delay_per_burst = Duration::from_micros((burst_size * 1_000_000) / target_rate as u64);

    for batch_start in (0..total_readings).step_by(burst_size as usize) {
        let burst_end = std::cmp::min(batch_start + burst_size as usize, total_readings);
        let requests = (batch_start..burst_end).map(|_| {
            client
                .post(&url)
                .bearer_auth(&token)
                .json(&CreateReading::random())
                .send()
        });

        for result in join_all(requests).await {
            match result {
                Ok(response) if response.status() == reqwest::StatusCode::CREATED => {
                    sent_count += 1
                }
                Ok(response) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Unexpected status: {}", response.status());
                    }
                }
                Err(e) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Send error: {}", e);
                    }
                }
            }
        }

        tokio::time::sleep(delay_per_burst).await;
    }

    let duration = start.elapsed();
    let actual_rate = sent_count as f64 / duration.as_secs_f64();

    println!("\nResults:");
    println!("  Total Sent:     {}", sent_count);
    println!("  Errors:         {}", error_count);
    println!("  Duration:       {:.2}s", duration.as_secs_f64());
    println!("  Actual Rate:    {:.2} readings/s", actual_rate);

    assert!(
        actual_rate >= 180.0,
        "Throughput too low: {:.2} readings/s (expected >= 180)",
        actual_rate
    );
    assert!(error_count == 0, "Too many errors: {} (expected 0)", error_count);
}

#[tokio::test]
#[ignore]
async fn test_sensors_reflect_latest_readings() {
    let client = reqwest::Client::new();
    let token = login(&client).await;

    for sensor_id in ["1", "2", "3"] {
        let response = client
            .post(format!("{}/api/readings", api_url()))
            .bearer_auth(&token)
            .json(&json!({ "sensorId": sensor_id, "value": 95.0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    }

    let sensors: Vec<Sensor> = client
        .get(format!("{}/api/sensors", api_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    for sensor_id in ["1", "2", "3"] {
        let sensor = sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .expect("sensor listed");
        assert_eq!(sensor.status, "alert");
    }
}

#[tokio::test]
#[ignore]
async fn test_requests_without_token_are_rejected() {
    let response = reqwest::Client::new()
        .get(format!("{}/api/readings", api_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}
