mod reading;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use rand::Rng;
use reading::{CreateReading, LoginRequest, LoginResponse};
use std::time::Duration;
use tracing::{error, info, warn};

const SENSOR_IDS: [&str; 8] = ["1", "2", "3", "4", "5", "6", "7", "8"];
const BURST_SIZE: u64 = 20;

/// Posts random sensor readings to a running sensor API
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Base URL of the sensor API
    #[arg(long, env = "API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Readings per second
    #[arg(long, env = "RATE", default_value_t = 10)]
    rate: u64,

    /// Total readings to send, 0 to run until interrupted
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,

    #[arg(long, env = "SIM_EMAIL", default_value = "simulator@plant.local")]
    email: String,

    #[arg(long, env = "SIM_PASSWORD", default_value = "simulator")]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    anyhow::ensure!(args.rate > 0, "rate must be greater than zero");

    info!("Starting sensor simulator");
    info!(
        "API: {}, Rate: {} readings/s, Count: {}",
        args.api_url,
        args.rate,
        if args.count == 0 {
            "unbounded".to_string()
        } else {
            args.count.to_string()
        }
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let token = login(&client, &args).await?;
    info!("Authenticated as {}", args.email);

    let readings_url = format!("{}/api/readings", args.api_url.trim_end_matches('/'));
    let burst_size = BURST_SIZE.min(args.rate);
    let burst_interval = Duration::from_millis((burst_size * 1000) / args.rate);
    info!(
        "Posting in bursts of {} readings every {:?}",
        burst_size, burst_interval
    );

    let mut rng = rand::thread_rng();
    let mut sent = 0u64;
    let mut failed = 0u64;

    loop {
        let burst_start = std::time::Instant::now();

        for _ in 0..burst_size {
            if args.count > 0 && sent + failed >= args.count {
                info!("Done: {} readings sent, {} failed", sent, failed);
                return Ok(());
            }

            let reading = generate_reading(&mut rng);
            match client
                .post(&readings_url)
                .bearer_auth(&token)
                .json(&reading)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => sent += 1,
                Ok(response) => {
                    failed += 1;
                    warn!("API rejected reading: {}", response.status());
                }
                Err(e) => {
                    failed += 1;
                    error!("Failed to post reading: {}", e);
                }
            }
        }

        // Log progress periodically
        if sent > 0 && sent % 1000 < burst_size {
            info!("Posted {} readings", sent);
        }

        let elapsed = burst_start.elapsed();
        if elapsed < burst_interval {
            tokio::time::sleep(burst_interval - elapsed).await;
        } else if elapsed > burst_interval * 2 {
            warn!(
                "Burst took {:?}, target was {:?} - API may be overloaded",
                elapsed, burst_interval
            );
        }
    }
}

async fn login(client: &reqwest::Client, args: &Args) -> anyhow::Result<String> {
    let url = format!("{}/api/auth/login", args.api_url.trim_end_matches('/'));
    let response = client
        .post(&url)
        .json(&LoginRequest {
            email: &args.email,
            password: &args.password,
        })
        .send()
        .await
        .with_context(|| format!("failed to reach {}", url))?
        .error_for_status()
        .context("login rejected")?;

    let body: LoginResponse = response.json().await.context("invalid login response")?;
    Ok(body.token)
}

fn generate_reading(rng: &mut impl Rng) -> CreateReading {
    let sensor_id = SENSOR_IDS[rng.gen_range(0..SENSOR_IDS.len())];

    let value = if rng.gen_bool(0.05) {
        rng.gen_range(80.0..100.0) // 5% in the alert band
    } else if rng.gen_bool(0.15) {
        rng.gen_range(60.0..80.0) // some warnings
    } else {
        rng.gen_range(20.0..60.0) // Normal range
    };

    CreateReading {
        sensor_id: sensor_id.to_string(),
        value,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_readings_stay_in_api_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let reading = generate_reading(&mut rng);
            assert!(SENSOR_IDS.contains(&reading.sensor_id.as_str()));
            assert!((20.0..100.0).contains(&reading.value));
        }
    }

    #[test]
    fn test_reading_serializes_camel_case() {
        let json = serde_json::to_value(CreateReading {
            sensor_id: "3".to_string(),
            value: 1.0,
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(json["sensorId"], "3");
        assert!(json.get("timestamp").is_some());
    }
}
