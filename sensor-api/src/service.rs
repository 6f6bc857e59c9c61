use crate::errors::{Error, Result};
use crate::metrics::{READINGS_CREATED_TOTAL, READINGS_DELETED_TOTAL};
use crate::model::{NewReading, Reading, SensorSummary, TimeRange};
use crate::sensor::{classify, describe, is_valid_sensor_id, SENSOR_IDS};
use crate::store::ReadingStore;
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SAMPLE_VALUE_MIN: f64 = 20.0;
const SAMPLE_VALUE_MAX: f64 = 100.0;
const SAMPLE_WINDOW_SECS: i64 = 24 * 60 * 60;
const SEED_READINGS_PER_SENSOR: i64 = 10;

/// Read/write operations over readings plus the per-sensor status rollup
#[derive(Clone)]
pub struct ReadingService {
    store: Arc<dyn ReadingStore>,
}

impl ReadingService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> Result<Vec<Reading>> {
        debug!("Fetching all readings");
        self.store.find_all().await
    }

    pub async fn list_by_sensor(&self, sensor_id: &str) -> Result<Vec<Reading>> {
        self.list_by_sensor_between(sensor_id, TimeRange::default())
            .await
    }

    pub async fn list_by_sensor_between(
        &self,
        sensor_id: &str,
        range: TimeRange,
    ) -> Result<Vec<Reading>> {
        debug!("Fetching readings for sensor {} in {:?}", sensor_id, range);
        let readings = self.store.find_by_sensor_id(sensor_id, range).await?;
        if readings.is_empty() {
            warn!("No readings found for sensor {}", sensor_id);
        }
        Ok(readings)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Reading> {
        debug!("Fetching reading {}", id);
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::reading_not_found(id))
    }

    pub async fn create(&self, mut reading: NewReading) -> Result<Reading> {
        debug!("Creating reading for sensor {}", reading.sensor_id);
        if !is_valid_sensor_id(&reading.sensor_id) {
            warn!("Storing reading for unknown sensor {}", reading.sensor_id);
        }
        if reading.timestamp.is_none() {
            reading.timestamp = Some(Utc::now());
        }

        let saved = self.store.save(reading).await?;
        READINGS_CREATED_TOTAL.inc();
        info!("Reading {} created for sensor {}", saved.id, saved.sensor_id);
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        debug!("Deleting reading {}", id);
        if !self.store.exists_by_id(id).await? {
            return Err(Error::reading_not_found(id));
        }

        self.store.delete_by_id(id).await?;
        READINGS_DELETED_TOTAL.inc();
        info!("Reading {} deleted", id);
        Ok(())
    }

    /// Stores `count` random readings spread over the last 24 hours.
    pub async fn generate_samples(&self, count: u32) -> Result<String> {
        info!("Generating {} test readings", count);

        let now = Utc::now();
        // ThreadRng is not Send, so draw everything before the first await.
        let samples: Vec<NewReading> = {
            let mut rng = rand::thread_rng();
            (0..count)
                .map(|_| {
                    let offset = Duration::seconds(rng.gen_range(0..SAMPLE_WINDOW_SECS));
                    random_reading(&mut rng, now - offset)
                })
                .collect()
        };

        let generated = self.store.save_all(samples).await?;
        READINGS_CREATED_TOTAL.inc_by(generated as f64);

        info!("{} test readings generated", generated);
        Ok(format!("Generated {} new test records", generated))
    }

    /// Latest reading of every sensor that has at least one, ordered by sensor id.
    ///
    /// When several readings share the newest timestamp, the one with the
    /// highest id wins.
    pub async fn list_sensors(&self) -> Result<Vec<SensorSummary>> {
        debug!("Building sensor summaries");
        let readings = self.store.find_all().await?;
        Ok(summarize(readings))
    }

    /// Fills an empty store with ten readings per sensor over the last day.
    /// Returns the number of readings inserted.
    pub async fn seed_if_empty(&self) -> Result<usize> {
        let existing = self.store.count().await?;
        if existing > 0 {
            info!(
                "Store already holds {} readings, skipping sample data",
                existing
            );
            return Ok(0);
        }

        info!("Seeding store with sample readings");
        let now = Utc::now();
        let samples: Vec<NewReading> = {
            let mut rng = rand::thread_rng();
            SENSOR_IDS
                .iter()
                .flat_map(|sensor_id| {
                    (0..SEED_READINGS_PER_SENSOR).map(move |i| (*sensor_id, i))
                })
                .map(|(sensor_id, i)| NewReading {
                    sensor_id: sensor_id.to_string(),
                    value: rng.gen_range(SAMPLE_VALUE_MIN..SAMPLE_VALUE_MAX),
                    timestamp: Some(now - Duration::hours(24 - i * 2)),
                })
                .collect()
        };

        let total = self.store.save_all(samples).await?;
        READINGS_CREATED_TOTAL.inc_by(total as f64);

        info!("Sample data created: {} readings", total);
        Ok(total)
    }
}

fn random_reading(rng: &mut impl Rng, timestamp: DateTime<Utc>) -> NewReading {
    let sensor_id = SENSOR_IDS.choose(rng).copied().unwrap_or("1");
    NewReading {
        sensor_id: sensor_id.to_string(),
        value: rng.gen_range(SAMPLE_VALUE_MIN..SAMPLE_VALUE_MAX),
        timestamp: Some(timestamp),
    }
}

fn summarize(readings: Vec<Reading>) -> Vec<SensorSummary> {
    let mut latest: BTreeMap<String, Reading> = BTreeMap::new();
    for reading in readings {
        let newer = latest.get(&reading.sensor_id).map_or(true, |current| {
            (reading.timestamp, reading.id) > (current.timestamp, current.id)
        });
        if newer {
            latest.insert(reading.sensor_id.clone(), reading);
        }
    }

    latest
        .into_values()
        .map(|reading| {
            let descriptor = describe(&reading.sensor_id);
            SensorSummary {
                status: classify(Some(reading.value)),
                value: reading.value,
                name: descriptor.name,
                kind: descriptor.kind,
                unit: descriptor.unit.to_string(),
                id: reading.sensor_id,
            }
        })
        .collect()
}
