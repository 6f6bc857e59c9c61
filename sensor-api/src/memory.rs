use crate::errors::Result;
use crate::model::{NewReading, Reading, TimeRange};
use crate::store::ReadingStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Inner {
    last_id: i64,
    readings: BTreeMap<i64, Reading>,
}

/// Process-local store, used by tests and by `STORAGE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn save(&self, reading: NewReading) -> Result<Reading> {
        let mut inner = self.inner.write().await;
        inner.last_id += 1;

        let now = Utc::now();
        let stored = Reading {
            id: inner.last_id,
            sensor_id: reading.sensor_id,
            value: reading.value,
            timestamp: reading.timestamp.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        inner.readings.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn save_all(&self, readings: Vec<NewReading>) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let total = readings.len();

        for reading in readings {
            inner.last_id += 1;
            let stored = Reading {
                id: inner.last_id,
                sensor_id: reading.sensor_id,
                value: reading.value,
                timestamp: reading.timestamp.unwrap_or(now),
                created_at: now,
                updated_at: now,
            };
            inner.readings.insert(stored.id, stored);
        }

        Ok(total)
    }

    async fn find_all(&self) -> Result<Vec<Reading>> {
        Ok(self.inner.read().await.readings.values().cloned().collect())
    }

    async fn find_by_sensor_id(&self, sensor_id: &str, range: TimeRange) -> Result<Vec<Reading>> {
        let inner = self.inner.read().await;
        let mut readings: Vec<Reading> = inner
            .readings
            .values()
            .filter(|r| r.sensor_id == sensor_id && range.contains(r.timestamp))
            .cloned()
            .collect();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(readings)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Reading>> {
        Ok(self.inner.read().await.readings.get(&id).cloned())
    }

    async fn exists_by_id(&self, id: i64) -> Result<bool> {
        Ok(self.inner.read().await.readings.contains_key(&id))
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        self.inner.write().await.readings.remove(&id);
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.inner.read().await.readings.len() as i64)
    }
}
