use crate::errors::Result;
use crate::model::{NewReading, Reading, TimeRange};
use async_trait::async_trait;

/// Persistence seam for readings.
///
/// Implementations own their concurrency control; callers never lock.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Inserts a reading, assigning its id and stamping `created_at`/`updated_at`.
    async fn save(&self, reading: NewReading) -> Result<Reading>;

    /// Inserts every reading in one atomic step: either all are stored or none.
    /// Returns the number of rows written.
    async fn save_all(&self, readings: Vec<NewReading>) -> Result<usize>;

    async fn find_all(&self) -> Result<Vec<Reading>>;

    /// Readings of one sensor within `range`, newest observation first.
    async fn find_by_sensor_id(&self, sensor_id: &str, range: TimeRange) -> Result<Vec<Reading>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Reading>>;

    async fn exists_by_id(&self, id: i64) -> Result<bool>;

    async fn delete_by_id(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}
