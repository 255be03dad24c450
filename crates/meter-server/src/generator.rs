//! Deterministic synthetic measurement generation
//!
//! Every dataset is produced from an explicitly constructed, seeded random
//! source that lives only for one generation call. Two calls with the same
//! count therefore yield identical records in identical order, and nothing
//! else in the process can perturb the stream.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use meter_common::types::Measurement;
use rand::{rngs::StdRng, Rng, SeedableRng};
use uuid::Uuid;

/// Seed used by [`generate`]
pub const GENERATION_SEED: u64 = 42;

/// Number of devices in the default group-key pool (`device_1`..`device_5`)
pub const DEVICE_POOL_SIZE: u32 = 5;

/// Timestamps fall within this many minutes after the epoch
pub const MAX_OFFSET_MINUTES: i64 = 24 * 60;

/// Fixed generation epoch, 2025-06-18T00:00:00
pub fn generation_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 18)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Stable identifier for the record at generation index `index`
pub fn measurement_id(index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, format!("measurement-{index}").as_bytes()).to_string()
}

/// Produces one dataset from the random source it owns
pub struct MeasurementGenerator<R> {
    rng: R,
}

impl MeasurementGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> MeasurementGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generate `count` records, newest first
    ///
    /// With `device_id` set every record carries that group key. The pool
    /// draw is still consumed so the remaining attributes match the
    /// unfiltered dataset.
    pub fn generate(mut self, count: usize, device_id: Option<&str>) -> Vec<Measurement> {
        let epoch = generation_epoch();
        let mut measurements: Vec<Measurement> = (0..count)
            .map(|index| self.next_measurement(index, epoch, device_id))
            .collect();

        measurements.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });

        measurements
    }

    fn next_measurement(
        &mut self,
        index: usize,
        epoch: NaiveDateTime,
        device_id: Option<&str>,
    ) -> Measurement {
        let pool_index = self.rng.gen_range(1..=DEVICE_POOL_SIZE);
        let offset = self.rng.gen_range(0..=MAX_OFFSET_MINUTES);

        Measurement {
            id: measurement_id(index),
            device_id: device_id
                .map(str::to_string)
                .unwrap_or_else(|| format!("device_{pool_index}")),
            timestamp: epoch + Duration::minutes(offset),
            temperature: round2(self.rng.gen_range(15.0..=35.0)),
            humidity: round2(self.rng.gen_range(30.0..=90.0)),
            pressure: round2(self.rng.gen_range(980.0..=1050.0)),
            battery_level: round2(self.rng.gen_range(10.0..=100.0)),
        }
    }
}

/// Generate a dataset with the fixed [`GENERATION_SEED`]
pub fn generate(count: usize, device_id: Option<&str>) -> Vec<Measurement> {
    MeasurementGenerator::seeded(GENERATION_SEED).generate(count, device_id)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
