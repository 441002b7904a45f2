//! Hourly operation volumes drawn from per-bucket normal distributions.

use crate::{
    config::{RateParams, RateTable},
    error::SimResult,
    rng::SimRng,
    types::{Bucket, DayType, HourType},
};

/// Counts drawn for one simulated hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HourlyCounts {
    pub creations: u64,
    pub updates:   u64,
    pub deletions: u64,
}

pub struct RateModel {
    table: RateTable,
}

impl RateModel {
    pub fn new(table: RateTable) -> Self {
        Self { table }
    }

    /// Draw (creations, updates, deletions) for one hour in the given bucket.
    /// Each count is `max(0, round(sample))`; there is no upper cap.
    pub fn sample(
        &self,
        day_type: DayType,
        hour_type: HourType,
        rng: &mut SimRng,
    ) -> SimResult<HourlyCounts> {
        let rates = self.table.for_bucket(Bucket::new(day_type, hour_type));
        Ok(HourlyCounts {
            creations: draw_count(rates.creations, rng)?,
            updates:   draw_count(rates.updates, rng)?,
            deletions: draw_count(rates.deletions, rng)?,
        })
    }
}

fn draw_count(params: RateParams, rng: &mut SimRng) -> SimResult<u64> {
    let raw = rng.normal(params.mean, params.stddev)?;
    Ok(raw.round().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperationRates;
    use crate::rng::{RngBank, StreamSlot};

    #[test]
    fn zero_stddev_returns_rounded_mean() {
        let fixed = OperationRates {
            creations: RateParams::new(4.6, 0.0),
            updates:   RateParams::new(2.0, 0.0),
            deletions: RateParams::new(-3.0, 0.0),
        };
        let model = RateModel::new(RateTable {
            weekday_active:   fixed,
            weekday_inactive: fixed,
            weekend_active:   fixed,
            weekend_inactive: fixed,
        });
        let mut rng = RngBank::new(1).for_stream(StreamSlot::Rates);
        let counts = model.sample(DayType::Weekday, HourType::Active, &mut rng).unwrap();
        assert_eq!(counts, HourlyCounts { creations: 5, updates: 2, deletions: 0 });
    }
}
