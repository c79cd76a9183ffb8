// Copyright (C) 2022 Yehowshua Immanuel
// This program is distributed under both the GPLV3 license
// and the YEHOWSHUA license, both of which can be found at
// the root of the folder containing the sources for this program.
use super::types::Timescale;

/// Parameters mapping raw dump timestamps onto the display time base.
///
/// Fixed once the structure pass is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Declared `$timescale` magnitude, 1 when absent.
    pub scale: u32,
    pub unit: Timescale,
    /// Smallest positive gap between two consecutive timestamps.
    pub min_interval: Option<u64>,
    pub last_timestamp: u64,
    /// Largest power of 1000 dividing `min_interval`.
    pub time_divide: u64,
    /// Decimal places the declared unit moves by after dividing.
    pub time_scale_delta: u32,
    pub time_ratio: u64,
}

impl Default for TimeBase {
    fn default() -> Self {
        TimeBase {
            scale: 1,
            unit: Timescale::Unit,
            min_interval: None,
            last_timestamp: 0,
            time_divide: 1,
            time_scale_delta: 0,
            time_ratio: 1,
        }
    }
}

/// Strips factors of 1000 off `min_interval`, returning the divide and
/// the matching exponent shift.
pub fn collapse(min_interval: u64) -> (u64, u32) {
    let mut interval = min_interval;
    let mut time_divide = 1u64;
    let mut time_scale_delta = 0u32;
    while interval > 0 && interval % 1000 == 0 {
        interval /= 1000;
        time_divide *= 1000;
        time_scale_delta += 3;
    }
    (time_divide, time_scale_delta)
}

impl TimeBase {
    pub fn compute(
        timescale: (Option<u32>, Timescale),
        min_interval: Option<u64>,
        last_timestamp: u64,
        time_ratio: u64,
    ) -> TimeBase {
        let (scale, unit) = timescale;
        let (time_divide, time_scale_delta) = min_interval.map_or((1, 0), collapse);
        TimeBase {
            scale: scale.unwrap_or(1),
            unit,
            min_interval,
            last_timestamp,
            time_divide,
            time_scale_delta,
            time_ratio: time_ratio.max(1),
        }
    }

    pub fn normalize(&self, timestamp: u64) -> u64 {
        (timestamp / self.time_divide).saturating_mul(self.time_ratio)
    }

    /// Upper bound of any normalized timestamp in this session, plus one
    /// ratio step.
    pub fn signal_length(&self) -> u64 {
        self.normalize(self.last_timestamp)
            .saturating_add(self.time_ratio)
    }

    /// The declared timescale moved up by `time_scale_delta`, as a
    /// magnitude and the coarsest unit that keeps it whole. Scales past one
    /// second stay in seconds with a larger magnitude.
    pub fn display_scale(&self) -> (u64, Timescale) {
        let scale = self.scale as u64;
        let Some(exponent) = self.unit.exponent() else {
            return (scale.saturating_mul(10u64.pow(self.time_scale_delta)), self.unit);
        };

        let shifted = exponent + self.time_scale_delta as i32;
        let unit_exponent = shifted.min(0);
        let unit = Timescale::from_exponent(unit_exponent).unwrap_or(self.unit);
        let magnitude = scale.saturating_mul(10u64.pow((shifted - unit_exponent) as u32));
        (magnitude, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn million_collapses_by_two_steps() {
        assert_eq!(collapse(1_000_000), (1_000_000, 6));
    }

    #[test]
    fn non_multiples_stay_put() {
        assert_eq!(collapse(5), (1, 0));
        assert_eq!(collapse(1500), (1, 0));
        assert_eq!(collapse(0), (1, 0));
        assert_eq!(collapse(2_000), (1_000, 3));
    }

    #[test]
    fn femtoseconds_become_nanoseconds() {
        let base = TimeBase::compute((Some(1), Timescale::Fs), Some(1_000_000), 7_000_000, 1);
        assert_eq!(base.time_divide, 1_000_000);
        assert_eq!(base.time_scale_delta, 6);
        assert_eq!(base.display_scale(), (1, Timescale::Ns));
        assert_eq!(base.normalize(3_000_000), 3);
        assert_eq!(base.signal_length(), 8);
    }

    #[test]
    fn ratio_scales_times() {
        let base = TimeBase::compute((Some(10), Timescale::Ns), Some(5), 20, 4);
        assert_eq!(base.normalize(10), 40);
        assert_eq!(base.signal_length(), 84);
        assert_eq!(base.display_scale(), (10, Timescale::Ns));
    }

    #[test]
    fn no_intervals_leave_time_alone() {
        let base = TimeBase::compute((None, Timescale::Unit), None, 0, 0);
        assert_eq!(base.time_divide, 1);
        assert_eq!(base.time_ratio, 1);
        assert_eq!(base.signal_length(), 1);
    }

    #[test]
    fn shifting_past_seconds() {
        let base = TimeBase::compute((Some(100), Timescale::Ms), Some(1_000_000), 0, 1);
        assert_eq!(base.display_scale(), (100_000, Timescale::S));
    }
}
