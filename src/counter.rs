// Counter-delta engine: turns two time-ordered octet counter readings into
// a bandwidth rate.
//
// Units are decimal megabits per second: bytes * 8 / 1_000_000 / window_secs.
// A counter that goes backwards (32/64-bit wrap, agent restart, counter
// reset) never yields a rate; the reading becomes the new baseline instead.

use crate::error::InvalidSample;
use crate::models::{CounterSample, RateSample};

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Converts an octet delta over `window_secs` into Mbps.
pub fn bytes_to_mbps(delta_bytes: u64, window_secs: f64) -> f64 {
    (delta_bytes as f64 * BITS_PER_BYTE) / (window_secs * BITS_PER_MEGABIT)
}

/// Rate between two readings of the same target.
///
/// Returns [`InvalidSample::CounterReset`] when either counter decreased,
/// [`InvalidSample::EmptyWindow`] when `window_secs` is not positive, and
/// [`InvalidSample::Anomalous`] if the arithmetic produces a non-finite or
/// negative value.
pub fn compute_rate(
    prev: &CounterSample,
    curr: &CounterSample,
    window_secs: f64,
) -> Result<RateSample, InvalidSample> {
    let (Some(diff_in), Some(diff_out)) = (
        curr.in_bytes.checked_sub(prev.in_bytes),
        curr.out_bytes.checked_sub(prev.out_bytes),
    ) else {
        return Err(InvalidSample::CounterReset);
    };
    if !window_secs.is_finite() || window_secs <= 0.0 {
        return Err(InvalidSample::EmptyWindow);
    }

    let in_mbps = bytes_to_mbps(diff_in, window_secs);
    let out_mbps = bytes_to_mbps(diff_out, window_secs);
    if !valid_rate(in_mbps) || !valid_rate(out_mbps) {
        return Err(InvalidSample::Anomalous);
    }

    Ok(RateSample {
        target: curr.target.clone(),
        in_mbps,
        out_mbps,
        taken_at: curr.taken_at,
    })
}

fn valid_rate(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Per-target baseline. Every observed reading replaces the baseline,
/// whether or not it produced a rate.
#[derive(Debug, Default, Clone)]
pub struct CounterDelta {
    baseline: Option<CounterSample>,
}

impl CounterDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next reading. The first reading only records the baseline.
    pub fn observe(&mut self, curr: CounterSample) -> Result<RateSample, InvalidSample> {
        let Some(prev) = self.baseline.replace(curr.clone()) else {
            return Err(InvalidSample::Bootstrap);
        };
        let window_secs = (curr.taken_at - prev.taken_at).num_milliseconds() as f64 / 1000.0;
        compute_rate(&prev, &curr, window_secs)
    }

    pub fn baseline(&self) -> Option<&CounterSample> {
        self.baseline.as_ref()
    }

    /// Forget the baseline; the next reading bootstraps again.
    pub fn reset(&mut self) {
        self.baseline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetId;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const EPS: f64 = 1e-12;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn sample(in_bytes: u64, out_bytes: u64, secs: i64) -> CounterSample {
        CounterSample {
            target: TargetId::new("eth0").unwrap(),
            in_bytes,
            out_bytes,
            taken_at: t0() + Duration::seconds(secs),
        }
    }

    #[test]
    fn rate_matches_formula_for_monotonic_counters() {
        let cases = [(0u64, 0u64, 1.0), (1_000, 126_000, 1.0), (5, 1_000_005, 2.5), (0, u64::MAX / 2, 60.0)];
        for (prev_in, curr_in, window) in cases {
            let prev = sample(prev_in, prev_in, 0);
            let curr = sample(curr_in, curr_in, 1);
            let r = compute_rate(&prev, &curr, window).unwrap();
            let expected = (curr_in - prev_in) as f64 * 8.0 / (window * 1e6);
            assert!((r.in_mbps - expected).abs() <= EPS * expected.max(1.0));
            assert!((r.out_mbps - expected).abs() <= EPS * expected.max(1.0));
            assert!(r.in_mbps >= 0.0 && r.out_mbps >= 0.0);
        }
    }

    #[test]
    fn decreasing_counter_is_counter_reset() {
        let prev = sample(2_000, 3_000, 0);
        let curr = sample(1_500, 3_100, 1);
        assert_eq!(compute_rate(&prev, &curr, 1.0), Err(InvalidSample::CounterReset));

        let curr_out_only = sample(2_100, 2_900, 1);
        assert_eq!(
            compute_rate(&prev, &curr_out_only, 1.0),
            Err(InvalidSample::CounterReset)
        );
    }

    #[test]
    fn non_positive_window_is_rejected() {
        let prev = sample(0, 0, 0);
        let curr = sample(10, 10, 0);
        assert_eq!(compute_rate(&prev, &curr, 0.0), Err(InvalidSample::EmptyWindow));
        assert_eq!(compute_rate(&prev, &curr, -1.0), Err(InvalidSample::EmptyWindow));
        assert_eq!(compute_rate(&prev, &curr, f64::NAN), Err(InvalidSample::EmptyWindow));
    }

    #[test]
    fn first_observation_bootstraps() {
        let mut delta = CounterDelta::new();
        assert_eq!(delta.observe(sample(1_000, 1_000, 0)), Err(InvalidSample::Bootstrap));
        assert_eq!(delta.baseline().map(|b| b.in_bytes), Some(1_000));
    }

    #[test]
    fn reset_rebaselines_from_new_reading() {
        let mut delta = CounterDelta::new();
        let _ = delta.observe(sample(10_000, 10_000, 0));
        assert_eq!(
            delta.observe(sample(100, 100, 1)),
            Err(InvalidSample::CounterReset)
        );
        let r = delta.observe(sample(125_100, 250_100, 2)).unwrap();
        assert!((r.in_mbps - 1.0).abs() < EPS);
        assert!((r.out_mbps - 2.0).abs() < EPS);
    }

    #[test]
    fn eth0_sequence() {
        let mut delta = CounterDelta::new();
        assert_eq!(delta.observe(sample(1_000, 1_000, 0)), Err(InvalidSample::Bootstrap));

        let r = delta.observe(sample(2_000, 3_000, 1)).unwrap();
        assert!((r.in_mbps - 0.008).abs() < EPS);
        assert!((r.out_mbps - 0.016).abs() < EPS);

        assert_eq!(
            delta.observe(sample(1_500, 3_100, 2)),
            Err(InvalidSample::CounterReset)
        );
        let base = delta.baseline().unwrap();
        assert_eq!((base.in_bytes, base.out_bytes), (1_500, 3_100));
    }

    #[test]
    fn window_comes_from_timestamps() {
        let mut delta = CounterDelta::new();
        let _ = delta.observe(sample(0, 0, 0));
        let r = delta.observe(sample(250_000, 0, 2)).unwrap();
        assert!((r.in_mbps - 1.0).abs() < EPS);
        assert_eq!(r.out_mbps, 0.0);
    }

    #[test]
    fn explicit_reset_forgets_baseline() {
        let mut delta = CounterDelta::new();
        let _ = delta.observe(sample(0, 0, 0));
        delta.reset();
        assert!(delta.baseline().is_none());
        assert_eq!(delta.observe(sample(5, 5, 1)), Err(InvalidSample::Bootstrap));
    }
}
