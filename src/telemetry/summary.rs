use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use super::TelemetrySample;

const FULL_THROTTLE_PCT: f64 = 99.;

/// Headline numbers of a lap. Missing (NaN) values are left out of every
/// statistic.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LapSummary {
    pub samples: usize,
    pub lap_distance_m: f64,
    pub top_speed_kph: f64,
    pub mean_speed_kph: f64,
    /// Share of samples at full throttle, 0-100
    pub full_throttle_pct: f64,
    /// Share of samples with the brake applied, 0-100
    pub braking_pct: f64,
}

impl LapSummary {
    pub fn from_samples(samples: &[TelemetrySample]) -> Self {
        let lap_distance_m = match samples
            .iter()
            .map(|s| s.distance)
            .filter(|d| d.is_finite())
            .minmax_by(f64::total_cmp)
        {
            MinMaxResult::MinMax(min, max) => max - min,
            MinMaxResult::OneElement(_) | MinMaxResult::NoElements => 0.,
        };

        let speeds = samples
            .iter()
            .map(|s| s.speed)
            .filter(|s| s.is_finite())
            .collect_vec();
        let top_speed_kph = speeds.iter().copied().fold(0., f64::max);
        let mean_speed_kph = if speeds.is_empty() {
            0.
        } else {
            speeds.iter().sum::<f64>() / speeds.len() as f64
        };

        Self {
            samples: samples.len(),
            lap_distance_m,
            top_speed_kph,
            mean_speed_kph,
            full_throttle_pct: share(samples, |s| s.throttle, |t| t >= FULL_THROTTLE_PCT),
            braking_pct: share(samples, |s| s.brake, |b| b > 0.),
        }
    }
}

fn share(
    samples: &[TelemetrySample],
    channel: impl Fn(&TelemetrySample) -> f64,
    predicate: impl Fn(f64) -> bool,
) -> f64 {
    let (hits, total) = samples
        .iter()
        .map(channel)
        .filter(|v| v.is_finite())
        .fold((0usize, 0usize), |(hits, total), v| {
            (hits + usize::from(predicate(v)), total + 1)
        });
    if total == 0 {
        0.
    } else {
        hits as f64 * 100. / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(distance: f64, speed: f64, throttle: f64, brake: f64) -> TelemetrySample {
        TelemetrySample {
            distance,
            speed,
            throttle,
            brake,
            ..Default::default()
        }
    }

    #[test]
    fn test_summary_of_simple_lap() {
        let samples = vec![
            sample(0., 100., 100., 0.),
            sample(100., 300., 100., 0.),
            sample(200., 80., 0., 1.),
            sample(300., 120., 50., 0.),
        ];
        let summary = LapSummary::from_samples(&samples);
        assert_eq!(summary.samples, 4);
        assert_eq!(summary.lap_distance_m, 300.);
        assert_eq!(summary.top_speed_kph, 300.);
        assert_eq!(summary.mean_speed_kph, 150.);
        assert_eq!(summary.full_throttle_pct, 50.);
        assert_eq!(summary.braking_pct, 25.);
    }

    #[test]
    fn test_missing_values_are_ignored() {
        let samples = vec![
            sample(f64::NAN, f64::NAN, f64::NAN, f64::NAN),
            sample(10., 200., 100., 0.),
        ];
        let summary = LapSummary::from_samples(&samples);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.lap_distance_m, 0.);
        assert_eq!(summary.mean_speed_kph, 200.);
        assert_eq!(summary.full_throttle_pct, 100.);
        assert_eq!(summary.braking_pct, 0.);
    }

    #[test]
    fn test_empty_lap() {
        assert_eq!(
            LapSummary::from_samples(&[]),
            LapSummary {
                samples: 0,
                ..Default::default()
            }
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_shares_are_percentages(
            channels in prop::collection::vec((0f64..400., 0f64..105., 0f64..=1.), 0..200),
        ) {
            let samples = channels
                .iter()
                .enumerate()
                .map(|(i, (speed, throttle, brake))| sample(i as f64, *speed, *throttle, *brake))
                .collect_vec();
            let summary = LapSummary::from_samples(&samples);

            prop_assert!((0. ..=100.).contains(&summary.full_throttle_pct));
            prop_assert!((0. ..=100.).contains(&summary.braking_pct));
            prop_assert!(summary.mean_speed_kph <= summary.top_speed_kph + 1e-9);
        }
    }
}
