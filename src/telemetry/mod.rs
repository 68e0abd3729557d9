pub mod summary;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{LaptraceError, cascade::Selection};

pub use summary::LapSummary;

/// One telemetry record of a lap.
///
/// The server fills gaps with `null` and sends `Brake` as a boolean, so every
/// channel is decoded leniently: `null` becomes NaN, booleans become 0/1.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Meters traveled from the start of the lap
    #[serde(rename = "Distance", default = "missing", deserialize_with = "lenient_f64")]
    pub distance: f64,
    /// Speed in km/h
    #[serde(rename = "Speed", default = "missing", deserialize_with = "lenient_f64")]
    pub speed: f64,
    /// Throttle use. 0=off throttle to 100=full throttle
    #[serde(rename = "Throttle", default = "missing", deserialize_with = "lenient_f64")]
    pub throttle: f64,
    /// Brake use. 0=released, 1=applied
    #[serde(rename = "Brake", default = "missing", deserialize_with = "lenient_f64")]
    pub brake: f64,
    /// Car position on the track map
    #[serde(rename = "X", default = "missing", deserialize_with = "lenient_f64")]
    pub x: f64,
    #[serde(rename = "Y", default = "missing", deserialize_with = "lenient_f64")]
    pub y: f64,

    #[serde(
        rename = "RPM",
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub rpm: Option<f64>,
    #[serde(
        rename = "nGear",
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub gear: Option<f64>,
    #[serde(
        rename = "DRS",
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub drs: Option<f64>,
    /// Seconds since the start of the lap
    #[serde(
        rename = "Time",
        default,
        deserialize_with = "lenient_opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_s: Option<f64>,
}

/// Fetches the telemetry of a fully selected lap.
#[async_trait]
pub trait TelemetryFetcher: Send + Sync {
    async fn fetch_telemetry(
        &self,
        selection: &Selection,
    ) -> Result<Vec<TelemetrySample>, LaptraceError>;
}

/// `[x, y]` plot points for two channels, skipping samples where either one
/// is missing.
pub fn series(
    samples: &[TelemetrySample],
    x: impl Fn(&TelemetrySample) -> f64,
    y: impl Fn(&TelemetrySample) -> f64,
) -> Vec<[f64; 2]> {
    samples
        .iter()
        .map(|sample| [x(sample), y(sample)])
        .filter(|[px, py]| px.is_finite() && py.is_finite())
        .collect()
}

fn missing() -> f64 {
    f64::NAN
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl LenientNumber {
    fn into_f64(self) -> f64 {
        match self {
            LenientNumber::Number(n) => n,
            LenientNumber::Flag(b) => {
                if b {
                    1.
                } else {
                    0.
                }
            }
            LenientNumber::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(f64::NAN))
}

fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientNumber>::deserialize(deserializer)?.map(LenientNumber::into_f64))
}
