use std::{fs::File, io::BufWriter, path::Path};

use egui::{Color32, RichText, ScrollArea, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints, Points};
use itertools::{Itertools, MinMaxResult};

use crate::{
    LaptraceError,
    cascade::Selection,
    render::ChartRenderer,
    telemetry::{LapSummary, TelemetrySample, series},
};

use super::{PALETTE_ORANGE, stroke_shade};

const SPEED_BANDS: usize = 8;
const TRACK_POINT_RADIUS: f32 = 2.5;

/// Track map points sharing one speed band.
struct SpeedBand {
    name: String,
    color: Color32,
    points: Vec<[f64; 2]>,
}

/// Lap currently on screen, with its plot series computed once on arrival.
struct LoadedLap {
    title: String,
    samples: Vec<TelemetrySample>,
    summary: LapSummary,
    speed: Vec<[f64; 2]>,
    throttle: Vec<[f64; 2]>,
    brake: Vec<[f64; 2]>,
    track: Vec<SpeedBand>,
    raw_json: String,
}

/// Draws speed, pedal and track map charts of the last loaded lap.
#[derive(Default)]
pub struct PlotRenderer {
    lap: Option<LoadedLap>,
}

impl ChartRenderer for PlotRenderer {
    fn render(
        &mut self,
        selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        let raw_json = serde_json::to_string_pretty(&samples)
            .map_err(|e| LaptraceError::RenderSerializeError { source: e })?;
        self.lap = Some(LoadedLap {
            title: selection.iter().map(|(_, value)| value.as_str()).join(" / "),
            summary: LapSummary::from_samples(&samples),
            speed: series(&samples, |s| s.distance, |s| s.speed),
            throttle: series(&samples, |s| s.distance, |s| s.throttle),
            brake: series(&samples, |s| s.distance, |s| s.brake * 100.),
            track: speed_bands(&samples),
            raw_json,
            samples,
        });
        Ok(())
    }
}

impl PlotRenderer {
    pub fn has_lap(&self) -> bool {
        self.lap.is_some()
    }

    pub fn export_json(&self, path: &Path) -> Result<(), LaptraceError> {
        let Some(lap) = &self.lap else {
            return Ok(());
        };
        let file = File::create(path).map_err(|e| LaptraceError::RenderIOError { source: e })?;
        serde_json::to_writer_pretty(BufWriter::new(file), &lap.samples)
            .map_err(|e| LaptraceError::RenderSerializeError { source: e })
    }

    pub fn show(&self, ui: &mut Ui, show_raw_json: bool) {
        let Some(lap) = &self.lap else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("Pick a lap and load its telemetry").color(Color32::GRAY));
            });
            return;
        };

        ui.label(RichText::new(&lap.title).color(Color32::WHITE).strong());
        ui.label(format!(
            "{} samples, {:.0} m, top speed {:.1} km/h, full throttle {:.0}%, braking {:.0}%",
            lap.summary.samples,
            lap.summary.lap_distance_m,
            lap.summary.top_speed_kph,
            lap.summary.full_throttle_pct,
            lap.summary.braking_pct
        ));
        ui.separator();

        if show_raw_json {
            ScrollArea::both().show(ui, |ui| {
                ui.label(RichText::new(&lap.raw_json).monospace());
            });
            return;
        }

        let chart_height = (ui.available_height() / 3. - 8.).max(120.);
        Plot::new("speed_plot")
            .height(chart_height)
            .legend(Legend::default())
            .x_axis_label("Distance [m]")
            .y_axis_label("Speed [km/h]")
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new("Speed", PlotPoints::new(lap.speed.clone())).color(Color32::LIGHT_BLUE),
                );
            });

        Plot::new("pedals_plot")
            .height(chart_height)
            .legend(Legend::default())
            .include_y(0.)
            .include_y(105.)
            .x_axis_label("Distance [m]")
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new("Throttle", PlotPoints::new(lap.throttle.clone()))
                        .color(Color32::GREEN)
                        .fill(0.),
                );
                plot_ui.line(
                    Line::new("Brake", PlotPoints::new(lap.brake.clone()))
                        .color(Color32::RED)
                        .fill(0.),
                );
            });

        Plot::new("track_map")
            .height(chart_height)
            .data_aspect(1.)
            .show_axes(false)
            .legend(Legend::default())
            .show(ui, |plot_ui| {
                for band in &lap.track {
                    plot_ui.points(
                        Points::new(band.name.as_str(), PlotPoints::new(band.points.clone()))
                            .color(band.color)
                            .radius(TRACK_POINT_RADIUS),
                    );
                }
            });
    }
}

/// Splits the track map into equal-width speed bands, slow (orange) to fast
/// (blue).
fn speed_bands(samples: &[TelemetrySample]) -> Vec<SpeedBand> {
    let (min, max) = match samples
        .iter()
        .map(|s| s.speed)
        .filter(|s| s.is_finite())
        .minmax_by(f64::total_cmp)
    {
        MinMaxResult::NoElements => return Vec::new(),
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(min, max) => (min, max),
    };
    let width = ((max - min) / SPEED_BANDS as f64).max(f64::EPSILON);

    let mut bands: Vec<SpeedBand> = (0..SPEED_BANDS)
        .map(|i| {
            let low = min + width * i as f64;
            SpeedBand {
                name: format!("{:.0}-{:.0} km/h", low, low + width),
                color: stroke_shade(
                    PALETTE_ORANGE,
                    Color32::LIGHT_BLUE,
                    i as f32 / (SPEED_BANDS - 1) as f32,
                ),
                points: Vec::new(),
            }
        })
        .collect();

    for sample in samples {
        if !(sample.x.is_finite() && sample.y.is_finite() && sample.speed.is_finite()) {
            continue;
        }
        let band = (((sample.speed - min) / width) as usize).min(SPEED_BANDS - 1);
        bands[band].points.push([sample.x, sample.y]);
    }
    bands.retain(|band| !band.points.is_empty());
    bands
}
