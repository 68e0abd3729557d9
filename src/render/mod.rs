//! Sinks for loaded lap telemetry.

use std::{
    io::{BufWriter, Write},
    path::PathBuf,
};

use log::info;
use serde::Serialize;

use crate::{
    LaptraceError,
    cascade::Selection,
    telemetry::{LapSummary, TelemetrySample},
};

pub trait ChartRenderer {
    fn render(
        &mut self,
        selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError>;
}

impl ChartRenderer for Box<dyn ChartRenderer> {
    fn render(
        &mut self,
        selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        (**self).render(selection, samples)
    }
}

/// Raw telemetry as one pretty-printed JSON array.
pub struct JsonRenderer<W: Write> {
    writer: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ChartRenderer for JsonRenderer<W> {
    fn render(
        &mut self,
        _selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        serde_json::to_writer_pretty(&mut self.writer, &samples)
            .map_err(|e| LaptraceError::RenderSerializeError { source: e })?;
        writeln!(self.writer).map_err(|e| LaptraceError::RenderIOError { source: e })?;
        self.writer
            .flush()
            .map_err(|e| LaptraceError::RenderIOError { source: e })
    }
}

/// One JSON object per sample, written to a file.
pub struct JsonLinesRenderer {
    path: PathBuf,
}

impl JsonLinesRenderer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ChartRenderer for JsonLinesRenderer {
    fn render(
        &mut self,
        _selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        serde_jsonlines::write_json_lines(&self.path, &samples)
            .map_err(|e| LaptraceError::RenderIOError { source: e })?;
        info!("Wrote {} samples to {:?}", samples.len(), self.path);
        Ok(())
    }
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    selection: Vec<(&'a str, &'a str)>,
    #[serde(flatten)]
    summary: LapSummary,
}

/// Lap headline numbers as text, or as a single JSON object.
pub struct SummaryRenderer<W: Write> {
    writer: BufWriter<W>,
    as_json: bool,
}

impl<W: Write> SummaryRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            as_json: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.as_json = true;
        self
    }
}

impl<W: Write> ChartRenderer for SummaryRenderer<W> {
    fn render(
        &mut self,
        selection: &Selection,
        samples: Vec<TelemetrySample>,
    ) -> Result<(), LaptraceError> {
        let summary = LapSummary::from_samples(&samples);
        if self.as_json {
            let line = SummaryLine {
                selection: selection
                    .iter()
                    .map(|(field, value)| (field.as_str(), value.as_str()))
                    .collect(),
                summary,
            };
            serde_json::to_writer(&mut self.writer, &line)
                .map_err(|e| LaptraceError::RenderSerializeError { source: e })?;
            writeln!(self.writer).map_err(|e| LaptraceError::RenderIOError { source: e })?;
        } else {
            write_summary_text(&mut self.writer, selection, &summary)
                .map_err(|e| LaptraceError::RenderIOError { source: e })?;
        }
        self.writer
            .flush()
            .map_err(|e| LaptraceError::RenderIOError { source: e })
    }
}

fn write_summary_text(
    writer: &mut impl Write,
    selection: &Selection,
    summary: &LapSummary,
) -> std::io::Result<()> {
    for (field, value) in selection.iter() {
        writeln!(writer, "{:<16}{}", field, value)?;
    }
    writeln!(writer, "{:<16}{}", "samples", summary.samples)?;
    writeln!(writer, "{:<16}{:.0} m", "distance", summary.lap_distance_m)?;
    writeln!(writer, "{:<16}{:.1} km/h", "top speed", summary.top_speed_kph)?;
    writeln!(writer, "{:<16}{:.1} km/h", "mean speed", summary.mean_speed_kph)?;
    writeln!(writer, "{:<16}{:.1} %", "full throttle", summary.full_throttle_pct)?;
    writeln!(writer, "{:<16}{:.1} %", "braking", summary.braking_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lap() -> Vec<TelemetrySample> {
        vec![
            TelemetrySample {
                distance: 0.,
                speed: 200.,
                throttle: 100.,
                brake: 0.,
                x: 1.,
                y: 2.,
                ..Default::default()
            },
            TelemetrySample {
                distance: 50.,
                speed: 100.,
                throttle: 0.,
                brake: 1.,
                x: f64::NAN,
                y: 3.,
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_json_renderer_writes_server_column_names() {
        let mut renderer = JsonRenderer::new(Vec::new());
        renderer.render(&Selection::new(), lap()).unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value[0]["Speed"], 200.0);
        assert_eq!(value[1]["Brake"], 1.0);
        // NaN has no JSON representation
        assert!(value[1]["X"].is_null());
        assert!(value[0].get("RPM").is_none());
    }

    #[test]
    fn test_json_lines_renderer_writes_one_line_per_sample() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lap.jsonl");
        let mut renderer = JsonLinesRenderer::new(path.clone());
        renderer.render(&Selection::new(), lap()).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let reloaded: TelemetrySample =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(reloaded.speed, 200.);
    }

    #[test]
    fn test_summary_renderer_text() {
        let mut output = Vec::new();
        {
            let mut renderer = SummaryRenderer::new(&mut output);
            let selection = Selection::new().with("year", "2023").with("lap", "12");
            renderer.render(&selection, lap()).unwrap();
        }
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("year            2023"));
        assert!(text.contains("top speed       200.0 km/h"));
        assert!(text.contains("braking         50.0 %"));
    }

    #[test]
    fn test_summary_renderer_json() {
        let mut output = Vec::new();
        {
            let mut renderer = SummaryRenderer::new(&mut output).json();
            let selection = Selection::new().with("driver", "VER");
            renderer.render(&selection, lap()).unwrap();
        }
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["selection"][0][1], "VER");
        assert_eq!(value["samples"], 2);
        assert_eq!(value["mean_speed_kph"], 150.0);
    }
}
