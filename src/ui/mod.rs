mod charts;
mod selectors;

use std::sync::Arc;

use egui::{Color32, RichText, Visuals, style::Widgets};
use log::{error, info};
use tokio::runtime::Runtime;

use crate::{
    cascade::{CascadeGraph, CascadingSelectorController},
    config::ViewerConfig,
    telemetry::TelemetryFetcher,
};

pub use charts::PlotRenderer;
use selectors::EguiBinding;

pub(crate) const PALETTE_BLACK: Color32 = Color32::from_rgb(12, 12, 12);
pub(crate) const PALETTE_BROWN: Color32 = Color32::from_rgb(72, 30, 20);
pub(crate) const PALETTE_MAROON: Color32 = Color32::from_rgb(155, 57, 34);
pub(crate) const PALETTE_ORANGE: Color32 = Color32::from_rgb(242, 97, 63);

/// Desktop viewer: the cascade of dropdowns on top, the charts of the loaded
/// lap below.
///
/// Fetches run on `runtime`; the controller applies their results at the
/// start of every frame and asks egui for a repaint as soon as one arrives.
pub struct ViewerApp {
    // keeps the fetch tasks alive for as long as the window is open
    _runtime: Runtime,
    controller: CascadingSelectorController<PlotRenderer>,
    config: ViewerConfig,
    export_status: Option<String>,
}

impl ViewerApp {
    pub fn new(
        runtime: Runtime,
        graph: CascadeGraph,
        telemetry: Arc<dyn TelemetryFetcher>,
        config: ViewerConfig,
        cc: &eframe::CreationContext<'_>,
    ) -> Self {
        cc.egui_ctx.set_visuals(Visuals {
            dark_mode: true,
            hyperlink_color: PALETTE_MAROON,
            faint_bg_color: PALETTE_BLACK,
            extreme_bg_color: PALETTE_BROWN,
            panel_fill: PALETTE_BLACK,
            window_fill: PALETTE_BLACK,
            button_frame: true,
            widgets: Widgets::dark(),
            striped: false,
            ..Default::default()
        });

        let ctx = cc.egui_ctx.clone();
        let mut controller = CascadingSelectorController::new(
            graph,
            telemetry,
            PlotRenderer::default(),
            runtime.handle().clone(),
        )
        .with_notifier(Arc::new(move || ctx.request_repaint()));
        controller.initialize();

        Self {
            _runtime: runtime,
            controller,
            config,
            export_status: None,
        }
    }

    fn export(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("telemetry.json")
            .save_file()
        else {
            return;
        };
        self.export_status = Some(match self.controller.renderer().export_json(&path) {
            Ok(()) => {
                info!("Exported telemetry to {:?}", path);
                format!("Saved {}", path.display())
            }
            Err(e) => {
                error!("Error exporting telemetry: {}", e);
                e.to_string()
            }
        });
    }
}

impl eframe::App for ViewerApp {
    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = self.config.save() {
            error!("Error while saving config file: {}", e);
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut export_clicked = false;
        egui::TopBottomPanel::top("cascade").show(ctx, |ui| {
            ui.add_space(4.);
            ui.horizontal_wrapped(|ui| {
                let mut binding = EguiBinding::new(ui);
                self.controller.sync(&mut binding);
            });
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.config.show_raw_json, "Raw JSON");
                if self.controller.renderer().has_lap() {
                    export_clicked = ui.button("Save JSON...").clicked();
                }
                if let Some(status) = &self.export_status {
                    ui.label(RichText::new(status).color(Color32::GRAY));
                }
            });
            ui.add_space(4.);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.controller
                .renderer()
                .show(ui, self.config.show_raw_json);
        });

        if export_clicked {
            self.export();
        }
    }
}

/// Linear blend from `start` (`y = 0`) to `end` (`y = 1`).
pub(crate) fn stroke_shade(start: Color32, end: Color32, y: f32) -> Color32 {
    let blend = |from: u8, to: u8| {
        (from as f32 + y.clamp(0., 1.) * (to as f32 - from as f32)).round() as u8
    };
    Color32::from_rgb(
        blend(start.r(), end.r()),
        blend(start.g(), end.g()),
        blend(start.b(), end.b()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stroke_shade_endpoints() {
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 0.), Color32::BLACK);
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 1.), Color32::WHITE);
        assert_eq!(
            stroke_shade(Color32::BLACK, Color32::WHITE, 0.5),
            Color32::from_rgb(128, 128, 128)
        );
        assert_eq!(stroke_shade(Color32::BLACK, Color32::WHITE, 3.), Color32::WHITE);
    }
}
