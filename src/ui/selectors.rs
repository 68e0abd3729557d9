use egui::{Button, Color32, ComboBox, RichText, Ui};

use crate::cascade::{Field, FieldState, FieldView, StatusView, UiAction, UiBinding};

const SELECTOR_WIDTH: f32 = 170.;

/// Draws the cascade as a row of dropdowns followed by the load button and
/// the status line.
pub(crate) struct EguiBinding<'u> {
    ui: &'u mut Ui,
    actions: Vec<UiAction>,
}

impl<'u> EguiBinding<'u> {
    pub(crate) fn new(ui: &'u mut Ui) -> Self {
        Self {
            ui,
            actions: Vec::new(),
        }
    }
}

impl UiBinding for EguiBinding<'_> {
    fn render_field(&mut self, field: &Field, view: FieldView<'_>) {
        let text = view.selected_text(field);
        let actions = &mut self.actions;
        self.ui.vertical(|ui| {
            ui.horizontal(|ui| {
                ui.label(RichText::new(field.label()).color(Color32::WHITE));
                if view.state == FieldState::Loading {
                    ui.spinner();
                }
            });
            ui.add_enabled_ui(view.enabled, |ui| {
                ComboBox::from_id_salt(field.id().as_str())
                    .selected_text(text)
                    .width(SELECTOR_WIDTH)
                    .show_ui(ui, |ui| {
                        for (value, label) in &view.options {
                            let is_selected = view.selected == Some(*value);
                            if ui.selectable_label(is_selected, label.as_str()).clicked()
                                && !is_selected
                            {
                                actions.push(UiAction::FieldChanged {
                                    field: field.id().clone(),
                                    value: (*value).clone(),
                                });
                            }
                        }
                    });
            });
        });
    }

    fn render_status(&mut self, status: StatusView<'_>) {
        let actions = &mut self.actions;
        self.ui.vertical(|ui| {
            ui.label(" ");
            let load = ui.add_enabled(!status.telemetry_loading, Button::new("Load telemetry"));
            if load.clicked() {
                actions.push(UiAction::Submit);
            }
        });
        if status.telemetry_loading {
            self.ui.spinner();
        }
        if let Some(error) = status.error {
            self.ui
                .colored_label(Color32::RED, error.message.as_str());
        }
    }

    fn take_actions(&mut self) -> Vec<UiAction> {
        std::mem::take(&mut self.actions)
    }
}
