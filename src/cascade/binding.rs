//! Presentation boundary of the cascade. The controller pushes views into a
//! `UiBinding` and receives `UiAction`s back; it never draws anything itself.

use log::debug;

use super::{ErrorSlot, Field, FieldId, FieldState, OptionValue};

/// Everything a binding needs to draw one field.
#[derive(Clone, Debug)]
pub struct FieldView<'a> {
    pub state: FieldState,
    pub enabled: bool,
    /// `(value, formatted label)` pairs in server order.
    pub options: Vec<(&'a OptionValue, String)>,
    pub selected: Option<&'a OptionValue>,
}

impl FieldView<'_> {
    /// Text for the closed dropdown.
    pub fn selected_text(&self, field: &Field) -> String {
        match (self.state, self.selected) {
            (FieldState::Loading, _) => format!("Loading {}...", field.label().to_lowercase()),
            (_, Some(value)) => field.format(value),
            (_, None) => field.placeholder().to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusView<'a> {
    pub error: Option<&'a ErrorSlot>,
    pub telemetry_loading: bool,
}

/// User intent collected by a binding, fed back through
/// `CascadingSelectorController::dispatch`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiAction {
    FieldChanged { field: FieldId, value: OptionValue },
    Submit,
}

pub trait UiBinding {
    fn render_field(&mut self, field: &Field, view: FieldView<'_>);
    fn render_status(&mut self, status: StatusView<'_>);
    /// Drains the actions the user triggered since the last call.
    fn take_actions(&mut self) -> Vec<UiAction>;
}

/// Binding without a screen: logs what would be shown. Used by the CLI.
#[derive(Default)]
pub struct LogBinding {
    pending: Vec<UiAction>,
}

impl LogBinding {
    pub fn queue(&mut self, action: UiAction) {
        self.pending.push(action);
    }
}

impl UiBinding for LogBinding {
    fn render_field(&mut self, field: &Field, view: FieldView<'_>) {
        debug!(
            "{}: {:?}, {} options, selected {}",
            field.id(),
            view.state,
            view.options.len(),
            view.selected_text(field)
        );
    }

    fn render_status(&mut self, status: StatusView<'_>) {
        if let Some(error) = status.error {
            debug!("error slot: {:?} {}", error.kind, error.message);
        }
        if status.telemetry_loading {
            debug!("telemetry loading");
        }
    }

    fn take_actions(&mut self) -> Vec<UiAction> {
        std::mem::take(&mut self.pending)
    }
}
