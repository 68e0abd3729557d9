//! Walks the cascade without a window, for the `list` and `fetch` commands.

use log::info;

use crate::{
    ErrorKind, LaptraceError,
    cascade::{CascadingSelectorController, FieldId, FieldState, LogBinding, OptionValue},
    render::ChartRenderer,
};

/// Orders `choices` by cascade position. Unknown fields are rejected.
pub fn order_choices<R: ChartRenderer>(
    controller: &CascadingSelectorController<R>,
    choices: Vec<(FieldId, OptionValue)>,
) -> Result<Vec<(FieldId, OptionValue)>, LaptraceError> {
    let mut positioned = choices
        .into_iter()
        .map(|(field, value)| {
            controller
                .graph()
                .position(&field)
                .map(|index| (index, field.clone(), value))
                .ok_or(LaptraceError::UnknownField {
                    field: field.to_string(),
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    positioned.sort_by_key(|(index, _, _)| *index);
    Ok(positioned
        .into_iter()
        .map(|(_, field, value)| (field, value))
        .collect())
}

/// Loads the first field and applies `choices` in cascade order, waiting for
/// every fetch on the way.
pub async fn walk<R: ChartRenderer>(
    controller: &mut CascadingSelectorController<R>,
    choices: &[(FieldId, OptionValue)],
) -> Result<(), LaptraceError> {
    let mut binding = LogBinding::default();
    controller.initialize();
    controller.settle().await;
    controller.reflect(&mut binding);
    ensure_loaded(controller)?;

    for (field, value) in choices {
        controller.on_field_changed(field, value.clone())?;
        controller.settle().await;
        controller.reflect(&mut binding);
        ensure_loaded(controller)?;
    }
    Ok(())
}

/// Options of the first field left unset after applying `choices`, as
/// `(label, formatted options)`. `None` when every field is set.
pub async fn list_options<R: ChartRenderer>(
    controller: &mut CascadingSelectorController<R>,
    choices: &[(FieldId, OptionValue)],
) -> Result<Option<(String, Vec<String>)>, LaptraceError> {
    walk(controller, choices).await?;

    let graph = controller.graph();
    for (field, slot) in graph.fields().iter().zip(controller.selection().slots()) {
        if slot.selected().is_none() {
            let options = slot.options().iter().map(|value| field.format(value)).collect();
            return Ok(Some((field.label().to_string(), options)));
        }
    }
    Ok(None)
}

/// Applies every choice, submits, and waits for the renderer to run.
pub async fn fetch<R: ChartRenderer>(
    controller: &mut CascadingSelectorController<R>,
    choices: &[(FieldId, OptionValue)],
) -> Result<(), LaptraceError> {
    walk(controller, choices).await?;
    controller.submit()?;
    controller.settle().await;

    if let Some(error) = controller.error() {
        let message = error.message.clone();
        return Err(match error.kind {
            ErrorKind::Render => LaptraceError::RenderFailed { message },
            _ => LaptraceError::TelemetryLoadFailed { message },
        });
    }
    info!("Telemetry rendered");
    Ok(())
}

fn ensure_loaded<R: ChartRenderer>(
    controller: &CascadingSelectorController<R>,
) -> Result<(), LaptraceError> {
    let failed = controller
        .graph()
        .fields()
        .iter()
        .zip(controller.selection().slots())
        .find(|(_, slot)| slot.state() == FieldState::Errored);
    match failed {
        Some((field, _)) => Err(LaptraceError::FieldLoadFailed {
            field: field.label().to_string(),
            message: controller
                .error()
                .map(|e| e.message.clone())
                .unwrap_or_default(),
        }),
        None => Ok(()),
    }
}
