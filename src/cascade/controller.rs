use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::{
    runtime::Handle,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

use crate::{
    LaptraceError,
    render::ChartRenderer,
    telemetry::{TelemetryFetcher, TelemetrySample},
};

use super::{
    CascadeGraph, ErrorSlot, FieldId, FieldState, FieldView, OptionValue, Selection,
    SelectionState, StatusView, UiAction, UiBinding,
};

pub type RepaintNotifier = Arc<dyn Fn() + Send + Sync>;

/// Result of a spawned fetch, tagged with the generation it was issued for.
enum Completion {
    Options {
        index: usize,
        generation: u64,
        result: Result<Vec<OptionValue>, LaptraceError>,
    },
    Telemetry {
        generation: u64,
        selection: Selection,
        result: Result<Vec<TelemetrySample>, LaptraceError>,
    },
}

/// Drives a [`CascadeGraph`]: fetches options as upstream values are chosen,
/// invalidates everything downstream of a change, and hands the complete
/// selection to the telemetry fetcher and renderer.
///
/// Fetches run on the given tokio runtime, but their results are only
/// applied by [`poll`](Self::poll) or [`settle`](Self::settle), on the
/// thread that owns the controller. A result whose generation no longer
/// matches its field is dropped.
pub struct CascadingSelectorController<R: ChartRenderer> {
    graph: CascadeGraph,
    selection: SelectionState,
    telemetry_fetcher: Arc<dyn TelemetryFetcher>,
    renderer: R,
    runtime: Handle,
    completion_tx: UnboundedSender<Completion>,
    completion_rx: UnboundedReceiver<Completion>,
    in_flight: usize,
    telemetry_generation: u64,
    telemetry_loading: bool,
    error: Option<ErrorSlot>,
    notifier: Option<RepaintNotifier>,
}

impl<R: ChartRenderer> CascadingSelectorController<R> {
    pub fn new(
        graph: CascadeGraph,
        telemetry_fetcher: Arc<dyn TelemetryFetcher>,
        renderer: R,
        runtime: Handle,
    ) -> Self {
        let ids = graph.fields().iter().map(|f| f.id().clone()).collect();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            graph,
            selection: SelectionState::new(ids),
            telemetry_fetcher,
            renderer,
            runtime,
            completion_tx,
            completion_rx,
            in_flight: 0,
            telemetry_generation: 0,
            telemetry_loading: false,
            error: None,
            notifier: None,
        }
    }

    /// Called from the fetch task whenever a result is queued, e.g. to wake
    /// up the GUI.
    pub fn with_notifier(mut self, notifier: RepaintNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Disables every field and starts loading the first one.
    pub fn initialize(&mut self) {
        self.error = None;
        self.selection.reset_from(0);
        self.bump_telemetry_generation();
        self.refresh_index(0);
    }

    /// Records `value` for `field`, resets everything downstream and
    /// refreshes the next field.
    pub fn on_field_changed(
        &mut self,
        field: &FieldId,
        value: OptionValue,
    ) -> Result<(), LaptraceError> {
        self.error = None;
        let index = self.validate_choice(field, &value).inspect_err(|e| {
            self.record_error(e);
        })?;

        debug!("{} changed to {}", field, value);
        if let Some(slot) = self.selection.slot_mut(index) {
            slot.selected = Some(value);
        }
        self.selection.reset_from(index + 1);
        self.bump_telemetry_generation();

        if index + 1 < self.graph.len() {
            self.refresh_index(index + 1);
        }
        Ok(())
    }

    /// Re-fetches the options of `field` from its current upstream values.
    /// The field and everything after it start over from no selection.
    pub fn refresh(&mut self, field: &FieldId) -> Result<(), LaptraceError> {
        self.error = None;
        let index = self.graph.position(field).ok_or_else(|| {
            let e = LaptraceError::UnknownField {
                field: field.to_string(),
            };
            self.record_error(&e);
            e
        })?;
        self.selection.reset_from(index);
        self.bump_telemetry_generation();
        self.refresh_index(index);
        Ok(())
    }

    /// Fetches telemetry for the complete selection. Fails without fetching
    /// if any field is unset.
    pub fn submit(&mut self) -> Result<(), LaptraceError> {
        self.error = None;
        let selection = match self.selection.complete() {
            Ok(selection) => selection,
            Err(missing) => {
                let e = LaptraceError::IncompleteSelection {
                    field: missing.to_string(),
                };
                self.record_error(&e);
                return Err(e);
            }
        };

        self.bump_telemetry_generation();
        self.telemetry_loading = true;
        let generation = self.telemetry_generation;
        info!("Loading telemetry for {:?}", selection);

        let fetcher = Arc::clone(&self.telemetry_fetcher);
        let failed_selection = selection.clone();
        self.spawn(
            async move {
                let result = fetcher.fetch_telemetry(&selection).await;
                Completion::Telemetry {
                    generation,
                    selection,
                    result,
                }
            },
            move |e| Completion::Telemetry {
                generation,
                selection: failed_selection,
                result: Err(e),
            },
        );
        Ok(())
    }

    pub fn dispatch(&mut self, action: UiAction) -> Result<(), LaptraceError> {
        match action {
            UiAction::FieldChanged { field, value } => self.on_field_changed(&field, value),
            UiAction::Submit => self.submit(),
        }
    }

    /// Applies every completion that has already arrived.
    pub fn poll(&mut self) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
        }
    }

    /// Waits until no fetch is outstanding, applying results as they come in.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.completion_rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    /// Pushes the current state of every field and the status line into
    /// `binding`.
    pub fn reflect<B: UiBinding + ?Sized>(&self, binding: &mut B) {
        for (field, slot) in self.graph.fields().iter().zip(self.selection.slots()) {
            let view = FieldView {
                state: slot.state(),
                enabled: slot.state().is_enabled(),
                options: slot
                    .options()
                    .iter()
                    .map(|value| (value, field.format(value)))
                    .collect(),
                selected: slot.selected(),
            };
            binding.render_field(field, view);
        }
        binding.render_status(StatusView {
            error: self.error.as_ref(),
            telemetry_loading: self.telemetry_loading,
        });
    }

    /// One round trip with a binding: apply arrived results, draw, then act
    /// on whatever the user did while drawing.
    pub fn sync<B: UiBinding + ?Sized>(&mut self, binding: &mut B) {
        self.poll();
        self.reflect(binding);
        let actions = binding.take_actions();
        let acted = !actions.is_empty();
        for action in actions {
            if let Err(e) = self.dispatch(action) {
                debug!("Rejected user action: {}", e);
            }
        }
        if acted && let Some(notifier) = &self.notifier {
            notifier();
        }
    }

    pub fn graph(&self) -> &CascadeGraph {
        &self.graph
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn field_state(&self, field: &FieldId) -> Option<FieldState> {
        let index = self.graph.position(field)?;
        self.selection.slot(index).map(|slot| slot.state())
    }

    pub fn options(&self, field: &FieldId) -> &[OptionValue] {
        self.graph
            .position(field)
            .and_then(|index| self.selection.slot(index))
            .map(|slot| slot.options())
            .unwrap_or(&[])
    }

    pub fn selected(&self, field: &FieldId) -> Option<&OptionValue> {
        self.graph
            .position(field)
            .and_then(|index| self.selection.value(index))
    }

    pub fn error(&self) -> Option<&ErrorSlot> {
        self.error.as_ref()
    }

    pub fn is_telemetry_loading(&self) -> bool {
        self.telemetry_loading
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    fn validate_choice(&self, field: &FieldId, value: &OptionValue) -> Result<usize, LaptraceError> {
        let index = self
            .graph
            .position(field)
            .ok_or_else(|| LaptraceError::UnknownField {
                field: field.to_string(),
            })?;
        let slot = self
            .selection
            .slot(index)
            .ok_or_else(|| LaptraceError::UnknownField {
                field: field.to_string(),
            })?;
        if slot.state() != FieldState::Populated {
            return Err(LaptraceError::FieldNotReady {
                field: field.to_string(),
            });
        }
        if !slot.options().contains(value) {
            return Err(LaptraceError::UnavailableOption {
                field: field.to_string(),
                value: value.to_string(),
            });
        }
        Ok(index)
    }

    fn refresh_index(&mut self, index: usize) {
        let Some(field) = self.graph.field(index) else {
            return;
        };
        let upstream = self.selection.upstream(index).map_err(FieldId::clone);
        let Some(slot) = self.selection.slot_mut(index) else {
            return;
        };
        slot.reset();

        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(missing) => {
                debug!("Not loading {}: {} is unset", field.id(), missing);
                return;
            }
        };

        slot.state = FieldState::Loading;
        let generation = slot.generation();
        debug!(
            "Loading options for {} (generation {}) with {:?}",
            field.id(),
            generation,
            upstream
        );

        let fetcher = field.fetcher();
        self.spawn(
            async move {
                let result = fetcher.fetch_options(&upstream).await;
                Completion::Options {
                    index,
                    generation,
                    result,
                }
            },
            move |e| Completion::Options {
                index,
                generation,
                result: Err(e),
            },
        );
    }

    /// Runs `task` on the runtime. A fetch that panics still completes, with
    /// the error built by `on_panic`, so `in_flight` always drains.
    fn spawn<F, P>(&mut self, task: F, on_panic: P)
    where
        F: Future<Output = Completion> + Send + 'static,
        P: FnOnce(LaptraceError) -> Completion + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.completion_tx.clone();
        let notifier = self.notifier.clone();
        let runtime = self.runtime.clone();
        self.runtime.spawn(async move {
            let completion = match runtime.spawn(task).await {
                Ok(completion) => completion,
                Err(e) => {
                    error!("Fetch task failed: {}", e);
                    on_panic(LaptraceError::FetchTaskFailed {
                        description: e.to_string(),
                    })
                }
            };
            if tx.send(completion).is_ok()
                && let Some(notifier) = notifier
            {
                notifier();
            }
        });
    }

    fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion {
            Completion::Options {
                index,
                generation,
                result,
            } => {
                let Some(slot) = self.selection.slot_mut(index) else {
                    return;
                };
                let field_id = self.graph.fields()[index].id();
                if slot.generation() != generation {
                    debug!(
                        "Discarding stale options for {} (generation {}, now {})",
                        field_id,
                        generation,
                        slot.generation()
                    );
                    return;
                }
                match result {
                    Ok(options) => {
                        debug!("Loaded {} options for {}", options.len(), field_id);
                        slot.populate(options);
                    }
                    Err(e) => {
                        warn!("Could not load options for {}: {}", field_id, e);
                        slot.fail();
                        self.error = Some(ErrorSlot::from(&e));
                    }
                }
            }
            Completion::Telemetry {
                generation,
                selection,
                result,
            } => {
                if generation != self.telemetry_generation {
                    debug!("Discarding stale telemetry for {:?}", selection);
                    return;
                }
                self.telemetry_loading = false;
                let rendered = result.and_then(|samples| {
                    info!("Loaded {} telemetry samples", samples.len());
                    self.renderer.render(&selection, samples)
                });
                if let Err(e) = rendered {
                    self.record_error(&e);
                }
            }
        }
    }

    fn bump_telemetry_generation(&mut self) {
        self.telemetry_generation += 1;
        self.telemetry_loading = false;
    }

    fn record_error(&mut self, error: &LaptraceError) {
        warn!("{}", error);
        self.error = Some(ErrorSlot::from(error));
    }
}
