use crate::errors::{ErrorKind, LaptraceError};

use super::{FieldId, OptionValue, Selection};

/// Display state of a single field.
///
/// A field starts `Disabled`, moves to `Loading` while its options are being
/// fetched and ends up either `Populated` (non-empty options, enabled) or
/// `Errored` (disabled, no options).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldState {
    Disabled,
    Loading,
    Populated,
    Errored,
}

impl FieldState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, FieldState::Populated)
    }
}

/// Runtime state of one field: what is shown, what is chosen, and the
/// generation used to recognise stale fetch results.
#[derive(Clone, Debug)]
pub struct FieldSlot {
    pub(crate) state: FieldState,
    pub(crate) options: Vec<OptionValue>,
    pub(crate) selected: Option<OptionValue>,
    pub(crate) generation: u64,
}

impl Default for FieldSlot {
    fn default() -> Self {
        Self {
            state: FieldState::Disabled,
            options: Vec::new(),
            selected: None,
            generation: 0,
        }
    }
}

impl FieldSlot {
    pub fn state(&self) -> FieldState {
        self.state
    }

    pub fn options(&self) -> &[OptionValue] {
        &self.options
    }

    pub fn selected(&self) -> Option<&OptionValue> {
        self.selected.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Back to `Disabled(empty)`; any fetch issued before this point is stale.
    pub(crate) fn reset(&mut self) {
        self.state = FieldState::Disabled;
        self.options.clear();
        self.selected = None;
        self.generation += 1;
    }

    pub(crate) fn populate(&mut self, options: Vec<OptionValue>) {
        self.state = if options.is_empty() {
            FieldState::Disabled
        } else {
            FieldState::Populated
        };
        self.options = options;
        self.selected = None;
    }

    pub(crate) fn fail(&mut self) {
        self.state = FieldState::Errored;
        self.options.clear();
        self.selected = None;
    }
}

/// Chosen value for every field of the cascade, in cascade order.
#[derive(Clone, Debug)]
pub struct SelectionState {
    ids: Vec<FieldId>,
    slots: Vec<FieldSlot>,
}

impl SelectionState {
    pub(crate) fn new(ids: Vec<FieldId>) -> Self {
        let slots = ids.iter().map(|_| FieldSlot::default()).collect();
        Self { ids, slots }
    }

    pub fn slot(&self, index: usize) -> Option<&FieldSlot> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut FieldSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn value(&self, index: usize) -> Option<&OptionValue> {
        self.slots.get(index).and_then(|slot| slot.selected.as_ref())
    }

    /// Values of every field before `index`, or the first unset field id.
    pub fn upstream(&self, index: usize) -> Result<Selection, &FieldId> {
        let mut selection = Selection::new();
        for (id, slot) in self.ids.iter().zip(&self.slots).take(index) {
            match &slot.selected {
                Some(value) => selection.push(id.clone(), value.clone()),
                None => return Err(id),
            }
        }
        Ok(selection)
    }

    /// The whole selection tuple, or the first unset field id.
    pub fn complete(&self) -> Result<Selection, &FieldId> {
        self.upstream(self.slots.len())
    }

    /// Resets every field from `index` onwards.
    pub(crate) fn reset_from(&mut self, index: usize) {
        for slot in self.slots.iter_mut().skip(index) {
            slot.reset();
        }
    }
}

/// The single user-visible error message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorSlot {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&LaptraceError> for ErrorSlot {
    fn from(error: &LaptraceError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
