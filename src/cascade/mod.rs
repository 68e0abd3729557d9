//! Cascading selection fields: each field's options depend on the values
//! chosen in every field before it.

pub mod binding;
pub mod controller;
pub mod state;

use std::{collections::HashSet, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LaptraceError;

pub use binding::{FieldView, LogBinding, StatusView, UiAction, UiBinding};
pub use controller::CascadingSelectorController;
pub use state::{ErrorSlot, FieldSlot, FieldState, SelectionState};

/// Stable identifier of a field in the cascade, e.g. `year` or `lap`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One selectable option, kept in the canonical string form used both for
/// display formatting and as a query parameter value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionValue(String);

impl OptionValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts a JSON scalar from an option list. Integral floats lose their
    /// fractional part, so a lap number served as `3.0` becomes `"3"`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Bool(b) => Some(Self(b.to_string())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Some(Self(u.to_string()))
                } else {
                    let f = n.as_f64()?;
                    if f.fract() == 0.0 && f.abs() < 1e15 {
                        Some(Self(format!("{}", f as i64)))
                    } else {
                        Some(Self(f.to_string()))
                    }
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Ordered `(field, value)` tuple handed to fetchers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    values: Vec<(FieldId, OptionValue)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: FieldId, value: OptionValue) {
        self.values.push((field, value));
    }

    pub fn with(mut self, field: impl Into<FieldId>, value: impl Into<OptionValue>) -> Self {
        self.push(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &FieldId) -> Option<&OptionValue> {
        self.values
            .iter()
            .find(|(id, _)| id == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &OptionValue)> {
        self.values.iter().map(|(id, value)| (id, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Produces the ordered option list for a field given its upstream values.
#[async_trait]
pub trait OptionsFetcher: Send + Sync {
    async fn fetch_options(&self, upstream: &Selection) -> Result<Vec<OptionValue>, LaptraceError>;
}

pub type Formatter = Arc<dyn Fn(&OptionValue) -> String + Send + Sync>;

/// Configuration entry for one field, validated by [`CascadeGraph::new`].
pub struct FieldSpec {
    pub id: FieldId,
    pub label: String,
    pub placeholder: String,
    pub depends_on: Vec<FieldId>,
    pub fetcher: Arc<dyn OptionsFetcher>,
    pub formatter: Formatter,
}

impl FieldSpec {
    pub fn new(id: impl Into<FieldId>, fetcher: Arc<dyn OptionsFetcher>) -> Self {
        let id = id.into();
        Self {
            label: id.to_string(),
            placeholder: format!("Select {}", id),
            id,
            depends_on: Vec::new(),
            fetcher,
            formatter: Arc::new(|value| value.to_string()),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn depends_on<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldId>,
    {
        self.depends_on = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn formatter(mut self, formatter: impl Fn(&OptionValue) -> String + Send + Sync + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }
}

pub struct Field {
    id: FieldId,
    label: String,
    placeholder: String,
    depends_on: Vec<FieldId>,
    fetcher: Arc<dyn OptionsFetcher>,
    formatter: Formatter,
}

impl Field {
    pub fn id(&self) -> &FieldId {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn depends_on(&self) -> &[FieldId] {
        &self.depends_on
    }

    pub fn format(&self, value: &OptionValue) -> String {
        (self.formatter)(value)
    }

    pub(crate) fn fetcher(&self) -> Arc<dyn OptionsFetcher> {
        Arc::clone(&self.fetcher)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Immutable, validated chain of fields.
#[derive(Debug)]
pub struct CascadeGraph {
    fields: Vec<Field>,
}

impl CascadeGraph {
    /// Validates the field list. Every field must depend on exactly the
    /// fields defined before it, in order.
    pub fn new(specs: Vec<FieldSpec>) -> Result<Self, LaptraceError> {
        if specs.is_empty() {
            return Err(LaptraceError::invalid_cascade("cascade has no fields"));
        }

        let mut seen: HashSet<FieldId> = HashSet::new();
        let mut defined: Vec<FieldId> = Vec::new();
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.id.as_str().is_empty() {
                return Err(LaptraceError::invalid_cascade("field id must not be empty"));
            }
            if seen.contains(&spec.id) {
                return Err(LaptraceError::invalid_cascade(format!(
                    "duplicate field id '{}'",
                    spec.id
                )));
            }
            if let Some(unknown) = spec.depends_on.iter().find(|dep| !seen.contains(*dep)) {
                return Err(LaptraceError::invalid_cascade(format!(
                    "field '{}' depends on '{}', which is not defined before it",
                    spec.id, unknown
                )));
            }
            if spec.depends_on != defined {
                return Err(LaptraceError::invalid_cascade(format!(
                    "field '{}' must depend on every preceding field in order",
                    spec.id
                )));
            }

            seen.insert(spec.id.clone());
            defined.push(spec.id.clone());
            fields.push(Field {
                id: spec.id,
                label: spec.label,
                placeholder: spec.placeholder,
                depends_on: spec.depends_on,
                fetcher: spec.fetcher,
                formatter: spec.formatter,
            });
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, id: &FieldId) -> Option<usize> {
        self.fields.iter().position(|field| &field.id == id)
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }
}
