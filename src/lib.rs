// Library interface for laptrace
// This allows integration tests to access internal modules

pub mod cascade;
pub mod client;
pub mod config;
pub mod errors;
pub mod headless;
pub mod render;
pub mod telemetry;
pub mod ui;

// Re-export commonly used types
pub use cascade::{
    CascadeGraph, CascadingSelectorController, FieldId, FieldSpec, FieldState, OptionValue,
    OptionsFetcher, Selection, UiAction, UiBinding,
};
pub use client::{ApiClient, build_cascade};
pub use config::ViewerConfig;
pub use errors::{ErrorKind, LaptraceError};
pub use render::ChartRenderer;
pub use telemetry::{LapSummary, TelemetryFetcher, TelemetrySample};
