//! Breadth Runner — pipeline orchestration, reporting, and notification.
//!
//! Wires the core acquisition layer and indicator engine into one run:
//! universe → scheduler → coverage gate → matrix → engine → report. Every
//! run starts from an empty observation set; nothing is shared across runs.

pub mod config;
pub mod notify;
pub mod pipeline;
pub mod report;

pub use config::{RunConfig, StrategyConfig};
pub use notify::{resolve_notifier, NoopNotifier, Notifier, NotifyError, TelegramNotifier};
pub use pipeline::{run_pipeline, PipelineError, PipelineOutput};
pub use report::{render_table, trailing_view, write_csv, NotifySummary, ReportError};
