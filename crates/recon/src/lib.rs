//! `snapfix-recon`: Golden dataset reconciliation.
//!
//! Pure engine crate: receives an expected table and fetched rows, returns a
//! structured diff and renders it. No database or IO dependencies.

pub mod markup;
pub mod matcher;
pub mod model;
pub mod render;
mod textdiff;

pub use markup::{MarkupComparator, XmlComparator};
pub use matcher::{reconcile, Differ};
pub use model::{DiffReport, DiffSummary, FieldMismatch, RecordFailure, TableDiff};
pub use render::{render, render_with, RenderOptions};
