//! Photoroom Batch Common Library
//!
//! ネットワークに依存しない型とユーティリティ

pub mod barcode;
pub mod error;
pub mod options;
pub mod outcome;
pub mod presets;
pub mod types;

pub use barcode::extract_key;
pub use error::{Error, Result};
pub use options::{
    AiBackground, AiResize, ApiTier, EdgeInsets, EditRequestConfig, OutputFormat, OutputSize,
    Relighting, Segmentation,
};
pub use outcome::{BatchSummary, FailureKind, OperationOutcome, Stage, UploadStatus};
pub use presets::{find_preset, Preset, PRESETS};
pub use types::{CatalogRecord, ImageRef, ImageSource, WorkItem};
