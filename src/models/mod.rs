//! Data models for the AC Server Manager.
//!
//! - [`schema`]: the static table of every configurable field, with its on-disk key,
//!   value kind, default and bounds
//! - [`ConfigurationModel`]: current field values, the car grid and the track selection
//! - [`ToolSettings`]: the tool's own JSON settings snapshot
//! - [`SessionState`]: everything the interactive session shows and edits
//!
//! # Lifecycle
//!
//! A [`ConfigurationModel`] starts from schema defaults, is overwritten by the tool's
//! settings file, then by whatever the target server's `cfg/` files contain. It is only
//! written back on an explicit save.

pub mod model;
pub mod schema;
pub mod session;
pub mod settings;

pub use model::{CapacityMismatch, ConfigurationModel, GridEntry, GridError, MAX_GRID_QUANTITY};
pub use schema::{ConfigFile, Encoding, FieldDefinition, FieldError, FieldKind, FieldValue, FIELDS};
pub use session::SessionState;
pub use settings::ToolSettings;
