//! Services module - configuration mapping and server management.
//!
//! Everything here is independent of the front end and can be exercised without a
//! running session.
//!
//! # Components
//!
//! - [`ini`]: lenient reader/writer for the server's INI files
//! - [`relaxed_json`]: track metadata reader tolerant of trailing commas
//! - [`server_config`]: model ⇄ `server_cfg.ini` / `csp_extra_options.ini`
//! - [`entry_list`]: car grid ⇄ `entry_list.ini` slots
//! - [`tracks`]: track, layout and pit-box discovery
//! - [`content`]: directory listing, text I/O, content linking
//! - [`process`]: server start/stop/kill
//! - [`installer`]: AssettoServer release download and extraction
//!
//! The first five are pure over text or over a [`ContentSource`]; only `content`,
//! `process` and `installer` touch the OS directly.

pub mod content;
pub mod entry_list;
pub mod ini;
pub mod installer;
pub mod process;
pub mod relaxed_json;
pub mod server_config;
pub mod tracks;

pub use content::{ContentSource, LinkOutcome, LocalContent};
pub use entry_list::{EntryListError, EntrySlot};
pub use ini::IniDocument;
pub use installer::{InstallError, InstallSummary, Installer};
pub use process::{ProcessError, ServerStatus, ServerSupervisor};
pub use server_config::{LoadReport, RenderedConfig};
pub use tracks::TrackLayout;
