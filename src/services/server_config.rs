//! Mapping between the [`ConfigurationModel`] and the server's `cfg/` files.
//!
//! Loading is best-effort per field: a malformed value keeps the model's current
//! value and is recorded in the [`LoadReport`]. Rendering is a pure function of the
//! model; writing the text is left to the caller.

use crate::models::schema::{self, ConfigFile, Encoding, FieldError, FieldValue};
use crate::models::ConfigurationModel;
use crate::services::content::ContentSource;
use crate::services::entry_list;
use crate::services::ini::IniDocument;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

pub const CFG_DIR: &str = "cfg";
pub const SERVER_CFG: &str = "server_cfg.ini";
pub const CSP_EXTRA_OPTIONS: &str = "csp_extra_options.ini";
pub const ENTRY_LIST: &str = "entry_list.ini";

pub fn file_name(file: ConfigFile) -> &'static str {
    match file {
        ConfigFile::ServerCfg => SERVER_CFG,
        ConfigFile::CspExtraOptions => CSP_EXTRA_OPTIONS,
    }
}

/// `<server>/cfg/<name>`
pub fn cfg_path(server_dir: &Utf8Path, name: &str) -> Utf8PathBuf {
    server_dir.join(CFG_DIR).join(name)
}

/// One section of a rendered file: constant keys written before and after the
/// section's schema fields.
struct SectionLayout {
    name: &'static str,
    leading: &'static [(&'static str, &'static str)],
    trailing: &'static [(&'static str, &'static str)],
}

impl SectionLayout {
    const fn plain(name: &'static str) -> Self {
        Self {
            name,
            leading: &[],
            trailing: &[],
        }
    }
}

/// Section order of `server_cfg.ini`. The server expects the session blocks in
/// BOOKING, PRACTICE, QUALIFY, RACE order.
static SERVER_CFG_LAYOUT: &[SectionLayout] = &[
    SectionLayout {
        name: "SERVER",
        leading: &[],
        trailing: &[
            ("SEND_BUFFER_SIZE", "0"),
            ("BLACKLIST_MODE", "1"),
            ("UDP_PLUGIN_LOCAL_PORT", "0"),
            ("UDP_PLUGIN_ADDRESS", ""),
            ("AUTH_PLUGIN_ADDRESS", ""),
            ("EXTERNAL_SERVER_IP", ""),
        ],
    },
    SectionLayout::plain("DYNAMIC_TRACK"),
    SectionLayout {
        name: "BOOKING",
        leading: &[("NAME", "Booking")],
        trailing: &[],
    },
    SectionLayout {
        name: "PRACTICE",
        leading: &[("NAME", "Practice")],
        trailing: &[("IS_OPEN", "1")],
    },
    SectionLayout {
        name: "QUALIFY",
        leading: &[("NAME", "Qualify")],
        trailing: &[("IS_OPEN", "1")],
    },
    SectionLayout {
        name: "RACE",
        leading: &[("NAME", "Race")],
        trailing: &[("IS_OPEN", "1")],
    },
    SectionLayout::plain("WEATHER_0"),
];

static CSP_LAYOUT: &[SectionLayout] = &[
    SectionLayout::plain("PITS_SPEED_LIMITER"),
    SectionLayout::plain("EXTRA_RULES"),
];

const SERVER_SECTION: &str = "SERVER";

/// Text of both configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub server_cfg: String,
    pub csp_options: String,
}

/// What a load adopted and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub applied: usize,
    pub failures: Vec<FieldError>,
    pub missing_files: Vec<&'static str>,
    pub grid_restored: bool,
    pub track_restored: bool,
}

impl LoadReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// One-line summary for the operator.
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} fields loaded", self.applied)];

        if !self.failures.is_empty() {
            parts.push(format!("{} kept previous value", self.failures.len()));
        }
        if self.grid_restored {
            parts.push("grid restored from entry list".to_string());
        }
        if !self.missing_files.is_empty() {
            parts.push(format!("not found: {}", self.missing_files.join(", ")));
        }

        parts.join(", ")
    }
}

/// Adopt every field of `file` found in `doc`.
///
/// Section-toggle fields take the presence of their section; every other field is
/// converted independently and keeps its current value when conversion fails.
pub fn apply_document(
    model: &mut ConfigurationModel,
    doc: &IniDocument,
    file: ConfigFile,
    report: &mut LoadReport,
) {
    for def in schema::fields_in(file) {
        let result = if def.encoding == Encoding::SectionToggle {
            model.set_field(def, FieldValue::Boolean(doc.has_section(def.section)))
        } else {
            let Some(raw) = doc.get(def.section, def.key) else {
                continue;
            };
            def.parse_disk(raw).and_then(|value| model.set_field(def, value))
        };

        match result {
            Ok(()) => report.applied += 1,
            Err(e) => {
                tracing::debug!("Keeping previous value of {}: {}", def.name, e);
                report.failures.push(e);
            }
        }
    }

    if file == ConfigFile::ServerCfg {
        let track = doc.get(SERVER_SECTION, "TRACK").unwrap_or_default();
        if !track.is_empty() {
            model.track = track.to_string();
            model.layout = doc
                .get(SERVER_SECTION, "CONFIG_TRACK")
                .unwrap_or_default()
                .to_string();
            report.track_restored = true;
        }
    }
}

/// Overlay the server's existing `cfg/` files onto `model`.
///
/// Missing files are not errors: a fresh server install has none yet.
pub fn load_from_server_directory(
    source: &impl ContentSource,
    server_dir: &Utf8Path,
    model: &mut ConfigurationModel,
) -> LoadReport {
    let mut report = LoadReport::default();

    for file in [ConfigFile::ServerCfg, ConfigFile::CspExtraOptions] {
        if let Some(doc) = read_document(source, server_dir, file_name(file), &mut report) {
            apply_document(model, &doc, file, &mut report);
        }
    }

    if let Some(doc) = read_document(source, server_dir, ENTRY_LIST, &mut report) {
        let grid = entry_list::grid_from_entry_list(&doc);
        if !grid.is_empty() {
            model.car_grid = grid;
            report.grid_restored = true;
        }
    }

    tracing::info!("Loaded server configuration from {}: {}", server_dir, report.summary());
    report
}

fn read_document(
    source: &impl ContentSource,
    server_dir: &Utf8Path,
    name: &'static str,
    report: &mut LoadReport,
) -> Option<IniDocument> {
    let path = cfg_path(server_dir, name);
    if !source.is_file(&path) {
        report.missing_files.push(name);
        return None;
    }
    match source.read_text(&path) {
        Ok(text) => Some(IniDocument::parse(&text)),
        Err(e) => {
            tracing::warn!("{:#}", e);
            report.missing_files.push(name);
            None
        }
    }
}

/// Build the INI document for one file.
///
/// `[SERVER]` also carries the derived `CARS` (distinct grid models, in order of
/// first appearance), `TRACK` and `CONFIG_TRACK` keys right after `NAME`.
pub fn to_document(model: &ConfigurationModel, file: ConfigFile) -> IniDocument {
    let layout = match file {
        ConfigFile::ServerCfg => SERVER_CFG_LAYOUT,
        ConfigFile::CspExtraOptions => CSP_LAYOUT,
    };

    let mut doc = IniDocument::new();
    for section in layout {
        let enabled = schema::section_toggle(section.name)
            .and_then(|toggle| model.boolean(toggle.name))
            .unwrap_or(true);
        if !enabled {
            continue;
        }

        let entries = doc.section_mut(section.name);
        for (key, value) in section.leading {
            entries.insert(key.to_string(), value.to_string());
        }

        let fields = schema::fields_in(file)
            .filter(|def| def.section == section.name && def.encoding != Encoding::SectionToggle);
        for def in fields {
            let Some(value) = model.get(def.name) else {
                continue;
            };
            entries.insert(def.key.to_string(), def.render_disk(value));

            if section.name == SERVER_SECTION && def.key == "NAME" {
                entries.insert("CARS".to_string(), model.unique_models().join(";"));
                entries.insert("TRACK".to_string(), model.track.clone());
                entries.insert("CONFIG_TRACK".to_string(), model.layout.clone());
            }
        }

        for (key, value) in section.trailing {
            entries.insert(key.to_string(), value.to_string());
        }
    }
    doc
}

/// Render both configuration files. Capacity is not checked here; see
/// [`ConfigurationModel::check_capacity`].
pub fn render(model: &ConfigurationModel) -> RenderedConfig {
    RenderedConfig {
        server_cfg: to_document(model, ConfigFile::ServerCfg).render(),
        csp_options: to_document(model, ConfigFile::CspExtraOptions).render(),
    }
}

/// Write both rendered files under `<server>/cfg/`, returning the paths written.
pub fn write_to_server_directory(
    source: &impl ContentSource,
    server_dir: &Utf8Path,
    rendered: &RenderedConfig,
) -> Result<Vec<Utf8PathBuf>> {
    let server_cfg = cfg_path(server_dir, SERVER_CFG);
    source.write_text(&server_cfg, &rendered.server_cfg)?;

    let csp = cfg_path(server_dir, CSP_EXTRA_OPTIONS);
    source.write_text(&csp, &rendered.csp_options)?;

    Ok(vec![server_cfg, csp])
}
