//! Lenient reader/writer for the server's INI dialect.
//!
//! Section and key names are kept exactly as written: the server matches them
//! case-sensitively. Parsing never fails; lines it cannot interpret are skipped.

use indexmap::IndexMap;
use std::fmt;

pub type IniSection = IndexMap<String, String>;

/// Parsed INI content, keeping sections and keys in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: IndexMap<String, IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI text.
    ///
    /// - A leading UTF-8 byte-order mark is ignored
    /// - Lines starting with `;` or `#` are comments
    /// - `KEY=VALUE` splits on the first `=`; both sides are trimmed
    /// - A repeated section is merged into the first; a repeated key keeps the last value
    /// - Keys before the first section header are dropped
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut doc = Self::new();
        let mut current: Option<String> = None;

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                let name = name.trim().to_string();
                doc.sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::trace!("Skipping unrecognised INI line {}: {}", line_no + 1, line);
                continue;
            };

            match &current {
                Some(section) => doc.set(section, key.trim(), value.trim()),
                None => tracing::trace!("Skipping key outside any section on line {}", line_no + 1),
            }
        }

        doc
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.contains_key(name)
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.get(name)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &IniSection)> {
        self.sections.iter().map(|(name, entries)| (name.as_str(), entries))
    }

    /// Get or append a section.
    pub fn section_mut(&mut self, name: &str) -> &mut IniSection {
        self.sections.entry(name.to_string()).or_default()
    }

    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.section_mut(section).insert(key.to_string(), value.into());
    }

    /// Render one `[SECTION]` header per section followed by its `KEY=VALUE` lines,
    /// with a blank line between sections.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (index, (name, entries)) in self.sections.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
            for (key, value) in entries {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }
}

impl fmt::Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
