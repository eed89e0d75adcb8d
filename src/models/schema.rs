//! Static schema of every configurable server field.
//!
//! Each [`FieldDefinition`] binds a session-level field name to its on-disk location
//! (file, section, key), its value kind, its default, and its validation bounds.
//! The table in [`FIELDS`] is declared in the order keys are written to disk.

use thiserror::Error;

/// Labels for the ABS and traction-control modes, persisted as their index.
pub const ASSIST_MODES: &[&str] = &["Off", "Factory", "Forced On"];

/// Labels for the race start rule, persisted as their index.
pub const START_RULES: &[&str] = &[
    "Car locked on start",
    "Teleport to pits",
    "Drive-through penalty",
];

/// Weather presets shipped with the game.
pub const WEATHER_PRESETS: &[&str] = &[
    "1_heavy_fog",
    "2_light_fog",
    "3_clear",
    "4_mid_clear",
    "5_light_clouds",
    "6_mid_clouds",
    "7_heavy_clouds",
    "8_rain",
    "9_thunderstorm",
];

/// Which external file a field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigFile {
    /// `cfg/server_cfg.ini`
    ServerCfg,
    /// `cfg/csp_extra_options.ini`
    CspExtraOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::String => "text",
            FieldKind::Integer => "an integer",
            FieldKind::Float => "a number",
            FieldKind::Boolean => "a boolean",
            FieldKind::Enum => "one of the listed options",
        }
    }
}

/// How a field's value is represented on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Written as-is (`1`/`0` for booleans).
    Plain,
    /// Boolean stored negated: `true` is written as `0`.
    Inverted,
    /// Boolean expressed by the presence of the field's section; it has no key.
    SectionToggle,
}

/// Compile-time default of a field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Choice(usize),
}

/// Current value of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// Index into the field's `enum_values`.
    Choice(usize),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            FieldValue::Choice(i) => Some(*i as i64),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

/// Errors raised when a value cannot be assigned to a field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{field}' expects {expected}, got '{value}'")]
    Conversion {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDefinition {
    /// Session-level field name, also the key in the tool's settings file.
    pub name: &'static str,
    pub file: ConfigFile,
    pub section: &'static str,
    /// On-disk key; empty for [`Encoding::SectionToggle`] fields.
    pub key: &'static str,
    pub kind: FieldKind,
    pub default: DefaultValue,
    /// Inclusive bounds for integer and float fields.
    pub range: Option<(i64, i64)>,
    pub enum_values: Option<&'static [&'static str]>,
    pub encoding: Encoding,
}

impl FieldDefinition {
    const fn new(
        name: &'static str,
        section: &'static str,
        key: &'static str,
        kind: FieldKind,
        default: DefaultValue,
    ) -> Self {
        Self {
            name,
            file: ConfigFile::ServerCfg,
            section,
            key,
            kind,
            default,
            range: None,
            enum_values: None,
            encoding: Encoding::Plain,
        }
    }

    const fn text(name: &'static str, section: &'static str, key: &'static str, default: &'static str) -> Self {
        Self::new(name, section, key, FieldKind::String, DefaultValue::Text(default))
    }

    const fn integer(
        name: &'static str,
        section: &'static str,
        key: &'static str,
        default: i64,
        min: i64,
        max: i64,
    ) -> Self {
        let mut def = Self::new(name, section, key, FieldKind::Integer, DefaultValue::Integer(default));
        def.range = Some((min, max));
        def
    }

    const fn boolean(name: &'static str, section: &'static str, key: &'static str, default: bool) -> Self {
        Self::new(name, section, key, FieldKind::Boolean, DefaultValue::Boolean(default))
    }

    const fn choice(
        name: &'static str,
        section: &'static str,
        key: &'static str,
        labels: &'static [&'static str],
        default: usize,
    ) -> Self {
        let mut def = Self::new(name, section, key, FieldKind::Enum, DefaultValue::Choice(default));
        def.enum_values = Some(labels);
        def
    }

    const fn toggle(name: &'static str, section: &'static str, default: bool) -> Self {
        let mut def = Self::boolean(name, section, "", default);
        def.encoding = Encoding::SectionToggle;
        def
    }

    const fn inverted(mut self) -> Self {
        self.encoding = Encoding::Inverted;
        self
    }

    const fn csp(mut self) -> Self {
        self.file = ConfigFile::CspExtraOptions;
        self
    }

    pub fn default_value(&self) -> FieldValue {
        match self.default {
            DefaultValue::Text(s) => FieldValue::Text(s.to_string()),
            DefaultValue::Integer(n) => FieldValue::Integer(n),
            DefaultValue::Float(f) => FieldValue::Float(f),
            DefaultValue::Boolean(b) => FieldValue::Boolean(b),
            DefaultValue::Choice(i) => FieldValue::Choice(i),
        }
    }

    fn conversion_error(&self, value: impl Into<String>) -> FieldError {
        FieldError::Conversion {
            field: self.name,
            expected: self.kind.describe(),
            value: value.into(),
        }
    }

    /// Validate a value against this field, clamping numbers into range.
    ///
    /// Text is trimmed the way `parse_disk` trims it. Line breaks are rejected
    /// since an INI value cannot span lines.
    pub fn coerce(&self, value: FieldValue) -> Result<FieldValue, FieldError> {
        match (self.kind, value) {
            (FieldKind::String, FieldValue::Text(s)) if s.contains(['\r', '\n']) => {
                Err(self.conversion_error(s))
            }
            (FieldKind::String, FieldValue::Text(s)) => Ok(FieldValue::Text(s.trim().to_string())),
            (FieldKind::Integer, FieldValue::Integer(n)) => Ok(FieldValue::Integer(self.clamp_int(n))),
            (FieldKind::Float, FieldValue::Float(f)) if f.is_finite() => {
                Ok(FieldValue::Float(self.clamp_float(f)))
            }
            (FieldKind::Float, FieldValue::Integer(n)) => Ok(FieldValue::Float(self.clamp_float(n as f64))),
            (FieldKind::Boolean, FieldValue::Boolean(b)) => Ok(FieldValue::Boolean(b)),
            (FieldKind::Enum, FieldValue::Choice(i)) if i < self.choice_count() => Ok(FieldValue::Choice(i)),
            (_, other) => Err(self.conversion_error(format!("{:?}", other))),
        }
    }

    fn clamp_int(&self, n: i64) -> i64 {
        match self.range {
            Some((min, max)) => n.clamp(min, max),
            None => n,
        }
    }

    fn clamp_float(&self, f: f64) -> f64 {
        match self.range {
            Some((min, max)) => f.clamp(min as f64, max as f64),
            None => f,
        }
    }

    fn choice_count(&self) -> usize {
        self.enum_values.map_or(0, <[_]>::len)
    }

    /// Decode a raw value read from an INI file.
    pub fn parse_disk(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let trimmed = raw.trim();
        let value = match self.kind {
            FieldKind::String => FieldValue::Text(trimmed.to_string()),
            FieldKind::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| self.conversion_error(raw))?,
            FieldKind::Float => trimmed
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| self.conversion_error(raw))?,
            FieldKind::Boolean => match self.encoding {
                Encoding::Inverted => FieldValue::Boolean(trimmed == "0"),
                _ => FieldValue::Boolean(trimmed == "1"),
            },
            FieldKind::Enum => trimmed
                .parse::<usize>()
                .map(FieldValue::Choice)
                .map_err(|_| self.conversion_error(raw))?,
        };
        self.coerce(value)
    }

    /// Encode a value for an INI file.
    pub fn render_disk(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Float(f) => format_float(*f),
            FieldValue::Boolean(b) => {
                let on = match self.encoding {
                    Encoding::Inverted => !*b,
                    _ => *b,
                };
                String::from(if on { "1" } else { "0" })
            }
            FieldValue::Choice(i) => i.to_string(),
        }
    }

    /// Parse operator input: `"<index> - <label>"`, a bare index, or a label for enums;
    /// `true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0` for booleans.
    pub fn parse_input(&self, input: &str) -> Result<FieldValue, FieldError> {
        let trimmed = input.trim();
        let value = match self.kind {
            FieldKind::String => FieldValue::Text(input.to_string()),
            FieldKind::Integer => trimmed
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| self.conversion_error(input))?,
            FieldKind::Float => trimmed
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| self.conversion_error(input))?,
            FieldKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => FieldValue::Boolean(true),
                "0" | "false" | "no" | "off" => FieldValue::Boolean(false),
                _ => return Err(self.conversion_error(input)),
            },
            FieldKind::Enum => self
                .choice_from_label(trimmed)
                .map(FieldValue::Choice)
                .ok_or_else(|| self.conversion_error(input))?,
        };
        self.coerce(value)
    }

    fn choice_from_label(&self, input: &str) -> Option<usize> {
        let labels = self.enum_values?;
        let leading = input.split(" - ").next().unwrap_or(input).trim();
        if let Ok(index) = leading.parse::<usize>() {
            return Some(index);
        }
        labels.iter().position(|label| label.eq_ignore_ascii_case(input))
    }

    /// Operator-facing rendering of a value.
    pub fn display(&self, value: &FieldValue) -> String {
        match value {
            FieldValue::Choice(i) => {
                let label = self
                    .enum_values
                    .and_then(|labels| labels.get(*i))
                    .copied()
                    .unwrap_or("?");
                format!("{} - {}", i, label)
            }
            FieldValue::Boolean(b) => b.to_string(),
            other => self.render_disk(other),
        }
    }
}

/// Whole numbers are written without a fractional part.
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 {
        format!("{:.0}", f)
    } else {
        f.to_string()
    }
}

use FieldDefinition as F;

/// Every configurable field, in on-disk order.
pub static FIELDS: &[FieldDefinition] = &[
    // [SERVER]
    F::text("server_name", "SERVER", "NAME", "My AC Server"),
    F::new("sun_angle", "SERVER", "SUN_ANGLE", FieldKind::Float, DefaultValue::Float(0.0)).with_range(-80, 80),
    F::text("server_password", "SERVER", "PASSWORD", ""),
    F::text("admin_password", "SERVER", "ADMIN_PASSWORD", "admin1234"),
    F::integer("udp_port", "SERVER", "UDP_PORT", 9600, 1024, 65535),
    F::integer("tcp_port", "SERVER", "TCP_PORT", 9600, 1024, 65535),
    F::integer("http_port", "SERVER", "HTTP_PORT", 8081, 1024, 65535),
    F::integer("max_ballast", "SERVER", "MAX_BALLAST_KG", 0, 0, 300),
    F::integer("qualify_max_wait", "SERVER", "QUALIFY_MAX_WAIT_PERC", 120, 50, 200),
    F::integer("pit_window_start", "SERVER", "RACE_PIT_WINDOW_START", 0, 0, 999),
    F::integer("pit_window_end", "SERVER", "RACE_PIT_WINDOW_END", 0, 0, 999),
    F::integer("reversed_grid", "SERVER", "REVERSED_GRID_RACE_POSITIONS", 0, 0, 100),
    F::boolean("locked_entry", "SERVER", "LOCKED_ENTRY_LIST", false),
    F::boolean("pickup_mode", "SERVER", "PICKUP_MODE_ENABLED", true),
    F::boolean("loop_mode", "SERVER", "LOOP_MODE", true),
    F::integer("sleep_time", "SERVER", "SLEEP_TIME", 1, 0, 100),
    F::integer("client_send_hz", "SERVER", "CLIENT_SEND_INTERVAL_HZ", 18, 10, 60),
    F::integer("race_over_time", "SERVER", "RACE_OVER_TIME", 180, 30, 600),
    F::integer("kick_quorum", "SERVER", "KICK_QUORUM", 85, 0, 100),
    F::integer("voting_quorum", "SERVER", "VOTING_QUORUM", 80, 0, 100),
    F::integer("vote_duration", "SERVER", "VOTE_DURATION", 20, 5, 120),
    F::integer("fuel_rate", "SERVER", "FUEL_RATE", 100, 0, 400),
    F::integer("damage_rate", "SERVER", "DAMAGE_MULTIPLIER", 50, 0, 400),
    F::integer("tyre_wear", "SERVER", "TYRE_WEAR_RATE", 100, 0, 400),
    F::integer("allowed_tyres_out", "SERVER", "ALLOWED_TYRES_OUT", 2, 0, 4),
    F::choice("abs_mode", "SERVER", "ABS_ALLOWED", ASSIST_MODES, 1),
    F::choice("tc_mode", "SERVER", "TC_ALLOWED", ASSIST_MODES, 1),
    F::boolean("stability_allowed", "SERVER", "STABILITY_ALLOWED", false),
    F::boolean("autoclutch_allowed", "SERVER", "AUTOCLUTCH_ALLOWED", true),
    F::boolean("tyre_blankets", "SERVER", "TYRE_BLANKETS_ALLOWED", true),
    F::boolean("force_virtual_mirror", "SERVER", "FORCE_VIRTUAL_MIRROR", false),
    F::choice("start_rule", "SERVER", "START_RULE", START_RULES, 0),
    F::boolean("race_gas_penalty", "SERVER", "RACE_GAS_PENALTY_DISABLED", false).inverted(),
    F::integer("time_mult", "SERVER", "TIME_OF_DAY_MULT", 1, 0, 60),
    F::integer("result_screen_time", "SERVER", "RESULT_SCREEN_TIME", 60, 10, 300),
    F::integer("max_contacts_km", "SERVER", "MAX_CONTACTS_PER_KM", -1, -1, 50),
    F::boolean("register_lobby", "SERVER", "REGISTER_TO_LOBBY", true),
    F::integer("max_clients", "SERVER", "MAX_CLIENTS", 24, 1, 100),
    F::integer("num_threads", "SERVER", "NUM_THREADS", 2, 1, 8),
    F::text("legal_tyres", "SERVER", "LEGAL_TYRES", "V;E;H;M;S;SS;US;ST;I;W"),
    F::integer("pit_speed_limit", "SERVER", "PIT_SPEED_LIMIT", 80, 20, 99999),
    F::text("welcome_msg", "SERVER", "WELCOME_MESSAGE", ""),
    // [DYNAMIC_TRACK]
    F::integer("dyn_start", "DYNAMIC_TRACK", "SESSION_START", 95, 50, 100),
    F::integer("dyn_random", "DYNAMIC_TRACK", "RANDOMNESS", 1, 0, 10),
    F::integer("dyn_lap_gain", "DYNAMIC_TRACK", "LAP_GAIN", 15, 0, 100),
    F::integer("dyn_transfer", "DYNAMIC_TRACK", "SESSION_TRANSFER", 90, 0, 100),
    // Sessions
    F::toggle("booking_enabled", "BOOKING", false),
    F::integer("booking_time", "BOOKING", "TIME", 5, 1, 60),
    F::toggle("practice_enabled", "PRACTICE", true),
    F::integer("practice_time", "PRACTICE", "TIME", 10, 0, 180),
    F::toggle("qualify_enabled", "QUALIFY", true),
    F::integer("qualify_time", "QUALIFY", "TIME", 10, 0, 60),
    F::integer("race_laps", "RACE", "LAPS", 5, 1, 999),
    F::integer("race_wait_time", "RACE", "WAIT_TIME", 60, 10, 300),
    // [WEATHER_0]
    F::text("weather_type", "WEATHER_0", "GRAPHICS", "3_clear"),
    F::integer("temp_ambient", "WEATHER_0", "BASE_TEMPERATURE_AMBIENT", 26, -10, 50),
    F::integer("temp_var_ambient", "WEATHER_0", "VARIATION_AMBIENT", 2, 0, 15),
    F::integer("temp_road", "WEATHER_0", "BASE_TEMPERATURE_ROAD", 34, 0, 70),
    F::integer("temp_var_road", "WEATHER_0", "VARIATION_ROAD", 2, 0, 15),
    F::integer("wind_min", "WEATHER_0", "WIND_BASE_SPEED_MIN", 0, 0, 100),
    F::integer("wind_max", "WEATHER_0", "WIND_BASE_SPEED_MAX", 5, 0, 100),
    F::integer("wind_dir", "WEATHER_0", "WIND_BASE_DIRECTION", 30, 0, 359),
    F::integer("wind_var", "WEATHER_0", "WIND_VARIATION_DIRECTION", 15, 0, 180),
    // csp_extra_options.ini
    F::boolean("csp_disable_pit_limiter", "PITS_SPEED_LIMITER", "DISABLE_FORCED", false).csp(),
    F::integer("csp_pit_speed", "PITS_SPEED_LIMITER", "SPEED_KMH", 80, 20, 99999).csp(),
    F::boolean("csp_keep_collisions", "PITS_SPEED_LIMITER", "KEEP_COLLISIONS", false).csp(),
    F::boolean("csp_allow_wrong_way", "EXTRA_RULES", "ALLOW_WRONG_WAY", true).csp(),
];

impl FieldDefinition {
    const fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// Look up a field by its session-level name.
pub fn field(name: &str) -> Option<&'static FieldDefinition> {
    FIELDS.iter().find(|def| def.name == name)
}

/// Fields stored in the given file, in declaration order.
pub fn fields_in(file: ConfigFile) -> impl Iterator<Item = &'static FieldDefinition> {
    FIELDS.iter().filter(move |def| def.file == file)
}

/// The boolean field that controls whether `section` is written at all.
pub fn section_toggle(section: &str) -> Option<&'static FieldDefinition> {
    FIELDS
        .iter()
        .find(|def| def.encoding == Encoding::SectionToggle && def.section == section)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique() {
        let mut seen = HashSet::new();
        for def in FIELDS {
            assert!(seen.insert(def.name), "duplicate field {}", def.name);
        }
    }

    #[test]
    fn test_defaults_satisfy_constraints() {
        for def in FIELDS {
            let default = def.default_value();
            assert_eq!(def.coerce(default.clone()).unwrap(), default, "{}", def.name);
        }
    }

    #[test]
    fn test_keys_present_except_toggles() {
        for def in FIELDS {
            match def.encoding {
                Encoding::SectionToggle => assert!(def.key.is_empty()),
                _ => assert!(!def.key.is_empty(), "{} has no key", def.name),
            }
        }
    }

    #[test]
    fn test_integer_clamped_on_disk_parse() {
        let def = field("max_clients").unwrap();
        assert_eq!(def.parse_disk("500").unwrap(), FieldValue::Integer(100));
        assert_eq!(def.parse_disk("0").unwrap(), FieldValue::Integer(1));
        assert!(def.parse_disk("many").is_err());
    }

    #[test]
    fn test_gas_penalty_inversion() {
        let def = field("race_gas_penalty").unwrap();
        assert_eq!(def.key, "RACE_GAS_PENALTY_DISABLED");
        assert_eq!(def.render_disk(&FieldValue::Boolean(true)), "0");
        assert_eq!(def.render_disk(&FieldValue::Boolean(false)), "1");
        assert_eq!(def.parse_disk("0").unwrap(), FieldValue::Boolean(true));
        assert_eq!(def.parse_disk("1").unwrap(), FieldValue::Boolean(false));
    }

    #[test]
    fn test_enum_display_and_input() {
        let def = field("abs_mode").unwrap();
        assert_eq!(def.display(&FieldValue::Choice(2)), "2 - Forced On");
        assert_eq!(def.parse_input("0 - Off").unwrap(), FieldValue::Choice(0));
        assert_eq!(def.parse_input("2").unwrap(), FieldValue::Choice(2));
        assert_eq!(def.parse_input("factory").unwrap(), FieldValue::Choice(1));
        assert!(def.parse_input("7").is_err());
        assert!(def.parse_disk("9").is_err());
    }

    #[test]
    fn test_sun_angle_float() {
        let def = field("sun_angle").unwrap();
        assert_eq!(def.parse_disk("-12.5").unwrap(), FieldValue::Float(-12.5));
        assert_eq!(def.parse_disk("120").unwrap(), FieldValue::Float(80.0));
        assert_eq!(def.render_disk(&FieldValue::Float(16.0)), "16");
        assert_eq!(def.render_disk(&FieldValue::Float(-12.5)), "-12.5");
    }

    #[test]
    fn test_boolean_input_forms() {
        let def = field("loop_mode").unwrap();
        assert_eq!(def.parse_input("yes").unwrap(), FieldValue::Boolean(true));
        assert_eq!(def.parse_input("OFF").unwrap(), FieldValue::Boolean(false));
        assert!(def.parse_input("maybe").is_err());
    }

    #[test]
    fn test_text_is_trimmed_and_single_line() {
        let def = field("server_name").unwrap();
        assert_eq!(def.parse_input("  Padded  ").unwrap(), FieldValue::Text("Padded".into()));
        assert_eq!(
            def.coerce(FieldValue::Text(" Friday = Night ".into())).unwrap(),
            FieldValue::Text("Friday = Night".into())
        );

        let welcome = field("welcome_msg").unwrap();
        assert!(welcome.parse_input("hi\nMAX_CLIENTS=1").is_err());
        assert!(welcome.parse_input("hi\r").is_err());
        assert!(welcome.coerce(FieldValue::Text("a\r\nb".into())).is_err());
    }

    #[test]
    fn test_section_toggles() {
        assert_eq!(section_toggle("PRACTICE").unwrap().name, "practice_enabled");
        assert!(section_toggle("RACE").is_none());
        assert_eq!(fields_in(ConfigFile::CspExtraOptions).count(), 4);
    }
}
