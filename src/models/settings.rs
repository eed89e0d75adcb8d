use crate::models::model::{ConfigurationModel, GridEntry, MAX_GRID_QUANTITY};
use crate::models::schema::{FieldDefinition, FieldError, FieldKind, FieldValue, FIELDS};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The tool's own settings file (`ac_manager_config.json`).
///
/// A flat snapshot: the installation paths, the selected track, every schema field
/// keyed by its name, and the car grid. Keys not declared in the schema are ignored
/// when applying.
///
/// Deserializing is per key: a key with an unusable value keeps its default and is
/// recorded in `rejected` instead of failing the whole file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolSettings {
    pub game_path: String,

    pub server_path: String,

    pub debug_mode: bool,

    pub track: String,

    pub layout: String,

    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,

    #[serde(rename = "server_cars")]
    pub car_grid: Vec<GridEntry>,

    #[serde(skip)]
    pub rejected: Vec<FieldError>,
}

impl<'de> Deserialize<'de> for ToolSettings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self::from_map(map))
    }
}

/// Outcome of applying settings onto a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    pub applied: usize,
    pub failures: Vec<FieldError>,
}

impl ToolSettings {
    /// Build settings from a decoded JSON object, one key at a time.
    ///
    /// # Arguments
    /// * `map` - Every top-level key of the settings file
    ///
    /// # Returns
    /// The settings, with defaults for unusable keys and car rows listed in `rejected`.
    pub fn from_map(mut map: IndexMap<String, Value>) -> Self {
        let mut settings = Self::default();
        let mut rejected = Vec::new();

        if let Some(raw) = map.shift_remove("game_path") {
            settings.game_path = text_setting("game_path", raw, &mut rejected);
        }
        if let Some(raw) = map.shift_remove("server_path") {
            settings.server_path = text_setting("server_path", raw, &mut rejected);
        }
        if let Some(raw) = map.shift_remove("track") {
            settings.track = text_setting("track", raw, &mut rejected);
        }
        if let Some(raw) = map.shift_remove("layout") {
            settings.layout = text_setting("layout", raw, &mut rejected);
        }
        if let Some(raw) = map.shift_remove("debug_mode") {
            match raw {
                Value::Bool(b) => settings.debug_mode = b,
                Value::Number(ref n) if matches!(n.as_u64(), Some(0 | 1)) => {
                    settings.debug_mode = n.as_u64() == Some(1);
                }
                other => rejected.push(setting_error("debug_mode", "a boolean", &other)),
            }
        }
        if let Some(raw) = map.shift_remove("server_cars") {
            settings.car_grid = grid_setting(raw, &mut rejected);
        }

        for error in &rejected {
            tracing::debug!("Ignoring stored setting: {}", error);
        }
        settings.fields = map;
        settings.rejected = rejected;
        settings
    }

    /// Snapshot a model into the flat settings layout.
    pub fn capture(model: &ConfigurationModel) -> Self {
        let fields = model
            .fields()
            .map(|(def, value)| (def.name.to_string(), field_to_json(def, value)))
            .collect();

        Self {
            track: model.track.clone(),
            layout: model.layout.clone(),
            fields,
            car_grid: model.car_grid.clone(),
            ..Self::default()
        }
    }

    /// Copy every recognised field onto `model`, one field at a time.
    ///
    /// A value that cannot be converted leaves the model's current value untouched.
    /// Keys already rejected while reading the file are counted as failures too.
    pub fn apply_to(&self, model: &mut ConfigurationModel) -> ApplyOutcome {
        let mut outcome = ApplyOutcome {
            applied: 0,
            failures: self.rejected.clone(),
        };

        for def in FIELDS {
            let Some(raw) = self.fields.get(def.name) else {
                continue;
            };
            match field_from_json(def, raw).and_then(|value| model.set_field(def, value)) {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    tracing::debug!("Ignoring stored value for {}: {}", def.name, e);
                    outcome.failures.push(e);
                }
            }
        }

        if !self.track.is_empty() {
            model.track = self.track.clone();
            model.layout = self.layout.clone();
        }

        let grid: Vec<GridEntry> = self
            .car_grid
            .iter()
            .filter(|entry| entry.quantity > 0 && !entry.model.trim().is_empty())
            .map(|entry| GridEntry::new(entry.model.trim(), entry.quantity.min(MAX_GRID_QUANTITY)))
            .collect();
        if !grid.is_empty() {
            model.car_grid = grid;
        }

        outcome
    }
}

fn setting_error(key: &'static str, expected: &'static str, raw: &Value) -> FieldError {
    FieldError::Conversion {
        field: key,
        expected,
        value: raw.to_string(),
    }
}

fn text_setting(key: &'static str, raw: Value, rejected: &mut Vec<FieldError>) -> String {
    match raw {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => {
            rejected.push(setting_error(key, "a string", &other));
            String::new()
        }
    }
}

/// Car rows are kept individually; `qty` may be a number or a numeric string.
fn grid_setting(raw: Value, rejected: &mut Vec<FieldError>) -> Vec<GridEntry> {
    let rows = match raw {
        Value::Array(rows) => rows,
        other => {
            rejected.push(setting_error("server_cars", "a list of cars", &other));
            return Vec::new();
        }
    };

    let mut grid = Vec::with_capacity(rows.len());
    for row in rows {
        let model = row.get("model").and_then(Value::as_str);
        let quantity = match row.get("qty") {
            Some(Value::Number(n)) => n.as_u64().and_then(|q| u32::try_from(q).ok()),
            Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
            _ => None,
        };
        match (model, quantity) {
            (Some(model), Some(quantity)) => grid.push(GridEntry::new(model, quantity)),
            _ => rejected.push(setting_error("server_cars", "a car model and a quantity", &row)),
        }
    }
    grid
}

pub fn field_to_json(def: &FieldDefinition, value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => Value::from(s.as_str()),
        FieldValue::Integer(n) => Value::from(*n),
        FieldValue::Float(f) => Value::from(*f),
        FieldValue::Boolean(b) => Value::from(*b),
        FieldValue::Choice(_) => Value::from(def.display(value)),
    }
}

pub fn field_from_json(def: &FieldDefinition, raw: &Value) -> Result<FieldValue, FieldError> {
    let mismatch = || FieldError::Conversion {
        field: def.name,
        expected: "a value matching the field type",
        value: raw.to_string(),
    };

    let value = match (def.kind, raw) {
        (FieldKind::String, Value::String(s)) => FieldValue::Text(s.clone()),
        (FieldKind::Integer, Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(FieldValue::Integer)
            .ok_or_else(mismatch)?,
        (FieldKind::Float, Value::Number(n)) => n.as_f64().map(FieldValue::Float).ok_or_else(mismatch)?,
        (FieldKind::Boolean, Value::Bool(b)) => FieldValue::Boolean(*b),
        (FieldKind::Boolean, Value::Number(n)) => FieldValue::Boolean(n.as_i64() == Some(1)),
        (FieldKind::Enum, Value::Number(n)) => n
            .as_u64()
            .map(|i| FieldValue::Choice(i as usize))
            .ok_or_else(mismatch)?,
        (_, Value::String(s)) => return def.parse_input(s),
        _ => return Err(mismatch()),
    };
    def.coerce(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema;

    #[test]
    fn test_capture_then_apply_preserves_model() {
        let mut model = ConfigurationModel::new();
        model.set_from_input("server_name", "Night League").unwrap();
        model.set_from_input("abs_mode", "2").unwrap();
        model.set_from_input("sun_angle", "-45").unwrap();
        model.add_car("ks_porsche_911_gt3_r_2016", 4).unwrap();
        model.track = "ks_nurburgring".into();
        model.layout = "layout_gp_a".into();

        let settings = ToolSettings::capture(&model);
        assert_eq!(settings.fields["abs_mode"], Value::from("2 - Forced On"));

        let mut restored = ConfigurationModel::new();
        let outcome = settings.apply_to(&mut restored);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.applied, schema::FIELDS.len());
        assert_eq!(restored, model);
    }

    #[test]
    fn test_apply_is_best_effort_per_field() {
        let json = r#"{
            "game_path": "C:/Steam/assettocorsa",
            "udp_port": "not a port",
            "tcp_port": 9700,
            "loop_mode": false,
            "mystery_setting": 42,
            "server_cars": [{"model": "ks_mazda_mx5_cup", "qty": 8}]
        }"#;
        let settings: ToolSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.game_path, "C:/Steam/assettocorsa");

        let mut model = ConfigurationModel::new();
        let outcome = settings.apply_to(&mut model);

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(model.integer("udp_port"), Some(9600));
        assert_eq!(model.integer("tcp_port"), Some(9700));
        assert_eq!(model.boolean("loop_mode"), Some(false));
        assert_eq!(model.car_grid, vec![GridEntry::new("ks_mazda_mx5_cup", 8)]);
    }

    #[test]
    fn test_one_bad_key_keeps_the_rest() {
        let json = r#"{
            "game_path": "C:/AC",
            "server_path": "C:/srv",
            "debug_mode": "loud",
            "track": 7,
            "max_clients": 30,
            "server_cars": [
                {"model": "abarth500", "qty": "4"},
                {"model": "tatuusfa1", "qty": "many"},
                {"qty": 2}
            ]
        }"#;
        let settings: ToolSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.game_path, "C:/AC");
        assert_eq!(settings.server_path, "C:/srv");
        assert!(!settings.debug_mode);
        assert_eq!(settings.track, "");
        assert_eq!(settings.car_grid, vec![GridEntry::new("abarth500", 4)]);
        assert_eq!(settings.rejected.len(), 4);

        let mut model = ConfigurationModel::new();
        let outcome = settings.apply_to(&mut model);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.failures.len(), 4);
        assert_eq!(model.max_clients(), 30);
    }

    #[test]
    fn test_numeric_debug_flag() {
        let settings: ToolSettings = serde_json::from_str(r#"{"debug_mode": 1}"#).unwrap();
        assert!(settings.debug_mode);
        assert!(settings.rejected.is_empty());
    }

    #[test]
    fn test_oversized_grid_rows_are_clamped() {
        let json = r#"{"server_cars": [{"model": "a", "qty": 4294967295}, {"model": "b", "qty": 2}, {"model": "c", "qty": 4294967296}]}"#;
        let settings: ToolSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.rejected.len(), 1);

        let mut model = ConfigurationModel::new();
        settings.apply_to(&mut model);
        assert_eq!(
            model.car_grid,
            vec![GridEntry::new("a", MAX_GRID_QUANTITY), GridEntry::new("b", 2)]
        );
        assert_eq!(model.total_slots(), 52);
    }

    #[test]
    fn test_enum_accepts_legacy_forms() {
        let def = schema::field("start_rule").unwrap();
        assert_eq!(field_from_json(def, &Value::from(2)).unwrap(), FieldValue::Choice(2));
        assert_eq!(
            field_from_json(def, &Value::from("1 - Teleporta ao Pit")).unwrap(),
            FieldValue::Choice(1)
        );
    }
}
