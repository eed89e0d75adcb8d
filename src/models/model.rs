use crate::models::schema::{self, FieldDefinition, FieldError, FieldValue, FIELDS};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest quantity accepted for a single grid entry.
pub const MAX_GRID_QUANTITY: u32 = 50;

/// One line of the car grid: a car model and how many slots it occupies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridEntry {
    pub model: String,
    #[serde(rename = "qty")]
    pub quantity: u32,
}

impl GridEntry {
    pub fn new(model: impl Into<String>, quantity: u32) -> Self {
        Self {
            model: model.into(),
            quantity,
        }
    }
}

/// The grid holds more slots than the server accepts clients.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Grid has {total_slots} slots but MAX_CLIENTS is {max_clients}")]
pub struct CapacityMismatch {
    pub total_slots: u32,
    pub max_clients: i64,
}

impl CapacityMismatch {
    /// The `MAX_CLIENTS` value that would resolve the mismatch.
    pub fn suggested_max_clients(&self) -> i64 {
        i64::from(self.total_slots)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Car model name is empty")]
    EmptyModel,

    #[error("Quantity must be between 1 and {MAX_GRID_QUANTITY}, got {0}")]
    InvalidQuantity(u32),

    #[error("No grid entry at index {index} (grid has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Current value of every schema field plus the car grid and track selection.
///
/// Values always satisfy their field's constraints: every mutation goes through
/// [`FieldDefinition::coerce`], so out-of-range input is clamped and mistyped
/// input is rejected without touching the stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationModel {
    values: IndexMap<&'static str, FieldValue>,
    pub car_grid: Vec<GridEntry>,
    pub track: String,
    pub layout: String,
}

impl Default for ConfigurationModel {
    fn default() -> Self {
        Self {
            values: FIELDS
                .iter()
                .map(|def| (def.name, def.default_value()))
                .collect(),
            car_grid: Vec::new(),
            track: String::new(),
            layout: String::new(),
        }
    }
}

impl ConfigurationModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Assign a field, validating and clamping against its definition.
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<(), FieldError> {
        let def = schema::field(name).ok_or_else(|| FieldError::UnknownField(name.to_string()))?;
        self.set_field(def, value)
    }

    pub fn set_field(&mut self, def: &'static FieldDefinition, value: FieldValue) -> Result<(), FieldError> {
        let value = def.coerce(value)?;
        self.values.insert(def.name, value);
        Ok(())
    }

    /// Assign a field from operator text (see [`FieldDefinition::parse_input`]).
    pub fn set_from_input(&mut self, name: &str, input: &str) -> Result<(), FieldError> {
        let def = schema::field(name).ok_or_else(|| FieldError::UnknownField(name.to_string()))?;
        let value = def.parse_input(input)?;
        self.set_field(def, value)
    }

    /// Iterate over every field with its current value, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static FieldDefinition, &FieldValue)> {
        FIELDS
            .iter()
            .filter_map(|def| self.values.get(def.name).map(|value| (def, value)))
    }

    /// Names of the fields whose value differs from `other`.
    pub fn changed_fields(&self, other: &ConfigurationModel) -> Vec<&'static str> {
        FIELDS
            .iter()
            .filter(|def| self.values.get(def.name) != other.values.get(def.name))
            .map(|def| def.name)
            .collect()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_integer)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FieldValue::as_bool)
    }

    pub fn max_clients(&self) -> i64 {
        self.integer("max_clients").unwrap_or(0)
    }

    /// Sum of grid quantities, saturating at `u32::MAX`.
    pub fn total_slots(&self) -> u32 {
        self.car_grid
            .iter()
            .fold(0u32, |total, entry| total.saturating_add(entry.quantity))
    }

    /// Distinct car models in order of first appearance.
    pub fn unique_models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = Vec::new();
        for entry in &self.car_grid {
            if !models.contains(&entry.model.as_str()) {
                models.push(&entry.model);
            }
        }
        models
    }

    pub fn check_capacity(&self) -> Result<(), CapacityMismatch> {
        let total_slots = self.total_slots();
        let max_clients = self.max_clients();
        if i64::from(total_slots) > max_clients {
            return Err(CapacityMismatch {
                total_slots,
                max_clients,
            });
        }
        Ok(())
    }

    /// Raise `MAX_CLIENTS` to the suggested value, returning the value actually stored
    /// (the field's upper bound still applies).
    pub fn apply_capacity_correction(&mut self, mismatch: &CapacityMismatch) -> i64 {
        let suggested = mismatch.suggested_max_clients();
        if let Err(e) = self.set("max_clients", FieldValue::Integer(suggested)) {
            tracing::warn!("Could not raise max_clients: {}", e);
        }
        self.max_clients()
    }

    pub fn add_car(&mut self, model: &str, quantity: u32) -> Result<(), GridError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(GridError::EmptyModel);
        }
        if quantity == 0 || quantity > MAX_GRID_QUANTITY {
            return Err(GridError::InvalidQuantity(quantity));
        }
        self.car_grid.push(GridEntry::new(model, quantity));
        Ok(())
    }

    pub fn remove_car(&mut self, index: usize) -> Result<GridEntry, GridError> {
        if index >= self.car_grid.len() {
            return Err(GridError::IndexOutOfRange {
                index,
                len: self.car_grid.len(),
            });
        }
        Ok(self.car_grid.remove(index))
    }

    pub fn clear_grid(&mut self) {
        self.car_grid.clear();
    }
}
