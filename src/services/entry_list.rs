//! Expansion of the car grid into `entry_list.ini` slots, and the reverse.

use crate::models::{GridEntry, MAX_GRID_QUANTITY};
use crate::services::ini::IniDocument;
use indexmap::IndexMap;
use thiserror::Error;

/// Skin used when a model has no skins installed.
pub const DEFAULT_SKIN: &str = "default";

const SECTION_PREFIX: &str = "CAR_";

/// One numbered car slot of the entry list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySlot {
    pub index: usize,
    pub model: String,
    pub skin: String,
    pub ballast: i64,
    pub restrictor: i64,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryListError {
    #[error("The car grid is empty; add at least one car first")]
    EmptyGrid,

    #[error("{model} has {quantity} cars; a grid entry holds at most {MAX_GRID_QUANTITY}")]
    QuantityTooLarge { model: String, quantity: u32 },
}

/// Expand `grid` into slots.
///
/// Indices run from 0 across the whole grid. Within one grid entry the skins of
/// its model are assigned in rotation; a model without skins gets [`DEFAULT_SKIN`].
///
/// # Arguments
/// * `grid` - Car models and quantities, in grid order
/// * `skins_for` - Skins available for a model
pub fn generate<F>(grid: &[GridEntry], mut skins_for: F) -> Result<Vec<EntrySlot>, EntryListError>
where
    F: FnMut(&str) -> Vec<String>,
{
    if let Some(entry) = grid.iter().find(|entry| entry.quantity > MAX_GRID_QUANTITY) {
        return Err(EntryListError::QuantityTooLarge {
            model: entry.model.clone(),
            quantity: entry.quantity,
        });
    }

    let total: u64 = grid.iter().map(|entry| u64::from(entry.quantity)).sum();
    if total == 0 {
        return Err(EntryListError::EmptyGrid);
    }

    let mut slots = Vec::with_capacity(usize::try_from(total).unwrap_or_default());
    for entry in grid {
        let skins = skins_for(&entry.model);
        if skins.is_empty() {
            tracing::debug!("No skins found for {}, using '{}'", entry.model, DEFAULT_SKIN);
        }

        for repetition in 0..entry.quantity as usize {
            let skin = if skins.is_empty() {
                DEFAULT_SKIN.to_string()
            } else {
                skins[repetition % skins.len()].clone()
            };
            slots.push(EntrySlot {
                index: slots.len(),
                model: entry.model.clone(),
                skin,
                ballast: 0,
                restrictor: 0,
            });
        }
    }

    Ok(slots)
}

pub fn to_document(slots: &[EntrySlot]) -> IniDocument {
    let mut doc = IniDocument::new();
    for slot in slots {
        let section = doc.section_mut(&format!("{}{}", SECTION_PREFIX, slot.index));
        section.insert("MODEL".into(), slot.model.clone());
        section.insert("SKIN".into(), slot.skin.clone());
        section.insert("SPECTATOR_MODE".into(), "0".into());
        section.insert("DRIVERNAME".into(), String::new());
        section.insert("TEAM".into(), String::new());
        section.insert("GUID".into(), String::new());
        section.insert("BALLAST".into(), slot.ballast.to_string());
        section.insert("RESTRICTOR".into(), slot.restrictor.to_string());
    }
    doc
}

pub fn render(slots: &[EntrySlot]) -> String {
    to_document(slots).render()
}

/// Rebuild the car grid from an entry list by counting `MODEL` per distinct model.
///
/// This is lossy: skins, ballast, restrictors and driver details are dropped.
/// `[CAR_n]` sections are visited in numeric order of `n`.
pub fn grid_from_entry_list(doc: &IniDocument) -> Vec<GridEntry> {
    let mut cars: Vec<(u32, &str)> = doc
        .sections()
        .filter_map(|(name, entries)| {
            let index = name.strip_prefix(SECTION_PREFIX)?.parse::<u32>().ok()?;
            let model = entries.get("MODEL")?.trim();
            (!model.is_empty()).then_some((index, model))
        })
        .collect();
    cars.sort_by_key(|(index, _)| *index);

    let mut counts: IndexMap<&str, u32> = IndexMap::new();
    for (_, model) in cars {
        let count = counts.entry(model).or_default();
        if *count == MAX_GRID_QUANTITY {
            tracing::debug!("Dropping slots of {} beyond {}", model, MAX_GRID_QUANTITY);
            continue;
        }
        *count += 1;
    }

    counts
        .into_iter()
        .map(|(model, quantity)| GridEntry::new(model, quantity))
        .collect()
}
