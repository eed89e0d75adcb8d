//! Track and layout discovery in the game's content tree.
//!
//! A track either ships one `ui/ui_track.json`, or one `ui/<layout>/ui_track.json`
//! per layout. Layout names are what the server expects in `CONFIG_TRACK`; the
//! single-layout case uses the empty name.

use crate::services::content::{self, ContentSource};
use crate::services::relaxed_json;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;

const UI_DIR: &str = "ui";
const UI_TRACK_JSON: &str = "ui_track.json";

/// Label shown when a layout's pit-box count could not be read.
pub const UNKNOWN_PIT_BOXES: &str = "? (not detected)";

/// A layout with its pit-box capacity (`0` when unknown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackLayout {
    pub name: String,
    pub pit_boxes: u32,
}

/// Track directories under `<game>/content/tracks`, sorted.
pub fn list_tracks(source: &impl ContentSource, game_root: &Utf8Path) -> Vec<String> {
    source.list_dirs(&content::tracks_dir(game_root))
}

/// Layouts of `track` mapped to their pit-box counts.
///
/// - One entry per `ui/<layout>/` that contains a `ui_track.json`, in name order
/// - Otherwise a single `""` entry read from `ui/ui_track.json`
/// - Otherwise a single `""` entry with `0`
pub fn list_layouts(source: &impl ContentSource, game_root: &Utf8Path, track: &str) -> IndexMap<String, u32> {
    let ui_dir = content::tracks_dir(game_root).join(track).join(UI_DIR);
    let mut layouts = IndexMap::new();

    for layout in source.list_dirs(&ui_dir) {
        let json = ui_dir.join(&layout).join(UI_TRACK_JSON);
        if source.is_file(&json) {
            let pit_boxes = read_pit_boxes(source, &json);
            layouts.insert(layout, pit_boxes);
        }
    }

    if layouts.is_empty() {
        let json = ui_dir.join(UI_TRACK_JSON);
        let pit_boxes = if source.is_file(&json) {
            read_pit_boxes(source, &json)
        } else {
            tracing::debug!("No {} found for track {}", UI_TRACK_JSON, track);
            0
        };
        layouts.insert(String::new(), pit_boxes);
    }

    layouts
}

/// Same as [`list_layouts`], as [`TrackLayout`] values.
pub fn resolve_layouts(source: &impl ContentSource, game_root: &Utf8Path, track: &str) -> Vec<TrackLayout> {
    list_layouts(source, game_root, track)
        .into_iter()
        .map(|(name, pit_boxes)| TrackLayout { name, pit_boxes })
        .collect()
}

fn read_pit_boxes(source: &impl ContentSource, json: &Utf8Path) -> u32 {
    match source.read_text(json) {
        Ok(text) => relaxed_json::pit_boxes(&text),
        Err(e) => {
            tracing::debug!("{:#}", e);
            0
        }
    }
}

pub fn pit_boxes_label(pit_boxes: u32) -> String {
    if pit_boxes == 0 {
        UNKNOWN_PIT_BOXES.to_string()
    } else {
        pit_boxes.to_string()
    }
}

/// `<root>/content/tracks/<track>`
pub fn track_dir(root: &Utf8Path, track: &str) -> Utf8PathBuf {
    content::tracks_dir(root).join(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::content::MockContentSource;
    use mockall::predicate::function;

    const GAME: &str = "/games/ac";

    #[test]
    fn test_layouts_per_subdirectory() {
        let mut source = MockContentSource::new();
        source
            .expect_list_dirs()
            .with(function(|dir: &Utf8Path| dir.as_str() == "/games/ac/content/tracks/ks_nurburgring/ui"))
            .returning(|_| vec!["layout_gp_a".into(), "layout_sprint".into(), "outline".into()]);
        source
            .expect_is_file()
            .returning(|path| !path.as_str().contains("outline"));
        source.expect_read_text().returning(|path| {
            if path.as_str().contains("sprint") {
                Ok(r#"{"pitboxes": "bogus",}"#.to_string())
            } else {
                Ok("{\"name\": \"GP\", \"pitboxes\": 36,}".to_string())
            }
        });

        let layouts = list_layouts(&source, Utf8Path::new(GAME), "ks_nurburgring");
        let pairs: Vec<(&str, u32)> = layouts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(pairs, vec![("layout_gp_a", 36), ("layout_sprint", 0)]);
    }

    #[test]
    fn test_single_layout_track() {
        let mut source = MockContentSource::new();
        source.expect_list_dirs().returning(|_| Vec::new());
        source
            .expect_is_file()
            .with(function(|path: &Utf8Path| {
                path.as_str() == "/games/ac/content/tracks/magione/ui/ui_track.json"
            }))
            .returning(|_| true);
        source
            .expect_read_text()
            .returning(|_| Ok("\u{feff}{\"pitboxes\": 20,}".to_string()));

        let layouts = resolve_layouts(&source, Utf8Path::new(GAME), "magione");
        assert_eq!(
            layouts,
            vec![TrackLayout {
                name: String::new(),
                pit_boxes: 20
            }]
        );
    }

    #[test]
    fn test_track_without_metadata() {
        let mut source = MockContentSource::new();
        source.expect_list_dirs().returning(|_| vec!["preview".into()]);
        source.expect_is_file().returning(|_| false);

        let layouts = list_layouts(&source, Utf8Path::new(GAME), "drift");
        assert_eq!(layouts.len(), 1);
        assert_eq!(layouts.get(""), Some(&0));
    }

    #[test]
    fn test_pit_boxes_label() {
        assert_eq!(pit_boxes_label(0), UNKNOWN_PIT_BOXES);
        assert_eq!(pit_boxes_label(24), "24");
    }
}
