//! Integration tests for track and layout discovery on a real directory tree

use acsm::services::LocalContent;
use acsm::services::content;
use acsm::services::tracks::{self, UNKNOWN_PIT_BOXES};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use tempfile::TempDir;

fn write(path: &Utf8Path, text: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// A game folder with three tracks:
/// - `ks_nurburgring`: two layouts plus a `ui/` folder without metadata
/// - `magione`: single layout, metadata with a byte order mark and trailing commas
/// - `drift`: no metadata at all
fn game_tree() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let game = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let tracks_dir = content::tracks_dir(&game);

    write(
        &tracks_dir.join("ks_nurburgring/ui/layout_gp_a/ui_track.json"),
        r#"{"name": "Nurburgring GP", "pitboxes": "38",}"#,
    );
    write(
        &tracks_dir.join("ks_nurburgring/ui/layout_sprint_a/ui_track.json"),
        r#"{"name": "Nurburgring Sprint", "pitboxes": 24}"#,
    );
    fs::create_dir_all(tracks_dir.join("ks_nurburgring/ui/preview")).unwrap();

    write(
        &tracks_dir.join("magione/ui/ui_track.json"),
        "\u{feff}{\n  \"name\": \"Magione\",\n  \"tags\": [\"italy\", \"circuit\",],\n  \"pitboxes\": \"16\",\n}",
    );

    fs::create_dir_all(tracks_dir.join("drift/data")).unwrap();

    (temp_dir, game)
}

#[test]
fn test_list_tracks_sorted() {
    let (_temp_dir, game) = game_tree();
    assert_eq!(
        tracks::list_tracks(&LocalContent, &game),
        vec!["drift", "ks_nurburgring", "magione"]
    );
}

#[test]
fn test_layouts_with_metadata_only() {
    let (_temp_dir, game) = game_tree();
    let layouts = tracks::list_layouts(&LocalContent, &game, "ks_nurburgring");

    let names: Vec<&str> = layouts.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["layout_gp_a", "layout_sprint_a"]);
    assert_eq!(layouts["layout_gp_a"], 38);
    assert_eq!(layouts["layout_sprint_a"], 24);
}

#[test]
fn test_single_layout_track_with_relaxed_json() {
    let (_temp_dir, game) = game_tree();
    let resolved = tracks::resolve_layouts(&LocalContent, &game, "magione");

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].name, "");
    assert_eq!(resolved[0].pit_boxes, 16);
}

#[test]
fn test_track_without_metadata() {
    let (_temp_dir, game) = game_tree();
    let layouts = tracks::list_layouts(&LocalContent, &game, "drift");

    assert_eq!(layouts.len(), 1);
    assert_eq!(layouts[""], 0);
    assert_eq!(tracks::pit_boxes_label(layouts[""]), UNKNOWN_PIT_BOXES);
}

#[test]
fn test_missing_track_and_game() {
    let (_temp_dir, game) = game_tree();
    assert_eq!(tracks::list_layouts(&LocalContent, &game, "no_such_track")[""], 0);
    assert!(tracks::list_tracks(&LocalContent, &game.join("elsewhere")).is_empty());
}
