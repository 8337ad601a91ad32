// Per-playlist destination planning

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::models::MediaItem;
use super::sanitize::sanitize_folder_name;

/// Choose the output directory for an item.
///
/// Playlist items get a subdirectory named after the sanitized playlist
/// title, created on demand. "Already exists" is success. Any other
/// creation failure is logged and the base directory is used instead;
/// planning never fails an item.
pub fn plan_destination(base: &Path, item: &MediaItem) -> PathBuf {
    if !item.is_playlist {
        return base.to_path_buf();
    }

    let playlist_title = item
        .playlist_title
        .as_deref()
        .unwrap_or("Unknown Playlist");
    let dir = base.join(sanitize_folder_name(playlist_title));

    match std::fs::create_dir_all(&dir) {
        Ok(()) => {
            info!(dir = %dir.display(), "playlist directory ready");
            dir
        }
        Err(e) => {
            warn!(
                dir = %dir.display(),
                error = %e,
                "could not create playlist directory, using base"
            );
            base.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_item(playlist_title: Option<&str>) -> MediaItem {
        MediaItem {
            title: "T1".to_string(),
            url: "https://example.com/t1".to_string(),
            duration: 60,
            uploader: "U".to_string(),
            is_playlist: true,
            playlist_title: playlist_title.map(str::to_string),
            playlist_uploader: Some("U".to_string()),
        }
    }

    #[test]
    fn non_playlist_items_use_the_base_directory() {
        let base = tempfile::TempDir::new().unwrap();
        let mut item = playlist_item(Some("My Mix"));
        item.is_playlist = false;

        assert_eq!(plan_destination(base.path(), &item), base.path());
    }

    #[test]
    fn playlist_items_get_a_sanitized_subdirectory() {
        let base = tempfile::TempDir::new().unwrap();
        let item = playlist_item(Some("My Mix: vol/1"));

        let dest = plan_destination(base.path(), &item);
        assert_eq!(dest, base.path().join("My Mix vol1"));
        assert!(dest.is_dir());
    }

    #[test]
    fn planning_is_idempotent() {
        let base = tempfile::TempDir::new().unwrap();
        let item = playlist_item(Some("My Mix"));

        let first = plan_destination(base.path(), &item);
        let second = plan_destination(base.path(), &item);
        assert_eq!(first, second);
    }

    #[test]
    fn creation_failure_falls_back_to_base() {
        let base = tempfile::TempDir::new().unwrap();
        // Occupy the target name with a file so create_dir_all fails.
        let item = playlist_item(Some("Blocked"));
        std::fs::write(base.path().join("Blocked"), b"in the way").unwrap();

        let dest = plan_destination(base.path(), &item);
        assert_eq!(dest, base.path());
    }

    #[test]
    fn missing_playlist_title_maps_to_unknown_playlist() {
        let base = tempfile::TempDir::new().unwrap();
        let item = playlist_item(None);

        let dest = plan_destination(base.path(), &item);
        assert_eq!(dest, base.path().join("Unknown Playlist"));
    }
}
