use std::path::Path;
use std::time::{Duration, SystemTime};

use lofty::prelude::*;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::LibrarySettings;

use super::display::{DisplaySource, display_name};
use super::model::{Track, TrackId};

fn is_audio_file(path: &Path, settings: &LibrarySettings) -> bool {
    let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .any(|e| !e.is_empty() && e == ext)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn date_added(entry: &DirEntry) -> Option<SystemTime> {
    let meta = entry.metadata().ok()?;
    meta.created().or_else(|_| meta.modified()).ok()
}

#[derive(Default)]
struct Tags {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration: Option<Duration>,
}

fn clean(v: Option<std::borrow::Cow<'_, str>>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn read_tags(path: &Path) -> Tags {
    let tagged = match lofty::read_from_path(path) {
        Ok(t) => t,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable tags");
            return Tags::default();
        }
    };

    let mut tags = Tags {
        duration: Some(tagged.properties().duration()),
        ..Tags::default()
    };
    if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
        tags.title = clean(tag.title());
        tags.artist = clean(tag.artist());
        tags.album = clean(tag.album());
    }
    tags
}

/// Walk `dir` and build one [`Track`] per audio file, sorted by display name.
///
/// Files whose tags cannot be read are still listed, titled after their file stem
/// and with an unknown duration.
pub fn scan(dir: &Path, settings: &LibrarySettings) -> Vec<Track> {
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    let mut tracks: Vec<Track> = walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() || e.path().is_file())
        .filter(|e| is_audio_file(e.path(), settings))
        .map(|entry| {
            let path = entry.path();
            let tags = read_tags(path);
            let title = tags.title.unwrap_or_else(|| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("UNKNOWN")
                    .to_string()
            });

            let display = display_name(
                &DisplaySource {
                    path,
                    title: &title,
                    artist: tags.artist.as_deref(),
                    album: tags.album.as_deref(),
                },
                &settings.display_fields,
                &settings.display_separator,
            );

            Track {
                id: TrackId::from_path(path),
                path: path.to_path_buf(),
                title,
                artist: tags.artist,
                album: tags.album,
                duration: tags.duration,
                date_added: date_added(&entry),
                display,
            }
        })
        .collect();

    tracks.sort_by_key(|t| t.display.to_lowercase());
    info!(dir = %dir.display(), count = tracks.len(), "library scanned");
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackDisplayField;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    /// Create placeholder files (no real audio) at the given relative paths.
    fn library(files: &[&str]) -> TempDir {
        let root = tempdir().unwrap();
        for rel in files {
            let path = root.path().join(rel);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"placeholder").unwrap();
        }
        root
    }

    fn by_filename() -> LibrarySettings {
        LibrarySettings {
            display_fields: vec![TrackDisplayField::Filename],
            ..LibrarySettings::default()
        }
    }

    fn names(root: &Path, settings: &LibrarySettings) -> Vec<String> {
        scan(root, settings).into_iter().map(|t| t.display).collect()
    }

    #[test]
    fn extension_filter_ignores_case_and_leading_dots() {
        let defaults = LibrarySettings::default();
        for ok in ["ch01.m4b", "song.MP3", "talk.opus"] {
            assert!(is_audio_file(Path::new(ok), &defaults), "{ok}");
        }
        for skip in ["cover.jpg", "notes.txt", "README"] {
            assert!(!is_audio_file(Path::new(skip), &defaults), "{skip}");
        }

        let only_flac = LibrarySettings {
            extensions: vec![".FLAC".into(), "  ".into()],
            ..LibrarySettings::default()
        };
        assert!(is_audio_file(Path::new("a.flac"), &only_flac));
        assert!(!is_audio_file(Path::new("a.mp3"), &only_flac));
    }

    #[test]
    fn untagged_files_fall_back_to_their_stem() {
        let root = library(&["Part 2.m4b", "part 1.mp3", "cover.jpg"]);
        let settings = LibrarySettings {
            display_fields: vec![TrackDisplayField::Title],
            ..LibrarySettings::default()
        };

        let tracks = scan(root.path(), &settings);
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["part 1", "Part 2"]);
        assert!(tracks.iter().all(|t| t.duration.is_none() && t.artist.is_none()));
    }

    #[test]
    fn tracks_carry_path_ids_and_date_added() {
        let root = library(&["book/ch1.mp3"]);
        let tracks = scan(root.path(), &by_filename());

        assert_eq!(tracks.len(), 1);
        let path = root.path().join("book/ch1.mp3");
        assert_eq!(tracks[0].id, TrackId::from_path(&path));
        assert_eq!(tracks[0].path, path);
        assert!(tracks[0].date_added.is_some());
    }

    #[test]
    fn hidden_entries_are_opt_in() {
        let root = library(&[".trash/old.mp3", ".draft.mp3", "final.mp3"]);
        assert_eq!(names(root.path(), &by_filename()), vec!["final"]);

        let everything = LibrarySettings {
            include_hidden: true,
            ..by_filename()
        };
        assert_eq!(names(root.path(), &everything).len(), 3);
    }

    #[test]
    fn walk_depth_follows_recursive_and_max_depth() {
        let root = library(&["intro.mp3", "vol1/a.mp3", "vol1/extras/b.mp3"]);

        let flat = LibrarySettings {
            recursive: false,
            ..by_filename()
        };
        assert_eq!(names(root.path(), &flat), vec!["intro"]);

        // The root is depth 0, so 2 reaches vol1/* but not vol1/extras/*.
        let capped = LibrarySettings {
            max_depth: Some(2),
            ..by_filename()
        };
        assert_eq!(names(root.path(), &capped), vec!["a", "intro"]);

        assert_eq!(names(root.path(), &by_filename()), vec!["a", "b", "intro"]);
    }
}
