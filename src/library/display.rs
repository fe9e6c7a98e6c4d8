use std::path::Path;

use crate::config::TrackDisplayField;

/// Tag values a display name can be built from.
pub(super) struct DisplaySource<'a> {
    pub path: &'a Path,
    pub title: &'a str,
    pub artist: Option<&'a str>,
    pub album: Option<&'a str>,
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Join the configured `fields` of `src` with `sep`, skipping blank values.
///
/// Falls back to the title when every field came up empty.
pub(super) fn display_name(src: &DisplaySource<'_>, fields: &[TrackDisplayField], sep: &str) -> String {
    let parts: Vec<String> = fields
        .iter()
        .flat_map(|field| match field {
            TrackDisplayField::Display => {
                vec![non_empty(src.artist), non_empty(Some(src.title))]
            }
            TrackDisplayField::Title => vec![non_empty(Some(src.title))],
            TrackDisplayField::Artist => vec![non_empty(src.artist)],
            TrackDisplayField::Album => vec![non_empty(src.album)],
            TrackDisplayField::Filename => {
                vec![non_empty(src.path.file_stem().and_then(|s| s.to_str()))]
            }
            TrackDisplayField::Path => vec![Some(src.path.display().to_string())],
        })
        .flatten()
        .collect();

    if parts.is_empty() {
        src.title.to_string()
    } else {
        parts.join(sep)
    }
}
