//! Per-category sort order, remembered in the key-value store.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::StoreError;
use crate::store::KvStore;

use super::model::Track;

const NAMESPACE: &str = "sort";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Display,
    Title,
    Artist,
    DateAdded,
    Duration,
}

impl SortKey {
    fn as_str(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Title => "title",
            Self::Artist => "artist",
            Self::DateAdded => "date-added",
            Self::Duration => "duration",
        }
    }

    /// The key after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Display => Self::Title,
            Self::Title => Self::Artist,
            Self::Artist => Self::DateAdded,
            Self::DateAdded => Self::Duration,
            Self::Duration => Self::Display,
        }
    }
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display" => Ok(Self::Display),
            "title" => Ok(Self::Title),
            "artist" => Ok(Self::Artist),
            "date-added" => Ok(Self::DateAdded),
            "duration" => Ok(Self::Duration),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SortOrder {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            key: SortKey::Display,
            descending: false,
        }
    }
}

/// Stored as `<key>:asc` / `<key>:desc`.
impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = if self.descending { "desc" } else { "asc" };
        write!(f, "{}:{dir}", self.key.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, dir) = s.split_once(':').ok_or(())?;
        let descending = match dir {
            "asc" => false,
            "desc" => true,
            _ => return Err(()),
        };
        Ok(Self {
            key: key.parse()?,
            descending,
        })
    }
}

fn case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

impl SortOrder {
    /// Stable sort; ties and missing values fall back to display order.
    pub fn apply(&self, tracks: &mut [Track]) {
        tracks.sort_by(|a, b| {
            let primary = match self.key {
                SortKey::Display => Ordering::Equal,
                SortKey::Title => case_insensitive(&a.title, &b.title),
                SortKey::Artist => case_insensitive(
                    a.artist.as_deref().unwrap_or_default(),
                    b.artist.as_deref().unwrap_or_default(),
                ),
                SortKey::DateAdded => a.date_added.cmp(&b.date_added),
                SortKey::Duration => a.duration.cmp(&b.duration),
            };
            let ord = primary.then_with(|| case_insensitive(&a.display, &b.display));
            if self.descending { ord.reverse() } else { ord }
        });
    }
}

/// Remembered order for `category`, or `None` when nothing usable is stored.
pub fn load_sort_order(
    store: &dyn KvStore,
    category: &str,
) -> Result<Option<SortOrder>, StoreError> {
    let Some(raw) = store.get(NAMESPACE, category)? else {
        return Ok(None);
    };
    match raw.parse() {
        Ok(order) => Ok(Some(order)),
        Err(()) => {
            warn!(category, value = %raw, "ignoring malformed sort order");
            Ok(None)
        }
    }
}

pub fn save_sort_order(
    store: &dyn KvStore,
    category: &str,
    order: SortOrder,
) -> Result<(), StoreError> {
    store.set(NAMESPACE, category, order.to_string())
}
