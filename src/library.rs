//! Media index: scanning a directory into immutable [`Track`]s and ordering them.
//!
//! Tracks are produced once per run by [`scan`]; everything downstream treats
//! them as read-only values identified by [`TrackId`].

mod display;
mod model;
mod scan;
mod sort;

pub use model::{Track, TrackId};
pub use scan::scan;
pub use sort::{SortKey, SortOrder, load_sort_order, save_sort_order};
