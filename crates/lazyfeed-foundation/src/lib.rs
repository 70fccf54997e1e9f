//! Foundation elements for Lazyfeed: geometry, boundary detection, and the
//! pagination controller.
//!
//! Data flows in one direction: a geometry observer reports frame changes
//! to [`PaginationController::on_geometry_changed`], the pure detector in
//! [`boundary`] decides whether the user actually scrolled to the feed's
//! edge, and on a hit the controller runs one fetch through its
//! [`PageFetcher`], merging the resolved page into the observable item
//! list. Rendering stays external: UI layers subscribe to the item list,
//! the loading flag, and the anchor binding.

pub mod boundary;
pub mod controller;
pub mod fetcher;
pub mod geometry;


pub use boundary::{should_trigger_fetch, PaginationConfig, DEFAULT_EDGE_THRESHOLD};
pub use controller::{FeedItem, PaginationController};
pub use fetcher::{BlockingFetcher, FetchError, FetchResult, PageFetcher, PageFuture};
pub use geometry::{height_changed, Direction, Rect};
