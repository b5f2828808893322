pub mod tracker;
pub mod watcher;

pub use tracker::{PlaybackSnapshot, SessionTracker, TrackEvent, TrackStatus};
pub use watcher::{watch_loop, watch_once, EventSink, HttpEventSink, NowPlayingSource};
