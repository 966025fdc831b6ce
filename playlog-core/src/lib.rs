pub mod backoff;
pub mod config;
pub mod detector;
pub mod error;
pub mod event;
pub mod paths;
pub mod poller;
pub mod rollup;
pub mod source;
pub mod store;
pub mod tracker;

pub use backoff::Backoff;
pub use config::{Config, SpotifyConfig, StorageConfig, TrackerConfig, CONFIG_TEMPLATE};
pub use detector::{ChangeDetector, Decision};
pub use error::{CoreError, Result, SourceError};
pub use event::{PlayEvent, PlaybackSnapshot};
pub use paths::{config_dir, config_path, history_db_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, HISTORY_DB_FILE_NAME};
pub use poller::Poller;
pub use rollup::{TopAlbum, TopArtist, TopTrack};
pub use source::PlaybackSource;
pub use store::EventStore;
pub use tracker::Tracker;
