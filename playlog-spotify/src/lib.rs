pub mod error;
pub mod paths;
pub mod playback;
pub mod session;

pub use error::SpotifyError;
pub use paths::SPOTIFY_TOKEN_CACHE_FILE_NAME;
pub use playback::SpotifySource;
pub use session::SpotifySession;
