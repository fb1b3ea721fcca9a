//! External service clients and duration resolution

pub mod duration_resolver;
pub mod lastfm_client;
pub mod musicbrainz_client;

pub use duration_resolver::{DurationResolver, ResolveDuration};
pub use lastfm_client::{LastfmClient, LastfmError, RecentTracksPage};
pub use musicbrainz_client::{MBError, MusicBrainzClient, RecordingCandidate};
