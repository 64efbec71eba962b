pub mod artist;
pub mod genre;
pub mod ids;
pub mod song;

pub use artist::Artist;
pub use genre::Genre;
pub use ids::{ArtistId, GenreId, SongId};
pub use song::Song;
