use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ArtistId, GenreId, SongId};

/// A song, the bridge record between an artist and a genre.
///
/// Both foreign keys are optional: an unset key means "unassigned".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub name: String,

    /// Owning artist, if assigned.
    pub artist_id: Option<ArtistId>,

    /// Owning genre, if assigned.
    pub genre_id: Option<GenreId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Song {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SongId::new(),
            name: name.into(),
            artist_id: None,
            genre_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist_id: ArtistId) -> Self {
        self.artist_id = Some(artist_id);
        self
    }

    #[must_use]
    pub fn with_genre(mut self, genre_id: GenreId) -> Self {
        self.genre_id = Some(genre_id);
        self
    }
}
