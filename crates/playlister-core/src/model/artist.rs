use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::ArtistId;

/// A recording artist (person or group).
///
/// Songs point at their artist; the artist never stores its songs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artist {
    pub id: ArtistId,

    /// Display name. Unique across artists.
    pub name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Artist {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ArtistId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
