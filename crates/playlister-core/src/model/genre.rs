use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::GenreId;

/// A genre classification (e.g., "Pop", "Hip Hop").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,

    /// Display name. Unique across genres.
    pub name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Genre {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: GenreId::new(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
