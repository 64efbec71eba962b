//! Domain accessors on artists, genres and songs.
//!
//! These are thin compositions over the association resolver and carry no
//! state of their own. Counts on an owner without songs are zero and
//! "first" lookups are `None`; neither is an error.

use crate::error::Result;
use crate::mapper::Filter;
use crate::model::{Artist, Genre, Song};
use crate::schema::Database;

impl Artist {
    /// Songs by this artist, in creation order.
    pub fn songs(&self, db: &Database) -> Result<Vec<Song>> {
        db.related_many(self)
    }

    pub fn first_song(&self, db: &Database) -> Result<Option<Song>> {
        Ok(self.songs(db)?.into_iter().next())
    }

    /// Genre of this artist's first song; `None` when there are no songs or
    /// the first song has no genre.
    pub fn genre_of_first_song(&self, db: &Database) -> Result<Option<Genre>> {
        match self.first_song(db)? {
            Some(song) => song.genre(db),
            None => Ok(None),
        }
    }

    pub fn song_count(&self, db: &Database) -> Result<usize> {
        db.count_related::<Self, Song>(self)
    }

    /// Distinct genres across this artist's songs, first-seen order.
    pub fn genres(&self, db: &Database) -> Result<Vec<Genre>> {
        db.related_many_through::<Self, Song, Genre>(self)
    }

    pub fn genre_count(&self, db: &Database) -> Result<usize> {
        Ok(self.genres(db)?.len())
    }
}

impl Genre {
    /// Songs in this genre, in creation order.
    pub fn songs(&self, db: &Database) -> Result<Vec<Song>> {
        db.related_many(self)
    }

    pub fn song_count(&self, db: &Database) -> Result<usize> {
        db.count_related::<Self, Song>(self)
    }

    /// Distinct artists with a song in this genre, first-seen order.
    pub fn artists(&self, db: &Database) -> Result<Vec<Artist>> {
        db.related_many_through::<Self, Song, Artist>(self)
    }

    pub fn artist_count(&self, db: &Database) -> Result<usize> {
        Ok(self.artists(db)?.len())
    }

    pub fn all_artist_names(&self, db: &Database) -> Result<Vec<String>> {
        Ok(self
            .artists(db)?
            .into_iter()
            .map(|artist| artist.name)
            .collect())
    }
}

impl Song {
    pub fn artist(&self, db: &Database) -> Result<Option<Artist>> {
        db.related_one(self)
    }

    pub fn genre(&self, db: &Database) -> Result<Option<Genre>> {
        db.related_one(self)
    }

    /// Name of this song's genre, or `None` when unassigned.
    pub fn genre_name(&self, db: &Database) -> Result<Option<String>> {
        Ok(self.genre(db)?.map(|genre| genre.name))
    }

    /// Link this song to the artist called `name`, creating that artist if it
    /// does not exist yet. Repeating the call reuses the same artist.
    pub fn assign_artist_named(&mut self, db: &Database, name: &str) -> Result<Artist> {
        let artist: Artist = db.find_or_create_by(
            &Filter::new().eq("name", name.to_string()),
            || Artist::new(name),
        )?;
        db.link(self, &artist)?;
        Ok(artist)
    }

    /// Genre counterpart of [`Song::assign_artist_named`].
    pub fn assign_genre_named(&mut self, db: &Database, name: &str) -> Result<Genre> {
        let genre: Genre = db.find_or_create_by(
            &Filter::new().eq("name", name.to_string()),
            || Genre::new(name),
        )?;
        db.link(self, &genre)?;
        Ok(genre)
    }
}
