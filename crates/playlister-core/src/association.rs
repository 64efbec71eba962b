//! Association resolver: walks foreign keys between records.
//!
//! A child declares each owner it points at with [`BelongsTo`], naming the
//! foreign key column explicitly. "Has many" collections are always derived
//! by filtering children on that column; nothing is stored on the owner.

use std::collections::HashSet;

use rusqlite::types::Value;

use crate::error::{Error, Result};
use crate::mapper::{Filter, Record};
use crate::model::{Artist, ArtistId, Genre, GenreId, Song};
use crate::schema::Database;

/// A record holding a nullable foreign key to an owner of kind `O`.
pub trait BelongsTo<O: Record>: Record {
    /// Column on the child's table holding the owner's id.
    const FOREIGN_KEY: &'static str;

    fn owner_id(&self) -> Option<O::Id>;

    fn set_owner_id(&mut self, id: Option<O::Id>);
}

impl BelongsTo<Artist> for Song {
    const FOREIGN_KEY: &'static str = "artist_id";

    fn owner_id(&self) -> Option<ArtistId> {
        self.artist_id
    }

    fn set_owner_id(&mut self, id: Option<ArtistId>) {
        self.artist_id = id;
    }
}

impl BelongsTo<Genre> for Song {
    const FOREIGN_KEY: &'static str = "genre_id";

    fn owner_id(&self) -> Option<GenreId> {
        self.genre_id
    }

    fn set_owner_id(&mut self, id: Option<GenreId>) {
        self.genre_id = id;
    }
}

// Association traversal
impl Database {
    /// Every child pointing at `owner`, in insertion order. Empty when there
    /// are none.
    pub fn related_many<O, C>(&self, owner: &O) -> Result<Vec<C>>
    where
        O: Record,
        C: BelongsTo<O>,
    {
        self.find_all_by(&Filter::new().eq(C::FOREIGN_KEY, owner.id()))
    }

    /// Number of children pointing at `owner`.
    pub fn count_related<O, C>(&self, owner: &O) -> Result<usize>
    where
        O: Record,
        C: BelongsTo<O>,
    {
        self.count::<C>(&Filter::new().eq(C::FOREIGN_KEY, owner.id()))
    }

    /// The owner `child` points at, or `None` when its foreign key is unset.
    ///
    /// A set key with no matching owner is a `DanglingReference` error.
    pub fn related_one<C, O>(&self, child: &C) -> Result<Option<O>>
    where
        C: BelongsTo<O>,
        O: Record,
    {
        match child.owner_id() {
            Some(id) => self.resolve_owner::<C, O>(id).map(Some),
            None => Ok(None),
        }
    }

    /// Targets reachable from `owner` through bridge records of kind `B`.
    ///
    /// Bridges with an unset target key are skipped. Each target appears once,
    /// in the order it is first reached.
    pub fn related_many_through<O, B, T>(&self, owner: &O) -> Result<Vec<T>>
    where
        O: Record,
        T: Record,
        B: BelongsTo<O> + BelongsTo<T>,
    {
        let bridges: Vec<B> = self.related_many(owner)?;

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for bridge in &bridges {
            let Some(target_id) = <B as BelongsTo<T>>::owner_id(bridge) else {
                continue;
            };
            if seen.insert(target_id) {
                targets.push(self.resolve_owner::<B, T>(target_id)?);
            }
        }

        Ok(targets)
    }

    /// Point `child` at `owner` and persist the change.
    ///
    /// Only the foreign key (and `updated_at`) is written, so other columns
    /// saved through a different copy of the same row are left alone. `child`
    /// is updated in memory only after the write succeeds.
    pub fn link<C, O>(&self, child: &mut C, owner: &O) -> Result<()>
    where
        C: BelongsTo<O>,
        O: Record,
    {
        self.write_owner_id::<C, O>(child, Some(owner.id()))?;
        log::debug!(
            "Linked {} {} to {} {}",
            C::ENTITY,
            child.id(),
            O::ENTITY,
            owner.id()
        );
        Ok(())
    }

    /// Add `child` to `owner`'s collection. Same stored state as [`link`].
    ///
    /// [`link`]: Database::link
    pub fn append<O, C>(&self, owner: &O, child: &mut C) -> Result<()>
    where
        O: Record,
        C: BelongsTo<O>,
    {
        self.link(child, owner)
    }

    /// Clear `child`'s foreign key to owners of kind `O` and persist.
    pub fn unlink<C, O>(&self, child: &mut C) -> Result<()>
    where
        C: BelongsTo<O>,
        O: Record,
    {
        self.write_owner_id::<C, O>(child, None)
    }

    fn write_owner_id<C, O>(&self, child: &mut C, owner_id: Option<O::Id>) -> Result<()>
    where
        C: BelongsTo<O>,
        O: Record,
    {
        let value = owner_id.map_or(Value::Null, Into::into);
        let updated_at = self.update_columns::<C>(child.id(), &[(C::FOREIGN_KEY, value)])?;
        child.set_owner_id(owner_id);
        child.set_updated_at(updated_at);
        Ok(())
    }

    fn resolve_owner<C, O>(&self, id: O::Id) -> Result<O>
    where
        C: BelongsTo<O>,
        O: Record,
    {
        self.find::<O>(id)?.ok_or_else(|| Error::DanglingReference {
            entity: C::ENTITY,
            column: C::FOREIGN_KEY,
            id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_related_many_empty_for_new_owner() {
        let db = setup();
        let artist = db.create(Artist::new("Adele")).unwrap();

        let songs: Vec<Song> = db.related_many(&artist).unwrap();
        assert!(songs.is_empty());
        assert_eq!(db.count_related::<Artist, Song>(&artist).unwrap(), 0);
    }

    #[test]
    fn test_related_many_in_creation_order() {
        let db = setup();
        let artist = db.create(Artist::new("Adele")).unwrap();
        let other = db.create(Artist::new("Beyonce")).unwrap();
        let first = db.create(Song::new("Hello").with_artist(artist.id)).unwrap();
        db.create(Song::new("Halo").with_artist(other.id)).unwrap();
        let second = db
            .create(Song::new("Skyfall").with_artist(artist.id))
            .unwrap();

        let songs: Vec<Song> = db.related_many(&artist).unwrap();
        assert_eq!(songs, vec![first, second]);
    }

    #[test]
    fn test_related_one_unset_is_none() {
        let db = setup();
        let song = db.create(Song::new("Untitled")).unwrap();

        let genre: Option<Genre> = db.related_one(&song).unwrap();
        assert!(genre.is_none());
    }

    #[test]
    fn test_related_one_dangling_is_error() {
        let db = setup();
        let mut song = db.create(Song::new("Lost")).unwrap();
        song.genre_id = Some(GenreId::new());

        let err = db.related_one::<Song, Genre>(&song).unwrap_err();
        assert!(err.is_dangling_reference());
    }

    #[test]
    fn test_link_then_related_one_round_trip() {
        let db = setup();
        let artist = db.create(Artist::new("Drake")).unwrap();
        let mut song = db.create(Song::new("Hotline Bling")).unwrap();

        db.link(&mut song, &artist).unwrap();

        let stored: Song = db.get(song.id).unwrap();
        let owner: Artist = db.related_one(&stored).unwrap().unwrap();
        assert_eq!(owner.id, artist.id);
    }

    #[test]
    fn test_append_matches_link() {
        let db = setup();
        let genre = db.create(Genre::new("Pop")).unwrap();
        let mut linked = db.create(Song::new("One")).unwrap();
        let mut appended = db.create(Song::new("Two")).unwrap();

        db.link(&mut linked, &genre).unwrap();
        db.append(&genre, &mut appended).unwrap();

        let linked: Song = db.get(linked.id).unwrap();
        let appended: Song = db.get(appended.id).unwrap();
        assert_eq!(linked.genre_id, Some(genre.id));
        assert_eq!(appended.genre_id, linked.genre_id);
    }

    #[test]
    fn test_link_to_unsaved_owner_is_persistence_error() {
        let db = setup();
        let mut song = db.create(Song::new("Demo")).unwrap();

        let before = song.clone();

        let err = db.link(&mut song, &Artist::new("Nobody")).unwrap_err();
        assert!(err.is_persistence());
        let stored: Song = db.get(song.id).unwrap();
        assert!(stored.artist_id.is_none());

        // The caller's copy is untouched, so its accessors still resolve.
        assert!(song.artist_id.is_none());
        assert_eq!(song, before);
        assert!(song.artist(&db).unwrap().is_none());
    }

    #[test]
    fn test_link_keeps_other_foreign_key_from_stale_copy() {
        let db = setup();
        let drake = db.create(Artist::new("Drake")).unwrap();
        let pop = db.create(Genre::new("Pop")).unwrap();
        let mut song = db.create(Song::new("Hotline Bling")).unwrap();
        let mut stale = song.clone();

        db.link(&mut song, &pop).unwrap();
        db.link(&mut stale, &drake).unwrap();

        let stored: Song = db.get(song.id).unwrap();
        assert_eq!(stored.artist_id, Some(drake.id));
        assert_eq!(stored.genre_id, Some(pop.id));
    }

    #[test]
    fn test_link_mirrors_stored_timestamp() {
        let db = setup();
        let pop = db.create(Genre::new("Pop")).unwrap();
        let mut song = db.create(Song::new("Shake It Off")).unwrap();

        db.link(&mut song, &pop).unwrap();

        let stored: Song = db.get(song.id).unwrap();
        assert_eq!(stored, song);
    }

    #[test]
    fn test_link_unsaved_child_is_not_found() {
        let db = setup();
        let pop = db.create(Genre::new("Pop")).unwrap();
        let mut song = Song::new("Never Saved");

        let err = db.link(&mut song, &pop).unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Song", .. }));
        assert!(song.genre_id.is_none());
    }

    #[test]
    fn test_unlink_clears_foreign_key() {
        let db = setup();
        let artist = db.create(Artist::new("Drake")).unwrap();
        let mut song = db
            .create(Song::new("Started From the Bottom").with_artist(artist.id))
            .unwrap();

        db.unlink::<Song, Artist>(&mut song).unwrap();

        assert!(song.artist_id.is_none());
        assert_eq!(db.count_related::<Artist, Song>(&artist).unwrap(), 0);
    }

    #[test]
    fn test_related_many_through_dedups_in_first_seen_order() {
        let db = setup();
        let artist = db.create(Artist::new("Taylor Swift")).unwrap();
        let country = db.create(Genre::new("Country")).unwrap();
        let pop = db.create(Genre::new("Pop")).unwrap();
        for (name, genre) in [("Tim McGraw", &country), ("Shake It Off", &pop), ("Mine", &country)] {
            db.create(Song::new(name).with_artist(artist.id).with_genre(genre.id))
                .unwrap();
        }
        db.create(Song::new("Demo").with_artist(artist.id)).unwrap();

        let genres: Vec<Genre> = db
            .related_many_through::<Artist, Song, Genre>(&artist)
            .unwrap();
        let ids: Vec<GenreId> = genres.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![country.id, pop.id]);
    }
}
