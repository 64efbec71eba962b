//! Integration tests against file-backed databases.
//!
//! These exercise the mapper, the association resolver and the accessors
//! together, including behavior that only shows up across connections.

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use playlister_core::{Artist, Database, Filter, Genre, GenreId, Song};
use tempfile::TempDir;

fn open(path: &Path) -> Database {
    Database::open(path).expect("Failed to open database")
}

/// Test that records survive closing and reopening the database
#[test]
fn test_records_persist_across_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let (artist, song) = {
        let db = open(&db_path);
        let artist = db.create(Artist::new("Adele")).unwrap();
        let mut song = db.create(Song::new("Hello")).unwrap();
        db.link(&mut song, &artist).unwrap();
        (artist, song)
    };

    let db = open(&db_path);
    let stored: Song = db.get(song.id).unwrap();
    assert_eq!(stored.artist(&db).unwrap(), Some(artist.clone()));
    assert_eq!(artist.first_song(&db).unwrap().map(|s| s.id), Some(song.id));
}

/// Test a small library end to end: counts, dedup and name plucking
#[test]
fn test_library_walkthrough() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir.path().join("test.db"));

    let taylor = db.create(Artist::new("Taylor Swift")).unwrap();
    let drake = db.create(Artist::new("Drake")).unwrap();
    let country = db.create(Genre::new("Country")).unwrap();
    let pop = db.create(Genre::new("Pop")).unwrap();

    let mut tim = db.create(Song::new("Tim McGraw")).unwrap();
    db.link(&mut tim, &taylor).unwrap();
    db.link(&mut tim, &country).unwrap();

    let mut shake = db.create(Song::new("Shake It Off")).unwrap();
    db.append(&taylor, &mut shake).unwrap();
    db.append(&pop, &mut shake).unwrap();

    let mut hotline = db.create(Song::new("Hotline Bling")).unwrap();
    db.link(&mut hotline, &drake).unwrap();
    db.link(&mut hotline, &pop).unwrap();

    assert_eq!(taylor.song_count(&db).unwrap(), 2);
    assert_eq!(taylor.genre_count(&db).unwrap(), 2);
    assert_eq!(
        taylor.genre_of_first_song(&db).unwrap().map(|g| g.id),
        Some(country.id)
    );
    assert_eq!(pop.song_count(&db).unwrap(), 2);
    assert_eq!(pop.artist_count(&db).unwrap(), 2);
    assert_eq!(
        pop.all_artist_names(&db).unwrap(),
        vec!["Taylor Swift", "Drake"]
    );
    assert_eq!(hotline.genre_name(&db).unwrap(), Some("Pop".to_string()));
}

/// Test that a dangling genre_id surfaces as an error rather than None
#[test]
fn test_dangling_genre_reference_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir.path().join("test.db"));
    let song = db.create(Song::new("Ghost")).unwrap();

    // Bypass referential integrity to simulate a removed genre.
    db.conn()
        .execute_batch("PRAGMA foreign_keys = OFF")
        .unwrap();
    db.conn()
        .execute(
            "UPDATE songs SET genre_id = ?1 WHERE id = ?2",
            rusqlite::params![GenreId::new(), song.id],
        )
        .unwrap();

    let stored: Song = db.get(song.id).unwrap();
    let err = stored.genre_name(&db).unwrap_err();
    assert!(err.is_dangling_reference());
}

/// Test that concurrent find-or-create callers end up sharing one artist
#[test]
fn test_concurrent_assign_creates_single_artist() {
    const WORKERS: usize = 4;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let setup = open(&db_path);
    let songs: Vec<Song> = (0..WORKERS)
        .map(|n| setup.create(Song::new(format!("Track {n}"))).unwrap())
        .collect();

    // Open every connection up front so migrations never race.
    let connections: Vec<Database> = (0..WORKERS).map(|_| open(&db_path)).collect();
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = connections
        .into_iter()
        .zip(songs)
        .map(|(db, mut song)| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                song.assign_artist_named(&db, "Drake").unwrap().id
            })
        })
        .collect();

    let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));

    let drakes = setup
        .count::<Artist>(&Filter::new().eq("name", "Drake".to_string()))
        .unwrap();
    assert_eq!(drakes, 1);

    let artist: Artist = setup.get(ids[0]).unwrap();
    assert_eq!(artist.song_count(&setup).unwrap(), WORKERS);
}
