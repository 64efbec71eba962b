//! Core data-access layer for playlister.
//!
//! This crate defines the `Artist`, `Genre` and `Song` records, the SQLite
//! schema, a small entity mapper, the association resolver that walks
//! foreign keys (directly and through a bridge record), and the domain
//! accessors built on top of it.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod accessors;
pub mod association;
pub mod config;
pub mod error;
pub mod mapper;
pub mod model;
pub mod schema;

pub use association::BelongsTo;
pub use config::Config;
pub use error::{Error, Result};
pub use mapper::{Filter, Record};
pub use model::{Artist, ArtistId, Genre, GenreId, Song, SongId};
pub use schema::Database;
