//! Core library for station-playlist-sync
pub mod api;
pub mod blend;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod playlist;
pub mod resolver;
pub mod retry;
pub mod util;
pub mod worker;
