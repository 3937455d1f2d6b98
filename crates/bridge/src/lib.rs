//! TillSync Bridge library.
//!
//! This crate provides the sync service as a library, allowing it to be
//! tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod lightspeed;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;
