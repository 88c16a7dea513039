//! Watches a classroom live session for newly published PPT slides.

pub mod auth;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
#[cfg(feature = "gui")]
pub mod gui;
pub mod models;
pub mod push;
pub mod schedule;
pub mod slides;
pub mod watch;

pub use error::{Error, Result};
