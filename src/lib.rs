//! fluxread: a terminal client for Miniflux.
//!
//! The crate is split into a headless core (API client, settings, local
//! state with optimistic updates, AI summarization, version check) and a
//! ratatui front end in [`ui`]. Everything outside `ui` can be driven from
//! tests without a terminal.

pub mod ai;
pub mod api;
pub mod app;
pub mod config;
pub mod keybindings;
pub mod opml;
pub mod settings;
pub mod store;
pub mod theme;
pub mod ui;
pub mod util;
pub mod version;
