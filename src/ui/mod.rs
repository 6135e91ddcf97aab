//! Terminal user interface.
//!
//! - `loop_runner` - main event loop and terminal management
//! - `input` - keyboard and mouse dispatch
//! - `render` - layout and overlay dispatch
//! - `sidebar`, `entries`, `reader` - the three panes
//! - `status`, `help`, `overlays` - footer, help table, dialogs

mod entries;
mod help;
mod input;
mod loop_runner;
mod overlays;
mod reader;
mod render;
mod sidebar;
mod status;

pub use loop_runner::{run, Action};
