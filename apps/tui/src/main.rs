//! AOI Relay TUI — live status display for the relay worker.
//!
//! Shows the machine identity, the last processed record, and a scrolling
//! log of pipeline events, built with `ratatui` + `crossterm`. The display
//! is a subscriber of pipeline events, never a dependency the worker
//! blocks on.

mod app;
mod widgets;

use color_eyre::eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    app::run().await
}
