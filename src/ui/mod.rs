//! Terminal UI rendering using ratatui.
//!
//! ## Submodules
//!
//! - [`topology`]: The graph as a column-ordered list of nodes and their outbound edges
//! - [`detail`]: Drawer with traffic, flags, hosts and metric sparklines for the selection
//! - [`common`]: Shared components (header, status bar, help overlay)
//!
//! ## Rendering Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (common::render_header)               │
//! ├────────────────────────┬─────────────────────┤
//! │                        │                     │
//! │ topology::render       │ detail::render      │
//! │                        │ (only while a       │
//! │                        │  selection is open) │
//! ├────────────────────────┴─────────────────────┤
//! │ Status Bar (common::render_status_bar)       │
//! └──────────────────────────────────────────────┘
//!         ↑
//!    common::render_help is drawn on top
//! ```

pub mod common;
pub mod detail;
pub mod topology;

use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::Frame;

use crate::app::App;

/// Row of the first topology list entry: header bar plus the list's top border.
pub const LIST_TOP: u16 = 2;

/// Rows of the terminal not available to the topology list.
pub const CHROME_ROWS: u16 = 4;

/// Draw one frame.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let chunks = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(4),    // Content
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    common::render_header(frame, app, chunks[0]);

    let (list_area, drawer_area) = split_content(chunks[1], app.selection().is_open());
    topology::render(frame, app, list_area);
    if let Some(drawer_area) = drawer_area {
        detail::render(frame, app, drawer_area);
    }

    common::render_status_bar(frame, app, chunks[2]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

fn split_content(area: Rect, drawer_open: bool) -> (Rect, Option<Rect>) {
    if !drawer_open {
        return (area, None);
    }
    let chunks =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).split(area);
    (chunks[0], Some(chunks[1]))
}
