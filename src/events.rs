use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::App;
use crate::export;
use crate::selection::DetailTab;
use crate::ui::{topology::scroll_offset, CHROME_ROWS, LIST_TOP};

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return;
    }

    // Keys that only mean something while the drawer is open
    if app.selection().is_open() {
        let handled = match key.code {
            KeyCode::Esc | KeyCode::Backspace => {
                app.close_detail();
                true
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    app.prev_tab();
                } else {
                    app.next_tab();
                }
                true
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                app.prev_tab();
                true
            }
            KeyCode::Right | KeyCode::Char('l') => {
                app.next_tab();
                true
            }
            KeyCode::Char('1') => {
                app.set_tab(DetailTab::Traffic);
                true
            }
            KeyCode::Char('2') => {
                app.set_tab(DetailTab::Flags);
                true
            }
            KeyCode::Char('3') => {
                app.set_tab(DetailTab::Hosts);
                true
            }
            KeyCode::Char('o') => {
                app.toggle_direction();
                true
            }
            _ => false,
        };
        if handled {
            return;
        }
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::PageUp => (0..10).for_each(|_| app.select_prev()),
        KeyCode::PageDown => (0..10).for_each(|_| app.select_next()),

        // Open the entity under the cursor
        KeyCode::Enter | KeyCode::Char(' ') => app.tap_selected(),

        KeyCode::Char('r') => app.retry(),
        KeyCode::Char('d') => app.cycle_duration(),
        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Char('e') => {
            let export_path = PathBuf::from("meshwatch_export.json");
            match export_current(app, &export_path) {
                Ok(true) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()))
                }
                Ok(false) => app.set_status_message("Nothing to export yet".to_string()),
                Err(e) => app.set_status_message(format!("Export failed: {}", e)),
            }
        }

        _ => {}
    }
}

/// Handle a mouse event over the topology list.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => app.select_prev(),
        MouseEventKind::ScrollDown => app.select_next(),

        MouseEventKind::Down(MouseButton::Left) => {
            let viewport = app.renderer().viewport();
            // The drawer takes the right 45% while open.
            let list_width = if app.selection().is_open() {
                (u32::from(viewport.width) * 55 / 100) as u16
            } else {
                viewport.width
            };
            if mouse.row < LIST_TOP || mouse.column >= list_width {
                return;
            }
            let visible = viewport.height.saturating_sub(CHROME_ROWS) as usize;
            let offset = scroll_offset(app.renderer().cursor(), visible);
            let index = offset + (mouse.row - LIST_TOP) as usize;
            app.click_row(index);
        }

        _ => {}
    }
}

fn export_current(app: &App, path: &std::path::Path) -> Result<bool> {
    let Some(graph) = app.graph() else {
        return Ok(false);
    };
    let normalized = crate::graph::NormalizedGraph {
        graph: graph.as_ref().clone(),
        report: app.report().clone(),
    };
    export::write(path, &export::summary(&normalized, app.thresholds()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Thresholds;
    use crate::render::{GraphRenderer, RenderTheme, TerminalRenderer, Viewport};
    use crate::source::ChannelSource;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use meshwatch_client::GraphQuery;
    use meshwatch_types::GraphPayload;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn app() -> App {
        let (tx, source) = ChannelSource::create("test");
        tx.send(
            GraphPayload::builder()
                .node("pp", |n| n.node_type("app").namespace("bookinfo").app("productpage"))
                .node("reviews", |n| n.node_type("service").namespace("bookinfo").service("reviews"))
                .edge("e1", "pp", "reviews", |e| e.http("1", "0"))
                .build(),
        )
        .unwrap();
        let mut app = App::new(
            Box::new(source),
            GraphQuery::new(["bookinfo"]),
            TerminalRenderer::new(),
            RenderTheme::dark(),
            Thresholds::default(),
        )
        .unwrap();
        app.renderer_mut().relayout(Viewport::new(80, 24)).unwrap();
        app.reload_data().unwrap();
        app
    }

    #[test]
    fn test_enter_opens_and_esc_closes() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Down));
        handle_key_event(&mut app, key(KeyCode::Enter));
        assert_eq!(app.selection().view().target_id.as_deref(), Some("e1"));

        handle_key_event(&mut app, key(KeyCode::Char('2')));
        assert_eq!(app.selection().active_tab(), Some(DetailTab::Flags));

        handle_key_event(&mut app, key(KeyCode::Esc));
        assert!(!app.selection().is_open());
        assert!(app.running);

        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.running);
    }

    #[test]
    fn test_click_opens_row() {
        let mut app = app();
        handle_mouse_event(
            &mut app,
            MouseEvent {
                kind: MouseEventKind::Down(MouseButton::Left),
                column: 10,
                row: LIST_TOP + 2,
                modifiers: KeyModifiers::NONE,
            },
        );
        assert_eq!(app.selection().view().target_id.as_deref(), Some("reviews"));
    }

    #[test]
    fn test_help_swallows_next_key() {
        let mut app = app();
        handle_key_event(&mut app, key(KeyCode::Char('?')));
        assert!(app.show_help);
        handle_key_event(&mut app, key(KeyCode::Char('q')));
        assert!(!app.show_help);
        assert!(app.running);
    }
}
