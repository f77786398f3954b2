//! Render theme.
//!
//! Supports light and dark themes with automatic terminal detection. The
//! theme is an explicit value handed to the renderer on mount; nothing
//! reads colors from global state.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::graph::{Badge, HealthStatus, Protocol};

/// Color and style theme for the graph view and panels.
///
/// Use [`RenderTheme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`RenderTheme::dark()`]/[`RenderTheme::light()`]
/// explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTheme {
    /// Accent color for highlights and active elements.
    pub highlight: Color,
    pub warning: Color,
    pub critical: Color,
    pub healthy: Color,
    /// Color for borders and separators.
    pub border: Color,
    /// Edge colors by protocol, used when traffic is healthy.
    pub http: Color,
    pub grpc: Color,
    pub tcp: Color,
    /// Badge colors.
    pub app_badge: Color,
    pub service_badge: Color,
    pub service_entry_badge: Color,
    pub unknown_badge: Color,
    /// Style for header rows in tables.
    pub header: Style,
    /// Style for selected/highlighted rows.
    pub selected: Style,
    /// Style for the active tab.
    pub tab_active: Style,
    /// Style for inactive tabs.
    pub tab_inactive: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl RenderTheme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::Gray,
            http: Color::Green,
            grpc: Color::LightGreen,
            tcp: Color::LightBlue,
            app_badge: Color::Cyan,
            service_badge: Color::Magenta,
            service_entry_badge: Color::LightMagenta,
            unknown_badge: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            warning: Color::Yellow,
            critical: Color::Red,
            healthy: Color::Green,
            border: Color::DarkGray,
            http: Color::Green,
            grpc: Color::Green,
            tcp: Color::Blue,
            app_badge: Color::Blue,
            service_badge: Color::Magenta,
            service_entry_badge: Color::Magenta,
            unknown_badge: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            selected: Style::default().bg(Color::LightBlue).add_modifier(Modifier::BOLD),
            tab_active: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Resolve a configured theme name: `dark`, `light` or `auto`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "dark" => Self::dark(),
            "light" => Self::light(),
            _ => Self::auto_detect(),
        }
    }

    /// Get style for a health status
    pub fn status_style(&self, status: HealthStatus) -> Style {
        match status {
            HealthStatus::Healthy => Style::default().fg(self.healthy),
            HealthStatus::Warning => Style::default().fg(self.warning),
            HealthStatus::Critical => {
                Style::default().fg(self.critical).add_modifier(Modifier::BOLD)
            }
        }
    }

    pub fn badge_color(&self, badge: Badge) -> Color {
        match badge {
            Badge::App => self.app_badge,
            Badge::Service => self.service_badge,
            Badge::ServiceEntry => self.service_entry_badge,
            Badge::Unknown => self.unknown_badge,
        }
    }

    /// Edge color: protocol color when healthy, health color otherwise.
    pub fn edge_color(&self, protocol: Protocol, status: HealthStatus) -> Color {
        match status {
            HealthStatus::Critical => self.critical,
            HealthStatus::Warning => self.warning,
            HealthStatus::Healthy => match protocol {
                Protocol::Http => self.http,
                Protocol::Grpc => self.grpc,
                Protocol::Tcp => self.tcp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_color_prefers_health() {
        let theme = RenderTheme::dark();
        assert_eq!(theme.edge_color(Protocol::Tcp, HealthStatus::Healthy), theme.tcp);
        assert_eq!(theme.edge_color(Protocol::Http, HealthStatus::Critical), theme.critical);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(RenderTheme::from_name("light"), RenderTheme::light());
        assert_eq!(RenderTheme::from_name("dark"), RenderTheme::dark());
    }
}
