//! Terminal color theme.
//!
//! A [`ThemeVariant`] (dark or light background) plus an accent color from
//! the `themeColor` setting produce a [`StyleMap`] of semantic roles. The
//! variant comes from the config file when it names one, otherwise from the
//! `themeMode` setting, where `system` consults `COLORFGBG`.

use crate::settings::ThemeMode;
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeVariant {
    Dark,
    Light,
}

impl ThemeVariant {
    /// Parses a variant name (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    /// Picks the variant for a `themeMode`. `System` reads the terminal
    /// background from `COLORFGBG` (`fg;bg`) and defaults to dark.
    pub fn for_mode(mode: ThemeMode, colorfgbg: Option<&str>) -> Self {
        match mode {
            ThemeMode::Dark => Self::Dark,
            ThemeMode::Light => Self::Light,
            ThemeMode::System => colorfgbg
                .and_then(|v| v.rsplit(';').next())
                .and_then(|bg| bg.trim().parse::<u8>().ok())
                .map_or(Self::Dark, |bg| match bg {
                    7 | 15 => Self::Light,
                    _ => Self::Dark,
                }),
        }
    }

    /// Config override first, then the setting.
    pub fn resolve(config_theme: &str, mode: ThemeMode, colorfgbg: Option<&str>) -> Self {
        Self::from_str_name(config_theme).unwrap_or_else(|| Self::for_mode(mode, colorfgbg))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
        }
    }
}

/// Maps the `themeColor` setting to a terminal color. Unknown names use blue.
pub fn accent_color(theme_color: &str) -> Color {
    match theme_color.trim().to_ascii_lowercase().as_str() {
        "red" => Color::Red,
        "orange" => Color::Rgb(0xF7, 0x72, 0x34),
        "yellow" | "gold" => Color::Yellow,
        "green" | "lime" => Color::Green,
        "cyan" => Color::Cyan,
        "purple" | "violet" => Color::Magenta,
        "pink" | "magenta" => Color::LightMagenta,
        _ => Color::Blue,
    }
}

/// Semantic UI roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SidebarItem,
    SidebarSelected,
    SidebarHeading,
    Count,
    EntryUnread,
    EntryRead,
    EntrySelected,
    EntryMeta,
    Star,
    ReaderHeading,
    ReaderBody,
    ReaderMeta,
    ReaderCode,
    ReaderQuote,
    ReaderImage,
    StatusBar,
    StatusError,
    Banner,
    Border,
    BorderFocused,
    Splitter,
}

impl Role {
    const COUNT: usize = Role::Splitter as usize + 1;
}

/// Resolved style per [`Role`].
#[derive(Debug, Clone)]
pub struct StyleMap {
    styles: [Style; Role::COUNT],
}

impl StyleMap {
    pub fn new(variant: ThemeVariant, accent: Color) -> Self {
        let (fg, dim, subtle_bg) = match variant {
            ThemeVariant::Dark => (Color::Reset, Color::DarkGray, Color::DarkGray),
            ThemeVariant::Light => (Color::Black, Color::DarkGray, Color::Gray),
        };
        let selected = Style::default().bg(accent).fg(Color::White);
        let bold = Style::default().fg(fg).add_modifier(Modifier::BOLD);

        let mut styles = [Style::default(); Role::COUNT];
        let mut set = |role: Role, style: Style| styles[role as usize] = style;
        set(Role::SidebarItem, Style::default().fg(fg));
        set(Role::SidebarSelected, selected);
        set(Role::SidebarHeading, Style::default().fg(accent).add_modifier(Modifier::BOLD));
        set(Role::Count, Style::default().fg(dim));
        set(Role::EntryUnread, bold);
        set(Role::EntryRead, Style::default().fg(dim));
        set(Role::EntrySelected, selected);
        set(Role::EntryMeta, Style::default().fg(dim));
        set(
            Role::Star,
            Style::default().fg(match variant {
                ThemeVariant::Dark => Color::Yellow,
                ThemeVariant::Light => Color::Magenta,
            }),
        );
        set(Role::ReaderHeading, Style::default().fg(accent).add_modifier(Modifier::BOLD));
        set(Role::ReaderBody, Style::default().fg(fg));
        set(Role::ReaderMeta, Style::default().fg(dim));
        set(Role::ReaderCode, Style::default().fg(fg).bg(subtle_bg));
        set(Role::ReaderQuote, Style::default().fg(dim).add_modifier(Modifier::ITALIC));
        set(Role::ReaderImage, Style::default().fg(accent));
        set(Role::StatusBar, Style::default().bg(subtle_bg).fg(Color::White));
        set(Role::StatusError, Style::default().bg(Color::Red).fg(Color::White));
        set(Role::Banner, Style::default().bg(accent).fg(Color::White).add_modifier(Modifier::BOLD));
        set(Role::Border, Style::default().fg(dim));
        set(Role::BorderFocused, Style::default().fg(accent));
        set(Role::Splitter, Style::default().fg(accent).add_modifier(Modifier::BOLD));
        Self { styles }
    }

    pub fn get(&self, role: Role) -> Style {
        self.styles[role as usize]
    }
}
