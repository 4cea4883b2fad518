use ratatui::style::{Color, Modifier, Style};

// Color palette, loosely after the website's dark blue / dark red theme
pub const PRIMARY: Color = Color::Rgb(48, 80, 144);
pub const ACCENT: Color = Color::Rgb(176, 48, 48);
pub const ERROR: Color = Color::Rgb(192, 64, 64);
pub const MUTED: Color = Color::Rgb(128, 128, 128);

pub fn title_style() -> Style {
    Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn nav_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(PRIMARY)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    } else {
        Style::default().fg(Color::White)
    }
}

pub fn account_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

pub fn error_style() -> Style {
    Style::default().fg(ERROR)
}

pub fn input_style() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(32, 32, 40))
}

pub fn status_bar_style() -> Style {
    Style::default().bg(Color::Rgb(32, 32, 40)).fg(Color::White)
}
