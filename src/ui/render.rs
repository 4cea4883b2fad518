use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, ProfileEdit, View};

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header bar
            Constraint::Min(8),    // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    match app.view {
        View::Home => render_home(frame, chunks[1]),
        View::SignIn => render_sign_in(frame, app, chunks[1]),
        View::Profile => render_profile(frame, app, chunks[1]),
    }
    render_status_bar(frame, app, chunks[2]);
}

/// The navigation header: nav links on the left, account state on the right.
/// The account label comes straight from the header consumer's session copy.
fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let nav = [
        ("[h] Home", app.view == View::Home),
        ("[p] Profile", app.view == View::Profile),
    ];

    let mut spans = vec![
        Span::styled(" Galley ", styles::title_style()),
        Span::raw("  "),
    ];
    for (i, (label, selected)) in nav.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        spans.push(Span::styled(*label, styles::nav_style(*selected)));
    }

    let account = app.header.label();
    let used: usize = spans.iter().map(|s| s.content.len()).sum();
    let pad = (area.width as usize).saturating_sub(used + account.len() + 3);
    spans.push(Span::raw(" ".repeat(pad)));
    spans.push(Span::styled(account, styles::account_style()));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_home(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::raw(""),
        Line::styled("  Welcome to the Galley companion.", styles::title_style()),
        Line::raw(""),
        Line::raw("  Track your stars and level, and manage your account."),
        Line::raw(""),
        Line::from(vec![
            Span::raw("  Press "),
            Span::styled("s", styles::account_style()),
            Span::raw(" to sign in, "),
            Span::styled("p", styles::account_style()),
            Span::raw(" for your profile, "),
            Span::styled("q", styles::account_style()),
            Span::raw(" to quit."),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_sign_in(frame: &mut Frame, app: &App, area: Rect) {
    let Some(sign_in) = app.sign_in.as_ref() else {
        return;
    };

    let mut lines = vec![
        Line::raw(""),
        Line::styled("  Sign in to Galley", styles::title_style()),
        Line::raw(""),
        Line::raw("  Paste the token from your provider sign-in, then press Enter."),
        Line::raw(""),
    ];

    // Token input, truncated from the left so the tail stays visible
    let max = (area.width as usize).saturating_sub(8).max(8);
    let shown = tail_truncated(&sign_in.token_input, max);
    lines.push(Line::from(vec![
        Span::raw("  Token: "),
        Span::styled(format!("{}▏", shown), styles::input_style()),
    ]));
    lines.push(Line::raw(""));

    if sign_in.pending {
        lines.push(Line::styled("  Signing in...", styles::muted_style()));
    }
    if let Some(error) = &sign_in.error {
        lines.push(Line::styled(format!("  {}", error), styles::error_style()));
    }
    lines.push(Line::raw(""));
    lines.push(Line::styled("  [Esc] back", styles::muted_style()));

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

/// Keep the last `max` characters of `input`, prefixing an ellipsis when
/// anything was dropped. Cuts on character boundaries, so multibyte input
/// never panics the draw.
fn tail_truncated(input: &str, max: usize) -> String {
    match input.char_indices().rev().nth(max.saturating_sub(1)) {
        Some((idx, _)) if idx > 0 => format!("…{}", &input[idx..]),
        _ => input.to_string(),
    }
}

fn render_profile(frame: &mut Frame, app: &App, area: Rect) {
    let Some(profile) = app.profile.as_ref() else {
        return;
    };

    let mut lines = vec![Line::raw("")];
    match &profile.session {
        Some(session) => {
            let user = &session.user;
            lines.push(Line::styled(
                format!("  {}", user.name),
                styles::title_style(),
            ));
            lines.push(Line::raw(format!("  {}", user.email)));
            lines.push(Line::raw(match &user.picture {
                Some(_) => "  Picture: set".to_string(),
                None => "  Picture: default".to_string(),
            }));
            lines.push(Line::raw(""));
            lines.push(Line::raw(format!("  ⭐ Stars   {}", user.stars)));
            lines.push(Line::raw(format!("  🏆 Level   {}", user.level)));
            lines.push(Line::raw(""));
            lines.push(Line::raw(format!(
                "  Signed in {}",
                session.signed_in_at.format("%Y-%m-%d %H:%M UTC")
            )));
            lines.push(Line::raw(""));

            match profile.editing {
                Some(ProfileEdit::Name) => {
                    lines.push(Line::from(vec![
                        Span::raw("  New name: "),
                        Span::styled(format!("{}▏", profile.input), styles::input_style()),
                    ]));
                }
                Some(ProfileEdit::PicturePath) => {
                    lines.push(Line::from(vec![
                        Span::raw("  Image file: "),
                        Span::styled(format!("{}▏", profile.input), styles::input_style()),
                    ]));
                }
                None => {
                    lines.push(Line::styled(
                        "  [e] change name   [i] change picture   [l] log out   [Esc] back",
                        styles::muted_style(),
                    ));
                }
            }
        }
        None => {
            lines.push(Line::raw("  Not signed in."));
            lines.push(Line::raw(""));
            lines.push(Line::styled(
                "  [s] sign in   [Esc] back",
                styles::muted_style(),
            ));
        }
    }

    if profile.pending {
        lines.push(Line::styled("  Saving...", styles::muted_style()));
    }
    if let Some(error) = &profile.error {
        lines.push(Line::styled(format!("  {}", error), styles::error_style()));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let message = app.status_message.as_deref().unwrap_or("");
    let line = Line::from(vec![
        Span::raw(format!(" {}", message)),
        Span::raw(" "),
    ]);
    frame.render_widget(
        Paragraph::new(line).style(styles::status_bar_style()),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::AuthClient;
    use crate::auth::{SessionBroadcaster, SessionStore};
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    #[test]
    fn test_tail_truncated_ascii() {
        assert_eq!(tail_truncated("short", 8), "short");
        assert_eq!(tail_truncated("exactly8", 8), "exactly8");
        assert_eq!(tail_truncated("0123456789", 4), "…6789");
    }

    #[test]
    fn test_tail_truncated_multibyte() {
        let token = "あ".repeat(100);
        let shown = tail_truncated(&token, 8);
        assert_eq!(shown, format!("…{}", "あ".repeat(8)));

        // Mixed-width input cuts cleanly too
        assert_eq!(tail_truncated("abcあいう", 3), "…あいう");
        assert_eq!(tail_truncated("", 8), "");
    }

    #[tokio::test]
    async fn test_sign_in_draws_long_multibyte_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let broadcaster = SessionBroadcaster::with_poll_interval(
            SessionStore::new(dir.path().to_path_buf()),
            Duration::from_secs(600),
        );
        let client = AuthClient::new("http://127.0.0.1:9".to_string()).expect("client");
        let mut app = App::new(client, broadcaster);

        app.open_sign_in();
        app.sign_in.as_mut().expect("sign-in mounted").token_input = "あ".repeat(100);

        // A pasted token wider than the terminal must render, not panic
        let backend = TestBackend::new(40, 20);
        let mut terminal = Terminal::new(backend).expect("terminal");
        terminal.draw(|f| render(f, &app)).expect("draw sign-in view");
    }
}
