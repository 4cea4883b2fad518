//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, ProfileEdit, View, MAX_NAME_LENGTH, MAX_TOKEN_LENGTH};

/// Handle a key event. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return true;
    }

    match app.view {
        View::Home => handle_home(app, key),
        View::SignIn => handle_sign_in(app, key),
        View::Profile => handle_profile(app, key),
    }

    app.quitting
}

fn handle_home(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('s') => app.open_sign_in(),
        KeyCode::Char('p') => app.open_profile(),
        KeyCode::Char('h') => app.go_home(),
        _ => {}
    }
}

fn handle_sign_in(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.go_home(),
        KeyCode::Enter => app.submit_login(),
        KeyCode::Backspace => {
            if let Some(sign_in) = app.sign_in.as_mut() {
                sign_in.token_input.pop();
            }
        }
        KeyCode::Char(c) => {
            // Tokens arrive via paste, which crossterm delivers as a burst
            // of char events
            if let Some(sign_in) = app.sign_in.as_mut() {
                if sign_in.token_input.len() < MAX_TOKEN_LENGTH {
                    sign_in.token_input.push(c);
                }
            }
        }
        _ => {}
    }
}

fn handle_profile(app: &mut App, key: KeyEvent) {
    let editing = app
        .profile
        .as_ref()
        .and_then(|p| p.editing);

    match editing {
        Some(field) => handle_profile_edit(app, key, field),
        None => match key.code {
            KeyCode::Esc | KeyCode::Char('h') => app.go_home(),
            KeyCode::Char('q') => app.quit(),
            KeyCode::Char('s') => {
                // Only reachable while anonymous
                if app.profile.as_ref().is_some_and(|p| p.session.is_none()) {
                    app.open_sign_in();
                }
            }
            KeyCode::Char('e') => start_edit(app, ProfileEdit::Name),
            KeyCode::Char('i') => start_edit(app, ProfileEdit::PicturePath),
            KeyCode::Char('l') => {
                if app.profile.as_ref().is_some_and(|p| p.session.is_some()) {
                    app.logout();
                }
            }
            _ => {}
        },
    }
}

fn start_edit(app: &mut App, field: ProfileEdit) {
    if let Some(profile) = app.profile.as_mut() {
        if profile.session.is_some() && !profile.pending {
            profile.editing = Some(field);
            profile.input.clear();
            profile.error = None;
        }
    }
}

fn handle_profile_edit(app: &mut App, key: KeyEvent, field: ProfileEdit) {
    match key.code {
        KeyCode::Esc => {
            if let Some(profile) = app.profile.as_mut() {
                profile.editing = None;
                profile.input.clear();
            }
        }
        KeyCode::Enter => app.submit_profile_edit(),
        KeyCode::Backspace => {
            if let Some(profile) = app.profile.as_mut() {
                profile.input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(profile) = app.profile.as_mut() {
                let limit = match field {
                    ProfileEdit::Name => MAX_NAME_LENGTH,
                    // Paths can be long; cap them the same way as tokens
                    ProfileEdit::PicturePath => MAX_TOKEN_LENGTH,
                };
                if profile.input.len() < limit {
                    profile.input.push(c);
                }
            }
        }
        _ => {}
    }
}
