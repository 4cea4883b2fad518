//! Application state management for the Galley companion.
//!
//! The `App` owns the UI surfaces that depend on session state - the header
//! bar and the profile view - plus the sign-in flow. Each surface follows the
//! same contract: read the current session when it mounts, hold a
//! subscription while mounted, drop it when it unmounts, and never assume
//! other surfaces refresh except through the broadcaster.
//!
//! Network calls run in spawned tasks and report back over an mpsc channel;
//! the UI loop drains that channel between input polls so rendering never
//! blocks on a request.

use base64::Engine;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{AuthClient, AuthError};
use crate::auth::{Session, SessionBroadcaster, SessionWatch};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the auth task result channel.
/// Only one sign-in or edit is ever in flight at a time; 8 is headroom.
const CHANNEL_BUFFER_SIZE: usize = 8;

/// Maximum length for the pasted provider token.
/// Google ID tokens run well over 1KB; 4KB covers them with margin.
pub const MAX_TOKEN_LENGTH: usize = 4096;

/// Maximum length for a display name edit, matching what the profile
/// layouts can show.
pub const MAX_NAME_LENGTH: usize = 40;

// ============================================================================
// Background auth results
// ============================================================================

/// Result of a spawned sign-in or profile-edit task.
///
/// `generation` records which mounted surface instance started the request;
/// a result whose surface has since unmounted is ignored rather than applied.
#[derive(Debug)]
pub enum AuthResult {
    Login {
        generation: u64,
        outcome: Result<Session, AuthError>,
    },
    ProfileUpdate {
        generation: u64,
        outcome: Result<Session, AuthError>,
    },
}

// ============================================================================
// UI surfaces
// ============================================================================

/// Which view the body of the screen shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    SignIn,
    Profile,
}

/// The navigation header, mounted for the lifetime of the app.
/// Shows the signed-in display name (and stars) or a "Sign In" hint.
pub struct HeaderBar {
    pub session: Option<Session>,
    watch: SessionWatch,
}

impl HeaderBar {
    fn mount(broadcaster: &SessionBroadcaster) -> Self {
        Self {
            session: broadcaster.read(),
            watch: broadcaster.subscribe(),
        }
    }

    /// Apply any pending notifications; local copy is stale after each one.
    fn sync(&mut self) {
        if let Some(session) = self.watch.latest_pending() {
            self.session = session;
        }
    }

    pub fn label(&self) -> String {
        match &self.session {
            Some(session) => format!("{} ⭐{}", session.user.name, session.user.stars),
            None => "Sign In".to_string(),
        }
    }
}

/// What the profile view's input line is editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileEdit {
    Name,
    PicturePath,
}

/// The profile view, mounted only while on the profile screen.
pub struct ProfileView {
    generation: u64,
    pub session: Option<Session>,
    watch: SessionWatch,
    pub editing: Option<ProfileEdit>,
    pub input: String,
    pub pending: bool,
    pub error: Option<String>,
}

impl ProfileView {
    fn mount(generation: u64, broadcaster: &SessionBroadcaster) -> Self {
        Self {
            generation,
            session: broadcaster.read(),
            watch: broadcaster.subscribe(),
            editing: None,
            input: String::new(),
            pending: false,
            error: None,
        }
    }

    fn sync(&mut self) {
        if let Some(session) = self.watch.latest_pending() {
            self.session = session;
        }
    }
}

/// The sign-in view: a field for the pasted provider token.
pub struct SignInView {
    generation: u64,
    pub token_input: String,
    pub pending: bool,
    pub error: Option<String>,
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub view: View,
    pub quitting: bool,
    pub status_message: Option<String>,
    pub header: HeaderBar,
    pub profile: Option<ProfileView>,
    pub sign_in: Option<SignInView>,
    broadcaster: SessionBroadcaster,
    client: AuthClient,
    auth_tx: mpsc::Sender<AuthResult>,
    auth_rx: mpsc::Receiver<AuthResult>,
    /// Bumped per mounted surface instance, to tag in-flight requests
    next_generation: u64,
}

impl App {
    pub fn new(client: AuthClient, broadcaster: SessionBroadcaster) -> Self {
        let (auth_tx, auth_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            view: View::Home,
            quitting: false,
            status_message: None,
            header: HeaderBar::mount(&broadcaster),
            profile: None,
            sign_in: None,
            broadcaster,
            client,
            auth_tx,
            auth_rx,
            next_generation: 0,
        }
    }

    pub fn quit(&mut self) {
        self.quitting = true;
    }

    fn fresh_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    // =========================================================================
    // Navigation (mount/unmount of session consumers)
    // =========================================================================

    pub fn go_home(&mut self) {
        // Dropping a view drops its subscription with it
        self.profile = None;
        self.sign_in = None;
        self.status_message = None;
        self.view = View::Home;
    }

    pub fn open_sign_in(&mut self) {
        self.profile = None;
        self.status_message = None;
        let generation = self.fresh_generation();
        self.sign_in = Some(SignInView {
            generation,
            token_input: String::new(),
            pending: false,
            error: None,
        });
        self.view = View::SignIn;
    }

    pub fn open_profile(&mut self) {
        self.sign_in = None;
        self.status_message = None;
        let generation = self.fresh_generation();
        self.profile = Some(ProfileView::mount(generation, &self.broadcaster));
        self.view = View::Profile;
    }

    // =========================================================================
    // Mutations (login / profile edit / logout)
    // =========================================================================

    /// Exchange the pasted provider token for a session, in the background.
    pub fn submit_login(&mut self) {
        let Some(sign_in) = self.sign_in.as_mut() else {
            return;
        };
        let token = sign_in.token_input.trim().to_string();
        if token.is_empty() {
            sign_in.error = Some("Paste your provider token first".to_string());
            return;
        }
        sign_in.pending = true;
        sign_in.error = None;

        let generation = sign_in.generation;
        let client = self.client.clone();
        let tx = self.auth_tx.clone();
        tokio::spawn(async move {
            let outcome = client.login(&token).await;
            if tx
                .send(AuthResult::Login {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                warn!("auth channel closed before login result was delivered");
            }
        });
    }

    /// Submit the profile view's current edit (rename or new picture).
    pub fn submit_profile_edit(&mut self) {
        let Some(profile) = self.profile.as_mut() else {
            return;
        };
        let Some(session) = profile.session.clone() else {
            profile.error = Some("Not signed in".to_string());
            return;
        };
        let Some(field) = profile.editing else {
            return;
        };
        let input = profile.input.trim().to_string();
        profile.pending = true;
        profile.error = None;
        profile.editing = None;
        profile.input.clear();

        let generation = profile.generation;
        let client = self.client.clone();
        let tx = self.auth_tx.clone();
        tokio::spawn(async move {
            let outcome = match field {
                ProfileEdit::Name => client.update_username(&session, &input).await,
                ProfileEdit::PicturePath => match tokio::fs::read(&input).await {
                    Ok(bytes) => {
                        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                        client.update_picture(&session, &encoded).await
                    }
                    Err(e) => Err(AuthError::ValidationRejected(format!(
                        "Could not read {}: {}",
                        input, e
                    ))),
                },
            };
            if tx
                .send(AuthResult::ProfileUpdate {
                    generation,
                    outcome,
                })
                .await
                .is_err()
            {
                warn!("auth channel closed before update result was delivered");
            }
        });
    }

    /// Clear the persisted session; every surface converges via broadcast.
    pub fn logout(&mut self) {
        if let Err(e) = self.broadcaster.clear() {
            warn!(error = %e, "failed to clear session");
            self.status_message = Some("Could not clear the stored session".to_string());
            return;
        }
        self.go_home();
        self.status_message = Some("Signed out".to_string());
    }

    // =========================================================================
    // Background result handling
    // =========================================================================

    /// Drain completed auth tasks and pending session notifications.
    /// Called once per UI loop iteration.
    pub fn tick(&mut self) {
        while let Ok(result) = self.auth_rx.try_recv() {
            self.process_auth_result(result);
        }
        self.header.sync();
        if let Some(profile) = self.profile.as_mut() {
            profile.sync();
        }
    }

    fn process_auth_result(&mut self, result: AuthResult) {
        match result {
            AuthResult::Login {
                generation,
                outcome,
            } => self.process_login_result(generation, outcome),
            AuthResult::ProfileUpdate {
                generation,
                outcome,
            } => self.process_update_result(generation, outcome),
        }
    }

    fn process_login_result(&mut self, generation: u64, outcome: Result<Session, AuthError>) {
        let mounted = self
            .sign_in
            .as_ref()
            .is_some_and(|v| v.generation == generation);
        if !mounted {
            debug!("ignoring login result for an unmounted sign-in view");
            return;
        }

        match outcome {
            Ok(session) => {
                info!(user = %session.user.name, "signed in");
                if let Err(e) = self.broadcaster.write(session) {
                    warn!(error = %e, "failed to persist session");
                    if let Some(sign_in) = self.sign_in.as_mut() {
                        sign_in.pending = false;
                        sign_in.error = Some("Could not store the session".to_string());
                    }
                    return;
                }
                // Navigate first: go_home clears any stale status line
                self.go_home();
                self.status_message = Some("Signed in".to_string());
            }
            Err(e) => {
                // Failed login: still anonymous, error shown only here
                info!(error = %e, "sign-in failed");
                if let Some(sign_in) = self.sign_in.as_mut() {
                    sign_in.pending = false;
                    sign_in.error = Some(e.to_string());
                }
            }
        }
    }

    fn process_update_result(&mut self, generation: u64, outcome: Result<Session, AuthError>) {
        // An invalid token must not keep being presented as valid to other
        // surfaces, so forced logout applies even if the initiating view has
        // unmounted. Everything else is dropped for unmounted views.
        if let Err(AuthError::Unauthorized) = &outcome {
            warn!("backend rejected the stored token, forcing logout");
            if let Err(e) = self.broadcaster.clear() {
                warn!(error = %e, "failed to clear session after token rejection");
            }
            self.status_message = Some("Session expired, please sign in again".to_string());
            if let Some(profile) = self.profile.as_mut() {
                profile.pending = false;
            }
            return;
        }

        let mounted = self
            .profile
            .as_ref()
            .is_some_and(|v| v.generation == generation);
        if !mounted {
            debug!("ignoring profile update result for an unmounted view");
            return;
        }
        let profile = self.profile.as_mut().expect("profile mounted");
        profile.pending = false;

        match outcome {
            Ok(session) => {
                info!(user = %session.user.name, "profile updated");
                if let Err(e) = self.broadcaster.write(session) {
                    warn!(error = %e, "failed to persist updated session");
                    profile.error = Some("Could not store the updated session".to_string());
                }
                // The view itself refreshes through the broadcast, same as
                // every other surface
            }
            Err(e) => {
                // Prior session stays intact on a rejected edit
                info!(error = %e, "profile update failed");
                profile.error = Some(e.to_string());
            }
        }
    }
}
