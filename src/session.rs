//! Session gate: every preference load and feed fetch goes through here.
//!
//! The persisted session lives in local storage under [`SESSION_KEY`]. The
//! gate hands out a [`Session`] only while one is stored and unexpired; in
//! every other case the caller gets [`Redirect::SignIn`] and must stop.
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::preferences::PreferenceStore;
use crate::remote::AuthClient;
use crate::storage::Database;

/// Local storage key for the persisted session.
pub const SESSION_KEY: &str = "auth.session";

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ============================================================================
// Identity and Session
// ============================================================================

/// Opaque id of the signed-in principal. Namespaces all preference data.
///
/// Only the auth client and the stored session mint identities, so callers
/// outside this crate get one from the [`SessionGate`] or a sign-in:
///
/// ```compile_fail
/// let forged = reachnews::session::SessionIdentity::new("someone-else");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity(String);

impl SessionIdentity {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the caller must go instead of continuing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    SignIn,
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Redirect::SignIn => f.write_str("sign-in required"),
        }
    }
}

/// An authenticated session.
///
/// Tokens are wrapped in `SecretString` so they never show up in `Debug`
/// output or logs.
#[derive(Clone)]
pub struct Session {
    pub identity: SessionIdentity,
    pub email: String,
    pub display_name: Option<String>,
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
    }

    /// Name shown to the user: display name, falling back to email.
    pub fn display_label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.email)
    }
}

/// On-disk form of [`Session`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    user_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl From<&Session> for StoredSession {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.identity.as_str().to_string(),
            email: session.email.clone(),
            display_name: session.display_name.clone(),
            access_token: session.access_token.expose_secret().to_string(),
            refresh_token: session
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            expires_at: session.expires_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(stored: StoredSession) -> Self {
        Self {
            identity: SessionIdentity::new(stored.user_id),
            email: stored.email,
            display_name: stored.display_name,
            access_token: SecretString::from(stored.access_token),
            refresh_token: stored.refresh_token.map(SecretString::from),
            expires_at: stored.expires_at,
        }
    }
}

// ============================================================================
// SessionGate
// ============================================================================

/// Checks, establishes and tears down the persisted session.
#[derive(Clone)]
pub struct SessionGate {
    db: Database,
    preferences: PreferenceStore,
}

impl SessionGate {
    pub fn new(db: Database) -> Self {
        Self {
            preferences: PreferenceStore::new(db.clone()),
            db,
        }
    }

    /// The session if one is stored and unexpired, otherwise a redirect.
    pub async fn ensure_authenticated(&self) -> Result<Session, Redirect> {
        self.ensure_authenticated_at(Utc::now()).await
    }

    pub async fn ensure_authenticated_at(&self, now: DateTime<Utc>) -> Result<Session, Redirect> {
        let raw = match self.db.get_entry(SESSION_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!("No stored session, redirecting to sign-in");
                return Err(Redirect::SignIn);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session, redirecting to sign-in");
                return Err(Redirect::SignIn);
            }
        };

        let session: Session = match serde_json::from_str::<StoredSession>(&raw) {
            Ok(stored) => stored.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt stored session, redirecting to sign-in");
                return Err(Redirect::SignIn);
            }
        };

        if session.is_expired_at(now) {
            tracing::info!(
                identity = %session.identity,
                expired_at = %session.expires_at,
                "Session expired, redirecting to sign-in"
            );
            return Err(Redirect::SignIn);
        }

        Ok(session)
    }

    /// Persist a freshly issued session after retiring the stored one.
    ///
    /// A stored session of another identity is signed out in full, which
    /// clears that identity's preferences. A stored session of the same
    /// identity only has its old tokens invalidated remotely.
    pub async fn establish_replacing(
        &self,
        auth: &AuthClient,
        session: &Session,
    ) -> anyhow::Result<()> {
        if let Some(previous) = self.stored_session().await {
            if previous.identity != session.identity {
                tracing::info!(
                    previous = %previous.identity,
                    identity = %session.identity,
                    "Different identity signing in, signing out the previous one"
                );
                self.sign_out(auth).await;
            } else if let Err(e) = auth.sign_out(&previous).await {
                tracing::warn!(identity = %previous.identity, error = %e, "Failed to invalidate previous tokens");
            }
        }
        self.establish(session).await
    }

    /// Persist a freshly issued session, replacing any previous one.
    pub async fn establish(&self, session: &Session) -> anyhow::Result<()> {
        let json = serde_json::to_string(&StoredSession::from(session))?;
        self.db.set_entry(SESSION_KEY, &json).await?;
        tracing::info!(identity = %session.identity, "Session established");
        Ok(())
    }

    /// Sign out: invalidate the remote session (best effort), then clear the
    /// identity's preferences and the stored session regardless.
    ///
    /// Destructive; there is no undo. Without a stored session there is
    /// nothing to clear and the caller is simply sent to sign-in.
    pub async fn sign_out(&self, auth: &AuthClient) -> Redirect {
        if let Some(session) = &self.stored_session().await {
            if let Err(e) = auth.sign_out(session).await {
                tracing::warn!(identity = %session.identity, error = %e, "Remote sign-out failed, clearing local state anyway");
            }
            self.preferences.clear(&session.identity).await;
        }

        if let Err(e) = self.db.remove_entry(SESSION_KEY).await {
            tracing::error!(error = %e, "Failed to remove stored session");
        }

        Redirect::SignIn
    }

    /// The stored session, expired or not.
    async fn stored_session(&self) -> Option<Session> {
        match self.db.get_entry(SESSION_KEY).await {
            Ok(Some(raw)) => serde_json::from_str::<StoredSession>(&raw)
                .ok()
                .map(Session::from),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored session");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
