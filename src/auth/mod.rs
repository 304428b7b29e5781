// Dual-source credential verification.
//
// Two capability-equivalent providers answer the same question ("what is the
// stored credential for this username?") and are consulted in fixed priority
// order: the remote directory first (authoritative, so rotated passwords win
// when the link is up), then the local cache. A successful remote match is
// written through to the local cache so the same user id keeps working
// offline afterwards.

use rusqlite::Connection;

use crate::db::schema::{self, UserCredential};
use crate::error::Result;
use crate::remote::RemoteStore;

/// One place credentials can come from.
trait CredentialSource {
    fn name(&self) -> &'static str;

    fn lookup(&self, username: &str) -> Option<UserCredential>;

    /// Invoked after a password verified against this source's credential.
    fn on_verified(&self, _credential: &UserCredential) {}
}

struct RemoteCredentials<'a> {
    remote: &'a dyn RemoteStore,
    cache: &'a Connection,
}

impl CredentialSource for RemoteCredentials<'_> {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn lookup(&self, username: &str) -> Option<UserCredential> {
        match self.remote.find_user(username) {
            Ok(Some(user)) => Some(UserCredential {
                id: user.id,
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
            }),
            Ok(None) => {
                log::debug!("User '{}' not present remotely", username);
                None
            }
            Err(e) => {
                log::warn!("Remote verification unavailable: {}", e);
                None
            }
        }
    }

    fn on_verified(&self, credential: &UserCredential) {
        // Insert-if-absent: a credential already cached (including its hash)
        // is never overwritten by the write-through.
        match schema::insert_user_if_absent(self.cache, credential) {
            Ok(true) => log::info!("Cached remote user '{}' for offline use", credential.username),
            Ok(false) => {}
            Err(e) => log::warn!("Failed to cache remote user '{}': {}", credential.username, e),
        }
    }
}

struct LocalCredentials<'a> {
    conn: &'a Connection,
}

impl CredentialSource for LocalCredentials<'_> {
    fn name(&self) -> &'static str {
        "local"
    }

    fn lookup(&self, username: &str) -> Option<UserCredential> {
        match schema::get_user_by_username(self.conn, username) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Local credential lookup failed: {}", e);
                None
            }
        }
    }
}

pub struct AuthGateway<'a> {
    remote: &'a dyn RemoteStore,
    conn: &'a Connection,
}

impl<'a> AuthGateway<'a> {
    pub fn new(remote: &'a dyn RemoteStore, conn: &'a Connection) -> Self {
        Self { remote, conn }
    }

    /// Verify a username/password pair. Returns the authenticated user id,
    /// or None when no source holds a matching credential. Any remote
    /// failure (unreachable, unknown user, hash mismatch) falls through to
    /// the local cache without a retry.
    pub fn verify(&self, username: &str, password: &str) -> Result<Option<String>> {
        let remote_source = RemoteCredentials {
            remote: self.remote,
            cache: self.conn,
        };
        let local_source = LocalCredentials { conn: self.conn };
        let sources: [&dyn CredentialSource; 2] = [&remote_source, &local_source];

        for source in sources {
            let Some(credential) = source.lookup(username) else {
                continue;
            };
            // A malformed stored hash counts as a mismatch, not a fault
            if bcrypt::verify(password, &credential.password_hash).unwrap_or(false) {
                log::info!("User '{}' verified via {} source", username, source.name());
                source.on_verified(&credential);
                return Ok(Some(credential.id));
            }
        }

        log::info!("Invalid credentials for '{}' on all sources", username);
        Ok(None)
    }
}
