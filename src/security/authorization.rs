use crate::core::types::ActorId;
use serde::Deserialize;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

/// Decides whether an actor may use state-mutating commands.
pub trait Authorizer: Send + Sync {
    fn is_authorized<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

impl<F> Authorizer for F
where
    F: Fn(ActorId) -> bool + Send + Sync,
{
    fn is_authorized<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self(actor) })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub id: ActorId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UsersDocument {
    #[serde(default)]
    authorized_users: Vec<AuthorizedUser>,
}

/// Allowlist backed by a JSON users file, re-read on every check so edits
/// take effect without a restart.
///
/// A missing or malformed file authorizes nobody.
#[derive(Debug, Clone)]
pub struct UsersFileAuthorizer {
    path: PathBuf,
}

impl UsersFileAuthorizer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub async fn users(&self) -> Vec<AuthorizedUser> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), "users file unreadable: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str::<UsersDocument>(&raw) {
            Ok(doc) => doc.authorized_users,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "users file is not valid JSON: {e}");
                Vec::new()
            }
        }
    }
}

impl Authorizer for UsersFileAuthorizer {
    fn is_authorized<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self.users().await.iter().any(|user| user.id == actor) })
    }
}
