use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::domain::models::user::AuthUser;
use crate::domain::ports::{IdentityProvider, SessionWatch};

// One session cell standing in for an external credential system.
pub struct LocalIdentity {
    session: watch::Sender<Option<AuthUser>>,
}

impl LocalIdentity {
    pub fn new() -> Self {
        Self {
            session: watch::channel(None).0,
        }
    }

    pub fn sign_in(&self, user: AuthUser) {
        self.session.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        self.session.send_replace(None);
    }
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_user(&self) -> Option<AuthUser> {
        self.session.borrow().clone()
    }

    fn session_changes(&self) -> SessionWatch {
        let mut src = self.session.subscribe();
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            loop {
                let snapshot = src.borrow_and_update().clone();
                if tx.send(snapshot).await.is_err() {
                    break;
                }
                if src.changed().await.is_err() {
                    break;
                }
            }
        });
        SessionWatch::new(rx)
    }
}
