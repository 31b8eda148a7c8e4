use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::domain::models::invite::{Invite, InviteStatus};
use crate::domain::ports::{DocPath, DocumentStore, DocumentWatch, FieldFilter, QueryWatch, TxNext};
use crate::error::AppError;

const COLLECTION: &str = "invites";

pub struct InviteWatch {
    inner: DocumentWatch,
}

impl InviteWatch {
    pub async fn next(&mut self) -> Result<Option<Invite>, AppError> {
        match self.inner.next().await {
            None => Err(AppError::Store("invite subscription closed".to_string())),
            Some(None) => Ok(None),
            Some(Some(value)) => Ok(Some(Invite::from_value(value)?)),
        }
    }

    pub fn cancel(self) {}
}

pub struct InviteListWatch {
    inner: QueryWatch,
}

impl InviteListWatch {
    pub async fn next(&mut self) -> Result<Vec<Invite>, AppError> {
        let docs = self
            .inner
            .next()
            .await
            .ok_or_else(|| AppError::Store("invite subscription closed".to_string()))?;
        docs.into_iter()
            .map(|doc| Invite::from_value(doc.data))
            .collect()
    }

    pub fn cancel(self) {}
}

pub struct InvitationService {
    store: Arc<dyn DocumentStore>,
}

impl InvitationService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // At most one pending invite per event and invited user; settled
    // invites do not block a new one.
    pub async fn create_invite(
        &self,
        event_id: &str,
        inviter_user_id: &str,
        invited_user_id: &str,
        invited_user_name: Option<&str>,
    ) -> Result<String, AppError> {
        let filters = [
            FieldFilter::eq("eventId", json!(event_id)),
            FieldFilter::eq("invitedUserId", json!(invited_user_id)),
            FieldFilter::eq("status", json!("pending")),
        ];
        let existing = self.store.query(COLLECTION, &filters).await?;
        if let Some(doc) = existing.first() {
            return Err(AppError::DuplicateInvite {
                invite_id: doc.id.clone(),
            });
        }

        let invite = Invite::new(event_id, inviter_user_id, invited_user_id, invited_user_name);
        let path = DocPath::new(COLLECTION, &invite.id);
        self.store.set(&path, invite.to_value()?).await?;

        info!(
            "Created invite {} to event {} for user {}",
            invite.id, event_id, invited_user_id
        );
        Ok(invite.id)
    }

    pub async fn cancel_invite(
        &self,
        invite_id: &str,
        acting_user_id: &str,
    ) -> Result<(), AppError> {
        self.transition(invite_id, acting_user_id, InviteStatus::Cancelled, |invite, actor| {
            invite.inviter_user_id == actor
        })
        .await
    }

    // Accepting does not join the event; the caller follows up with
    // EventService::add_participant, which is safe to retry if this call
    // succeeded but the join did not.
    pub async fn accept_invite(
        &self,
        invite_id: &str,
        acting_user_id: &str,
    ) -> Result<(), AppError> {
        self.transition(invite_id, acting_user_id, InviteStatus::Accepted, |invite, actor| {
            invite.invited_user_id == actor
        })
        .await
    }

    pub async fn decline_invite(
        &self,
        invite_id: &str,
        acting_user_id: &str,
    ) -> Result<(), AppError> {
        self.transition(invite_id, acting_user_id, InviteStatus::Declined, |invite, actor| {
            invite.invited_user_id == actor
        })
        .await
    }

    pub async fn watch_pending_invites(&self, user_id: &str) -> Result<InviteListWatch, AppError> {
        let filters = [
            FieldFilter::eq("invitedUserId", json!(user_id)),
            FieldFilter::eq("status", json!("pending")),
        ];
        let inner = self.store.watch_query(COLLECTION, &filters).await?;
        Ok(InviteListWatch { inner })
    }

    // All states, not just pending, so senders see outcomes as they happen.
    pub async fn watch_invites_by_inviter(
        &self,
        inviter_user_id: &str,
    ) -> Result<InviteListWatch, AppError> {
        let filters = [FieldFilter::eq("inviterUserId", json!(inviter_user_id))];
        let inner = self.store.watch_query(COLLECTION, &filters).await?;
        Ok(InviteListWatch { inner })
    }

    pub async fn watch_invite(&self, invite_id: &str) -> Result<InviteWatch, AppError> {
        let path = DocPath::new(COLLECTION, invite_id);
        let inner = self.store.watch(&path).await?;
        Ok(InviteWatch { inner })
    }

    // Checks run in a fixed order inside one transaction: existence, then
    // state, then actor. A settled invite reports InvalidState no matter
    // who asks.
    async fn transition(
        &self,
        invite_id: &str,
        acting_user_id: &str,
        next: InviteStatus,
        authorized: fn(&Invite, &str) -> bool,
    ) -> Result<(), AppError> {
        let path = DocPath::new(COLLECTION, invite_id);
        let id = invite_id.to_string();
        let actor = acting_user_id.to_string();

        self.store
            .transaction(
                &path,
                Box::new(move |current| {
                    let value =
                        current.ok_or_else(|| AppError::NotFound(format!("invite {id}")))?;
                    let mut invite = Invite::from_value(value)?;
                    if invite.status != InviteStatus::Pending {
                        return Err(AppError::InvalidState(format!(
                            "invite {id} is already {}",
                            invite.status
                        )));
                    }
                    if !authorized(&invite, &actor) {
                        return Err(AppError::NotAuthorized(format!(
                            "user {actor} may not modify invite {id}"
                        )));
                    }
                    invite.status = next;
                    Ok(TxNext::Write(invite.to_value()?))
                }),
            )
            .await?;

        info!("Invite {} is now {}", invite_id, next);
        Ok(())
    }
}
