use std::sync::Arc;

use crate::config::Config;
use crate::domain::ports::DocumentStore;
use crate::domain::services::event_service::EventService;
use crate::domain::services::invitation_service::InvitationService;
use crate::domain::services::user_service::UserService;
use crate::infra::identity::LocalIdentity;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<LocalIdentity>,
    pub event_service: Arc<EventService>,
    pub invitation_service: Arc<InvitationService>,
    pub user_service: Arc<UserService>,
}
