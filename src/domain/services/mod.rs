pub mod assignment;
pub mod event_service;
pub mod invitation_service;
pub mod user_service;
