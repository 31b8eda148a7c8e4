pub mod event;
pub mod invite;
pub mod user;
