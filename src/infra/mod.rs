pub mod factory;
pub mod identity;
pub mod stores;
