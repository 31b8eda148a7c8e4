pub(crate) mod change_bus;
pub mod memory_store;
pub mod sqlite_store;
