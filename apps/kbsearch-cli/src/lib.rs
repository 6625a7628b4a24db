pub mod chunks;
pub mod layout;
