pub mod conversation;
pub mod memory;
pub mod place;
pub mod session;
pub mod usage;
