pub mod domain;
pub mod pattern;
pub mod store;

pub use store::{PatternPolicy, PolicyStore, UserAllowlist, UserEntry};
