pub mod service;
pub mod types;

pub use service::{ActionRunner, JobScheduler};
pub use types::{Job, JobAction, JobInput};
