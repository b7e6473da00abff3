pub mod jobs;
pub mod notifications;
