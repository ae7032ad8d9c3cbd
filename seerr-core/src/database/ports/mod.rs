//! Repository ports grouped by store. Postgres adapters live under
//! `database::infrastructure::postgres`; tests substitute in-memory fakes.

pub mod approval_rules;
pub mod calendar;
pub mod credentials;
pub mod jellyfin;
pub mod jobs;
pub mod media;
pub mod notifications;
pub mod requests;
pub mod sessions;
pub mod settings;
pub mod users;
