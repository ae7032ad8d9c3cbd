//! # Seerr Core
//!
//! Data core of the Seerr media request service: the request lifecycle,
//! identity and session storage, the settings cache and the auxiliary stores
//! the web layer builds on.
//!
//! ## Overview
//!
//! - **Request lifecycle**: transactional creation of media requests with
//!   their items, active-request conflict detection, status tracking,
//!   paged listing, analytics and comments
//! - **Identity**: users, sessions, passkeys, MFA and linked accounts
//! - **Settings**: key/value settings behind a short TTL cache, typed
//!   accessors and request-limit resolution
//! - **Auxiliary stores**: notifications, approval rules, jobs, shares,
//!   issues, lists, dashboard sliders, calendar and Jellyfin availability
//!
//! Every store is an async trait in [`database::ports`] with a PostgreSQL
//! adapter in [`database::infrastructure::postgres`]. [`DatabaseContext`]
//! composes them once at startup.
//!
//! ## Feature Flags
//!
//! - `postgres-tests`: enables integration tests that need a live database
//!
//! ## Examples
//!
//! ```no_run
//! use seerr_core::{
//!     ContextOptions, DatabaseContext, DatabaseSettings,
//!     domain::requests::NewMediaRequest,
//! };
//!
//! async fn request_movie(url: &str, user_id: i64) -> seerr_core::Result<()> {
//!     let context =
//!         DatabaseContext::connect(&DatabaseSettings::new(url), ContextOptions::default())
//!             .await?;
//!     context.postgres().initialize_schema().await?;
//!
//!     let request = NewMediaRequest::movie(603, "The Matrix", user_id);
//!     context.unit_of_work().requests.create_request_with_items(request).await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod database;
pub mod domain;
pub mod error;
pub mod settings;

pub use database::context::ContextOptions;
pub use database::{DatabaseContext, DatabaseSettings, PoolSettings, PostgresDatabase};
pub use error::{ActiveRequestExistsError, Result, SeerrError};

/// Embedded, ordered schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
