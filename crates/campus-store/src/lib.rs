//! Embedded relational storage for the campus portal: path provisioning,
//! dual-driver SQL execution, injection-safe parameter binding, and the
//! account and project repositories.

pub mod accounts;
pub mod bind;
pub mod config;
pub mod credentials;
pub mod database;
pub mod driver;
pub mod error;
pub mod paths;
pub mod projects;
pub mod schema;

pub use accounts::{AccountAuth, AccountRepo};
pub use bind::{Params, SqlValue};
pub use config::StoreConfig;
pub use credentials::{create_password_record, verify_password, PasswordRecord};
pub use database::{Database, DriverState};
pub use driver::Row;
pub use error::StoreError;
pub use projects::ProjectRepo;
