//! npman - An async client for the Nginx Proxy Manager API
//!
//! Provides:
//! - Bearer-token authentication with transparent refresh
//! - Proxy-host CRUD: create, read, update, rename, enable/disable, delete
//! - Certificate listing, reuse lookup and deletion
//! - Automatic re-application of the SSL flags the backend clears when a
//!   host is created with a freshly requested certificate

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use client::ProxyManagerClient;
pub use error::{Error, Result};
pub use models::{
    Certificate, CertificateId, ForwardScheme, Location, ProxyHostRecord, ProxyHostRequest,
    ProxyHostUpdate,
};
