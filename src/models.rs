//! Wire types for the Nginx Proxy Manager API
//! Request/record shapes for proxy hosts and certificates

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Scheme used when forwarding requests to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardScheme {
    #[default]
    Http,
    Https,
}

impl fmt::Display for ForwardScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardScheme::Http => write!(f, "http"),
            ForwardScheme::Https => write!(f, "https"),
        }
    }
}

impl FromStr for ForwardScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ForwardScheme::Http),
            "https" => Ok(ForwardScheme::Https),
            other => Err(Error::InvalidRequest(format!(
                "forward scheme must be http or https, got {:?}",
                other
            ))),
        }
    }
}

/// Certificate selection for a proxy host.
///
/// The API overloads a single field for this: `0` means no certificate,
/// a positive integer references an existing certificate and the string
/// `"new"` asks the server to issue one. The tagged variants keep the
/// reconciliation branch in `create_proxy_host` exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateId {
    /// No certificate attached (wire value `0`).
    #[default]
    NoCertificate,
    /// Ask the server to issue a new certificate (wire value `"new"`).
    RequestNew,
    /// Reference an existing certificate by id.
    Existing(u64),
}

impl CertificateId {
    /// True when a certificate is attached or being issued.
    /// Mirrors the server's truthiness check on `certificate_id`.
    pub fn is_present(&self) -> bool {
        !matches!(self, CertificateId::NoCertificate)
    }

    pub fn is_request_new(&self) -> bool {
        matches!(self, CertificateId::RequestNew)
    }

    pub fn as_existing(&self) -> Option<u64> {
        match self {
            CertificateId::Existing(id) => Some(*id),
            _ => None,
        }
    }
}

impl Serialize for CertificateId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CertificateId::NoCertificate => serializer.serialize_u64(0),
            CertificateId::RequestNew => serializer.serialize_str("new"),
            CertificateId::Existing(id) => serializer.serialize_u64(*id),
        }
    }
}

impl<'de> Deserialize<'de> for CertificateId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(u64),
            Text(String),
        }

        match Option::<Wire>::deserialize(deserializer)? {
            None | Some(Wire::Number(0)) => Ok(CertificateId::NoCertificate),
            Some(Wire::Number(id)) => Ok(CertificateId::Existing(id)),
            Some(Wire::Text(s)) if s == "new" => Ok(CertificateId::RequestNew),
            Some(Wire::Text(s)) => Err(D::Error::custom(format!(
                "unexpected certificate_id value {:?}",
                s
            ))),
        }
    }
}

/// The API serializes some booleans as 0/1 depending on the endpoint.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Bool(bool),
        Int(i64),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Bool(b) => Ok(b),
        Wire::Int(i) => Ok(i != 0),
    }
}

/// A custom location block, passed through to the server verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub forward_scheme: ForwardScheme,
    pub forward_host: String,
    pub forward_port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub advanced_config: String,
}

/// Settings for creating a proxy host.
///
/// `new` fills in the defaults; adjust individual fields afterwards:
///
/// ```no_run
/// use npman::{CertificateId, ProxyHostRequest};
///
/// let mut request = ProxyHostRequest::new("app.example.com", "192.168.1.100", 8080);
/// request.hsts_subdomains = true;
/// request.certificate_id = CertificateId::NoCertificate; // plain HTTP host
/// ```
#[derive(Debug, Clone)]
pub struct ProxyHostRequest {
    /// Primary domain name. Must be non-empty.
    pub domain_name: String,
    /// Extra domain names covered by the same host (default: none).
    pub additional_domain_names: Vec<String>,
    /// Hostname or IP to forward requests to.
    pub forward_host: String,
    /// Backend port, 1-65535.
    pub forward_port: u16,
    /// Scheme used towards the backend (default: http).
    pub forward_scheme: ForwardScheme,
    /// Block common exploits (default: true).
    pub block_exploits: bool,
    /// Enable HTTP/2 (default: true).
    pub http2_support: bool,
    /// Redirect HTTP to HTTPS (default: true).
    pub ssl_forced: bool,
    /// Enable HSTS (default: true).
    pub hsts_enabled: bool,
    /// Include subdomains in HSTS (default: false). Only sent when
    /// `hsts_enabled` is also requested.
    pub hsts_subdomains: bool,
    /// Allow WebSocket upgrades (default: true).
    pub allow_websocket_upgrade: bool,
    /// Enable caching (default: false).
    pub caching_enabled: bool,
    /// Access list id, 0 for none (default: 0).
    pub access_list_id: u64,
    /// Extra nginx configuration, passed through verbatim (default: empty).
    pub advanced_config: String,
    /// Custom location blocks (default: none).
    pub locations: Vec<Location>,
    /// Certificate selection (default: request a new one).
    pub certificate_id: CertificateId,
    /// Email for Let's Encrypt notifications. Defaults to the account
    /// identity the client authenticated with.
    pub letsencrypt_email: Option<String>,
    /// Before requesting a new certificate, look for an existing one
    /// covering the same domain set and reuse it. Avoids burning
    /// Let's Encrypt rate limits (default: true).
    pub reuse_certificate: bool,
}

impl ProxyHostRequest {
    pub fn new(domain_name: &str, forward_host: &str, forward_port: u16) -> Self {
        Self {
            domain_name: domain_name.to_string(),
            additional_domain_names: Vec::new(),
            forward_host: forward_host.to_string(),
            forward_port,
            forward_scheme: ForwardScheme::Http,
            block_exploits: true,
            http2_support: true,
            ssl_forced: true,
            hsts_enabled: true,
            hsts_subdomains: false,
            allow_websocket_upgrade: true,
            caching_enabled: false,
            access_list_id: 0,
            advanced_config: String::new(),
            locations: Vec::new(),
            certificate_id: CertificateId::RequestNew,
            letsencrypt_email: None,
            reuse_certificate: true,
        }
    }

    /// Full domain set: primary name followed by the additional names.
    pub fn domain_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(1 + self.additional_domain_names.len());
        names.push(self.domain_name.clone());
        names.extend(self.additional_domain_names.iter().cloned());
        names
    }

    /// Validate the request before any call is issued.
    pub fn validate(&self) -> Result<()> {
        if self.domain_name.trim().is_empty() {
            return Err(Error::InvalidRequest("domain_name must not be empty".into()));
        }
        for name in self.domain_names() {
            if name.contains(char::is_whitespace) {
                return Err(Error::InvalidRequest(format!(
                    "domain name {:?} contains whitespace",
                    name
                )));
            }
        }
        if self.forward_port == 0 {
            return Err(Error::InvalidRequest("forward_port must be in 1-65535".into()));
        }
        if self.forward_host.trim().is_empty() {
            return Err(Error::InvalidRequest("forward_host must not be empty".into()));
        }
        Ok(())
    }
}

/// A proxy host as stored by the server
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyHostRecord {
    pub id: u64,
    #[serde(default)]
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub forward_host: String,
    #[serde(default)]
    pub forward_port: u16,
    #[serde(default)]
    pub forward_scheme: ForwardScheme,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub ssl_forced: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hsts_enabled: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hsts_subdomains: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub http2_support: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub block_exploits: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub caching_enabled: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub allow_websocket_upgrade: bool,
    #[serde(default)]
    pub access_list_id: u64,
    #[serde(default)]
    pub advanced_config: String,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub certificate_id: CertificateId,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub enabled: bool,
    /// Server-owned timestamp, passed through as-is.
    #[serde(default)]
    pub created_on: String,
    /// Server-owned timestamp, passed through as-is.
    #[serde(default)]
    pub modified_on: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl ProxyHostRecord {
    /// True when the record carries a certificate reference.
    pub fn has_certificate(&self) -> bool {
        self.certificate_id.is_present()
    }
}

/// A TLS certificate as stored by the server
#[derive(Debug, Clone, Deserialize)]
pub struct Certificate {
    pub id: u64,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub nice_name: String,
    #[serde(default)]
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub expires_on: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Partial update for a proxy host. Fields left as `None` are omitted
/// from the payload and stay untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProxyHostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_scheme: Option<ForwardScheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_forced: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsts_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hsts_subdomains: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http2_support: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_exploits: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_websocket_upgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advanced_config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<CertificateId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}
