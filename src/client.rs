//! Client for the Nginx Proxy Manager API
//!
//! Handles authenticated request plumbing, proxy-host and certificate CRUD,
//! and the certificate reconciliation sequence: creating (or renaming) a
//! host with a freshly requested certificate makes the backend zero the
//! SSL-dependent flags, so a follow-up update re-applies the flags that
//! were originally requested.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::AuthSession;
use crate::error::{Error, Result};
use crate::models::{
    Certificate, CertificateId, ProxyHostRecord, ProxyHostRequest, ProxyHostUpdate,
};

/// Authenticated client for one Nginx Proxy Manager instance.
///
/// All operations are sequential request/response calls. The only shared
/// state between them is the bearer token, kept behind a mutex and
/// refreshed transparently when it goes stale.
#[derive(Debug)]
pub struct ProxyManagerClient {
    http: Client,
    base_url: String,
    identity: String,
    auth: Mutex<AuthSession>,
}

impl ProxyManagerClient {
    /// Connect to an instance and authenticate.
    ///
    /// `base_url` is the root of the admin interface, e.g.
    /// `http://localhost:81`. Authentication failure here is fatal; no
    /// client is handed out without a valid token.
    pub async fn connect(base_url: &str, identity: &str, secret: &str) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::new();

        let mut session = AuthSession::new(identity, secret);
        session.authenticate(&http, &base_url).await?;
        info!("authenticated against {}", base_url);

        Ok(Self {
            http,
            base_url,
            identity: identity.to_string(),
            auth: Mutex::new(session),
        })
    }

    /// Create a proxy host.
    ///
    /// When the request asks for a new certificate the backend clears
    /// ssl_forced, http2_support, hsts_enabled and hsts_subdomains during
    /// creation, because no certificate is attached yet at that point.
    /// Once the returned record carries a certificate id, a second call
    /// re-applies exactly the flags that were requested true, and its
    /// response becomes the final record.
    ///
    /// If that second call fails, the host still exists; the error is
    /// [`Error::PartialReconciliation`] carrying the new host's id so the
    /// flags can be retried via [`Self::update_proxy_host`].
    pub async fn create_proxy_host(&self, request: &ProxyHostRequest) -> Result<ProxyHostRecord> {
        request.validate()?;

        let domain_names = request.domain_names();
        let certificate_id = self
            .resolve_certificate_id(request.certificate_id, request.reuse_certificate, &domain_names)
            .await;

        let payload = json!({
            "domain_names": domain_names,
            "forward_scheme": request.forward_scheme,
            "forward_host": request.forward_host,
            "forward_port": request.forward_port,
            "ssl_forced": request.ssl_forced,
            "hsts_enabled": request.hsts_enabled,
            "hsts_subdomains": request.hsts_subdomains,
            "http2_support": request.http2_support,
            "block_exploits": request.block_exploits,
            "caching_enabled": request.caching_enabled,
            "allow_websocket_upgrade": request.allow_websocket_upgrade,
            "access_list_id": request.access_list_id,
            "advanced_config": request.advanced_config,
            "locations": request.locations,
            "certificate_id": certificate_id,
            "enabled": true,
            "meta": self.certificate_meta(certificate_id, request.letsencrypt_email.as_deref()),
        });

        let record: ProxyHostRecord = self
            .request(Method::POST, "/nginx/proxy-hosts", Some(&payload), &[])
            .await?;

        if certificate_id.is_request_new() && record.has_certificate() {
            if let Some(update) = corrective_flags(
                request.ssl_forced,
                request.http2_support,
                request.hsts_enabled,
                request.hsts_subdomains,
            ) {
                info!(
                    "re-applying SSL flags cleared during creation of proxy host {}",
                    record.id
                );
                return self.apply_corrective_update(record.id, &update).await;
            }
        }

        Ok(record)
    }

    /// Change the domain names of a proxy host.
    ///
    /// Certificates are bound to a domain set, so by default
    /// (`renew_certificate = true`) a host that carries a certificate gets
    /// a new one requested for the new names, followed by the same
    /// corrective flag sequence as [`Self::create_proxy_host`], re-applying
    /// the flags the host had before the rename. With
    /// `renew_certificate = false` only the domain names change and the
    /// caller owns the resulting certificate/domain mismatch.
    pub async fn rename_proxy_host(
        &self,
        host_id: u64,
        new_domain_name: &str,
        additional_domain_names: &[String],
        renew_certificate: bool,
        reuse_certificate: bool,
    ) -> Result<ProxyHostRecord> {
        if new_domain_name.trim().is_empty() {
            return Err(Error::InvalidRequest("new domain name must not be empty".into()));
        }

        let current = self.get_proxy_host(host_id, &[]).await?;

        let mut domain_names = vec![new_domain_name.to_string()];
        domain_names.extend(additional_domain_names.iter().cloned());

        let renewing = renew_certificate && current.certificate_id.as_existing().is_some();

        let mut payload = json!({ "domain_names": domain_names });
        let mut certificate_id = CertificateId::NoCertificate;

        if renewing {
            certificate_id = self
                .resolve_certificate_id(CertificateId::RequestNew, reuse_certificate, &domain_names)
                .await;

            // Keep the email the certificate was originally requested with
            let email = current
                .meta
                .pointer("/letsencrypt_email")
                .and_then(Value::as_str)
                .map(str::to_owned);

            payload["certificate_id"] = json!(certificate_id);
            payload["meta"] = self.certificate_meta(certificate_id, email.as_deref());
        }

        let record: ProxyHostRecord = self
            .request(
                Method::PUT,
                &format!("/nginx/proxy-hosts/{}", host_id),
                Some(&payload),
                &[],
            )
            .await?;

        if renewing && certificate_id.is_request_new() && record.has_certificate() {
            if let Some(update) = corrective_flags(
                current.ssl_forced,
                current.http2_support,
                current.hsts_enabled,
                current.hsts_subdomains,
            ) {
                info!(
                    "re-applying SSL flags cleared during rename of proxy host {}",
                    host_id
                );
                return self.apply_corrective_update(host_id, &update).await;
            }
        }

        Ok(record)
    }

    /// Partial update. Only the fields set in `update` are sent; the rest
    /// stay untouched server-side. No reconciliation happens here.
    pub async fn update_proxy_host(
        &self,
        host_id: u64,
        update: &ProxyHostUpdate,
    ) -> Result<ProxyHostRecord> {
        let body = serde_json::to_value(update)?;
        self.request(
            Method::PUT,
            &format!("/nginx/proxy-hosts/{}", host_id),
            Some(&body),
            &[],
        )
        .await
    }

    pub async fn enable_proxy_host(&self, host_id: u64) -> Result<ProxyHostRecord> {
        let update = ProxyHostUpdate {
            enabled: Some(true),
            ..Default::default()
        };
        self.update_proxy_host(host_id, &update).await
    }

    pub async fn disable_proxy_host(&self, host_id: u64) -> Result<ProxyHostRecord> {
        let update = ProxyHostUpdate {
            enabled: Some(false),
            ..Default::default()
        };
        self.update_proxy_host(host_id, &update).await
    }

    /// Delete a proxy host. Existence semantics are the server's; no
    /// pre-check is done here.
    pub async fn delete_proxy_host(&self, host_id: u64) -> Result<()> {
        self.request_ok(Method::DELETE, &format!("/nginx/proxy-hosts/{}", host_id))
            .await
    }

    /// Fetch one proxy host. `expand` names related objects to inline,
    /// e.g. `["certificate", "owner"]`.
    pub async fn get_proxy_host(&self, host_id: u64, expand: &[&str]) -> Result<ProxyHostRecord> {
        self.request(
            Method::GET,
            &format!("/nginx/proxy-hosts/{}", host_id),
            None,
            &expand_query(expand),
        )
        .await
    }

    /// Fetch all proxy hosts.
    pub async fn get_all_proxy_hosts(&self, expand: &[&str]) -> Result<Vec<ProxyHostRecord>> {
        self.request(Method::GET, "/nginx/proxy-hosts", None, &expand_query(expand))
            .await
    }

    /// Fetch all certificates.
    pub async fn get_all_certificates(&self, expand: &[&str]) -> Result<Vec<Certificate>> {
        self.request(Method::GET, "/nginx/certificates", None, &expand_query(expand))
            .await
    }

    /// Find a Let's Encrypt certificate covering exactly the given domain
    /// set (case- and order-insensitive). Used to reuse certificates
    /// instead of re-issuing and burning rate limits.
    pub async fn find_certificate_by_domains(
        &self,
        domain_names: &[String],
    ) -> Result<Option<Certificate>> {
        let wanted = normalized_domain_set(domain_names);
        let certificates = self.get_all_certificates(&[]).await?;

        Ok(certificates.into_iter().find(|cert| {
            cert.provider == "letsencrypt" && normalized_domain_set(&cert.domain_names) == wanted
        }))
    }

    pub async fn delete_certificate(&self, certificate_id: u64) -> Result<()> {
        self.request_ok(Method::DELETE, &format!("/nginx/certificates/{}", certificate_id))
            .await
    }

    /// Substitute an existing certificate for a "request new" sentinel when
    /// one already covers the domain set. Lookup failures degrade to
    /// requesting a new certificate rather than failing the operation.
    async fn resolve_certificate_id(
        &self,
        certificate_id: CertificateId,
        reuse_certificate: bool,
        domain_names: &[String],
    ) -> CertificateId {
        if !certificate_id.is_request_new() || !reuse_certificate {
            return certificate_id;
        }

        match self.find_certificate_by_domains(domain_names).await {
            Ok(Some(cert)) => {
                debug!(
                    "reusing certificate {} for domains {:?}",
                    cert.id, domain_names
                );
                CertificateId::Existing(cert.id)
            }
            Ok(None) => certificate_id,
            Err(e) => {
                warn!("certificate lookup failed, requesting a new one: {}", e);
                certificate_id
            }
        }
    }

    /// The `meta` block accompanying a certificate selection: Let's Encrypt
    /// issuance parameters for a new request, empty otherwise.
    fn certificate_meta(&self, certificate_id: CertificateId, email: Option<&str>) -> Value {
        if certificate_id.is_request_new() {
            json!({
                "letsencrypt_agree": true,
                "letsencrypt_email": email.unwrap_or(&self.identity),
                "dns_challenge": false,
            })
        } else {
            json!({})
        }
    }

    async fn apply_corrective_update(
        &self,
        host_id: u64,
        update: &ProxyHostUpdate,
    ) -> Result<ProxyHostRecord> {
        self.update_proxy_host(host_id, update)
            .await
            .map_err(|source| Error::PartialReconciliation {
                host_id,
                source: Box::new(source),
            })
    }

    /// Issue an authenticated request and deserialize the JSON response.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.send(method, endpoint, body, query).await?;
        Ok(response.json().await?)
    }

    /// Issue an authenticated request where only success matters. Some
    /// delete endpoints answer `true` or an empty 204; the body is dropped.
    async fn request_ok(&self, method: Method, endpoint: &str) -> Result<()> {
        self.send(method, endpoint, None, &[]).await?;
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let token = {
            let mut auth = self.auth.lock().await;
            auth.bearer_token(&self.http, &self.base_url).await?
        };

        let url = format!("{}/api{}", self.base_url, endpoint);
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, &url).bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("response status {}", status);

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        Ok(response)
    }
}

/// Build the corrective payload for flags the backend cleared: only the
/// flags that were requested true, with hsts_subdomains depending on
/// hsts_enabled. Returns `None` when no flag needs re-applying.
fn corrective_flags(
    ssl_forced: bool,
    http2_support: bool,
    hsts_enabled: bool,
    hsts_subdomains: bool,
) -> Option<ProxyHostUpdate> {
    let mut update = ProxyHostUpdate::default();
    let mut any = false;

    if ssl_forced {
        update.ssl_forced = Some(true);
        any = true;
    }
    if hsts_enabled {
        update.hsts_enabled = Some(true);
        any = true;
        if hsts_subdomains {
            update.hsts_subdomains = Some(true);
        }
    }
    if http2_support {
        update.http2_support = Some(true);
        any = true;
    }

    if any {
        Some(update)
    } else {
        None
    }
}

/// Normalize a domain set for exact-match comparison
fn normalized_domain_set(domain_names: &[String]) -> Vec<String> {
    let mut names: Vec<String> = domain_names
        .iter()
        .map(|d| d.trim().to_ascii_lowercase())
        .collect();
    names.sort();
    names
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw)
        .map_err(|e| Error::InvalidRequest(format!("invalid base URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::InvalidRequest(format!(
                "base URL must be http or https, got {:?}",
                other
            )))
        }
    }

    Ok(raw.trim_end_matches('/').to_string())
}

fn expand_query(expand: &[&str]) -> Vec<(&'static str, String)> {
    if expand.is_empty() {
        Vec::new()
    } else {
        vec![("expand", expand.join(","))]
    }
}

/// Pull a usable message out of an error response body. The API wraps
/// errors as `{"error": {"message": ...}}`, sometimes as a bare
/// `error`/`message` string; anything else falls back to the raw text.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(message) = value.pointer("/error/message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }

    let text = body.trim();
    if text.is_empty() {
        return "no error details provided".to_string();
    }
    text.chars().take(500).collect()
}
