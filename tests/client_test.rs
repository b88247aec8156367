//! Integration tests for the Nginx Proxy Manager client
//!
//! Runs the client against a wiremock stand-in for the API, covering:
//! - the create-then-correct certificate reconciliation sequence
//! - single-call paths (no certificate / existing certificate)
//! - certificate reuse lookup
//! - rename with and without certificate renewal
//! - partial reconciliation failures
//! - authentication and error mapping

use npman::{CertificateId, Error, ProxyHostRequest, ProxyManagerClient};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "test-token" })))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> ProxyManagerClient {
    ProxyManagerClient::connect(&server.uri(), "admin@example.com", "changeme")
        .await
        .unwrap()
}

async fn count_requests(server: &MockServer, method_name: &str, path_value: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.to_string() == method_name && r.url.path() == path_value)
        .count()
}

/// A proxy host record as the server would return it
fn host_body(
    id: u64,
    certificate_id: serde_json::Value,
    ssl_forced: bool,
    http2_support: bool,
    hsts_enabled: bool,
    hsts_subdomains: bool,
) -> serde_json::Value {
    json!({
        "id": id,
        "domain_names": ["a.example.com"],
        "forward_host": "10.0.0.5",
        "forward_port": 8080,
        "forward_scheme": "http",
        "certificate_id": certificate_id,
        "ssl_forced": ssl_forced,
        "http2_support": http2_support,
        "hsts_enabled": hsts_enabled,
        "hsts_subdomains": hsts_subdomains,
        "block_exploits": true,
        "allow_websocket_upgrade": true,
        "caching_enabled": false,
        "access_list_id": 0,
        "advanced_config": "",
        "locations": [],
        "enabled": true,
        "meta": {}
    })
}

#[tokio::test]
async fn test_create_with_new_certificate_reconciles_flags() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    // Reuse lookup finds nothing
    Mock::given(method("GET"))
        .and(path("/api/nginx/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Creation call: certificate requested, backend clears the SSL flags
    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "domain_names": ["a.example.com"],
            "certificate_id": "new",
            "ssl_forced": true,
            "meta": {
                "letsencrypt_agree": true,
                "letsencrypt_email": "admin@example.com",
                "dns_challenge": false
            }
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(10, json!(77), false, false, false, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Corrective call carries exactly the originally requested flags
    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/10"))
        .and(body_json(json!({
            "ssl_forced": true,
            "hsts_enabled": true,
            "hsts_subdomains": true,
            "http2_support": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(10, json!(77), true, true, true, true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.hsts_subdomains = true;

    let record = client.create_proxy_host(&request).await.unwrap();

    assert_eq!(record.id, 10);
    assert_eq!(record.certificate_id, CertificateId::Existing(77));
    assert!(record.ssl_forced);
    assert!(record.http2_support);
    assert!(record.hsts_enabled);
    assert!(record.hsts_subdomains);

    // Exactly two physical calls for the one logical creation
    assert_eq!(count_requests(&server, "POST", "/api/nginx/proxy-hosts").await, 1);
    assert_eq!(count_requests(&server, "PUT", "/api/nginx/proxy-hosts/10").await, 1);
}

#[tokio::test]
async fn test_create_without_certificate_is_single_call() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .and(body_partial_json(json!({ "certificate_id": 0, "meta": {} })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(11, json!(0), false, false, false, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.certificate_id = CertificateId::NoCertificate;
    request.ssl_forced = false;
    request.hsts_enabled = false;
    request.http2_support = false;

    let record = client.create_proxy_host(&request).await.unwrap();

    assert_eq!(record.certificate_id, CertificateId::NoCertificate);
    assert!(!record.ssl_forced);

    // No reuse lookup and no corrective call
    assert_eq!(count_requests(&server, "GET", "/api/nginx/certificates").await, 0);
    assert_eq!(count_requests(&server, "PUT", "/api/nginx/proxy-hosts/11").await, 0);
}

#[tokio::test]
async fn test_create_with_existing_certificate_is_single_call() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .and(body_partial_json(json!({ "certificate_id": 42, "meta": {} })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(12, json!(42), true, true, true, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.certificate_id = CertificateId::Existing(42);

    let record = client.create_proxy_host(&request).await.unwrap();

    assert_eq!(record.certificate_id, CertificateId::Existing(42));
    assert!(record.ssl_forced);
    assert_eq!(count_requests(&server, "PUT", "/api/nginx/proxy-hosts/12").await, 0);
}

#[tokio::test]
async fn test_create_reuses_matching_certificate() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/nginx/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": 30,
                "provider": "other",
                "domain_names": ["a.example.com", "b.example.com"]
            },
            {
                "id": 31,
                "provider": "letsencrypt",
                "domain_names": ["B.Example.com", "a.example.com"]
            },
            {
                "id": 32,
                "provider": "letsencrypt",
                "domain_names": ["a.example.com"]
            }
        ])))
        .mount(&server)
        .await;

    // The sentinel is replaced by the reused certificate's id, so the
    // server keeps the flags and no corrective call is needed
    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .and(body_partial_json(json!({ "certificate_id": 31, "meta": {} })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(13, json!(31), true, true, true, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.additional_domain_names = vec!["b.example.com".to_string()];

    let record = client.create_proxy_host(&request).await.unwrap();

    assert_eq!(record.certificate_id, CertificateId::Existing(31));
    assert_eq!(count_requests(&server, "PUT", "/api/nginx/proxy-hosts/13").await, 0);
}

#[tokio::test]
async fn test_corrective_payload_excludes_dependent_hsts_subdomains() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(14, json!(80), false, false, false, false)),
        )
        .mount(&server)
        .await;

    // Exact body match: hsts_subdomains must not appear when hsts_enabled
    // was requested false
    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/14"))
        .and(body_json(json!({ "ssl_forced": true, "http2_support": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(14, json!(80), true, true, false, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.hsts_enabled = false;
    request.hsts_subdomains = true;
    request.reuse_certificate = false;

    let record = client.create_proxy_host(&request).await.unwrap();
    assert!(record.ssl_forced);
    assert!(!record.hsts_subdomains);
}

#[tokio::test]
async fn test_create_failure_propagates_without_corrective_call() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Domain is already in use" }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.reuse_certificate = false;

    let err = client.create_proxy_host(&request).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Domain is already in use");
        }
        other => panic!("expected Api error, got {:?}", other),
    }

    let puts = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.to_string() == "PUT")
        .count();
    assert_eq!(puts, 0);
}

#[tokio::test]
async fn test_corrective_failure_surfaces_partial_reconciliation() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/nginx/proxy-hosts"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(host_body(15, json!(90), false, false, false, false)),
        )
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/15"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "Internal error" }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let mut request = ProxyHostRequest::new("a.example.com", "10.0.0.5", 8080);
    request.reuse_certificate = false;

    let err = client.create_proxy_host(&request).await.unwrap_err();

    // The host exists; the caller must be able to retry the flag update
    assert_eq!(err.partial_host_id(), Some(15));
    match err {
        Error::PartialReconciliation { host_id, source } => {
            assert_eq!(host_id, 15);
            assert!(matches!(*source, Error::Api { status: 500, .. }));
        }
        other => panic!("expected PartialReconciliation, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rename_renews_certificate_and_reapplies_flags() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    // Current record: certificate attached, SSL flags on
    let mut current = host_body(20, json!(55), true, true, true, false);
    current["domain_names"] = json!(["old.example.com"]);
    current["meta"] = json!({ "letsencrypt_email": "ops@example.com" });

    Mock::given(method("GET"))
        .and(path("/api/nginx/proxy-hosts/20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/nginx/certificates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Rename call requests a new certificate and preserves the email
    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/20"))
        .and(body_partial_json(json!({
            "domain_names": ["new.example.com"],
            "certificate_id": "new",
            "meta": { "letsencrypt_email": "ops@example.com" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(20, json!(56), false, false, false, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Corrective call re-applies the flags the host had before the rename
    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/20"))
        .and(body_json(json!({
            "ssl_forced": true,
            "hsts_enabled": true,
            "http2_support": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(20, json!(56), true, true, true, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let record = client
        .rename_proxy_host(20, "new.example.com", &[], true, true)
        .await
        .unwrap();

    assert_eq!(record.certificate_id, CertificateId::Existing(56));
    assert!(record.ssl_forced);
    assert!(record.hsts_enabled);
    assert!(record.http2_support);
}

#[tokio::test]
async fn test_rename_without_renewal_is_plain_update() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/nginx/proxy-hosts/21"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(21, json!(55), true, true, true, false)),
        )
        .mount(&server)
        .await;

    // Only the domain names are sent; no certificate, no flags
    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/21"))
        .and(body_json(json!({ "domain_names": ["new.example.com"] })))
        .respond_with({
            let mut renamed = host_body(21, json!(55), true, true, true, false);
            renamed["domain_names"] = json!(["new.example.com"]);
            ResponseTemplate::new(200).set_body_json(renamed)
        })
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let record = client
        .rename_proxy_host(21, "new.example.com", &[], false, true)
        .await
        .unwrap();

    assert_eq!(record.domain_names, vec!["new.example.com"]);
    assert_eq!(record.certificate_id, CertificateId::Existing(55));
    assert_eq!(count_requests(&server, "PUT", "/api/nginx/proxy-hosts/21").await, 1);
    assert_eq!(count_requests(&server, "GET", "/api/nginx/certificates").await, 0);
}

#[tokio::test]
async fn test_enable_and_disable() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/30"))
        .and(body_json(json!({ "enabled": true })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(30, json!(0), false, false, false, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut disabled = host_body(31, json!(0), false, false, false, false);
    disabled["enabled"] = json!(false);

    Mock::given(method("PUT"))
        .and(path("/api/nginx/proxy-hosts/31"))
        .and(body_json(json!({ "enabled": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(disabled))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let enabled = client.enable_proxy_host(30).await.unwrap();
    assert!(enabled.enabled);

    let disabled = client.disable_proxy_host(31).await.unwrap();
    assert!(!disabled.enabled);
}

#[tokio::test]
async fn test_delete_host_and_certificate() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/nginx/proxy-hosts/40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/nginx/certificates/9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    client.delete_proxy_host(40).await.unwrap();
    client.delete_certificate(9).await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_host_maps_error() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/nginx/proxy-hosts/41"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "Proxy Host not found" }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let err = client.delete_proxy_host(41).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_get_with_expand_parameter() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/nginx/proxy-hosts/50"))
        .and(query_param("expand", "certificate,owner"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(host_body(50, json!(7), true, true, true, false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let record = client
        .get_proxy_host(50, &["certificate", "owner"])
        .await
        .unwrap();
    assert_eq!(record.id, 50);
}

#[tokio::test]
async fn test_list_proxy_hosts() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/nginx/proxy-hosts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            host_body(1, json!(7), true, true, true, false),
            host_body(2, json!(0), false, false, false, false)
        ])))
        .mount(&server)
        .await;

    let client = connect(&server).await;

    let records = client.get_all_proxy_hosts(&[]).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].has_certificate());
    assert!(!records[1].has_certificate());
}

#[tokio::test]
async fn test_connect_with_bad_credentials_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/tokens"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Invalid email or password" }
        })))
        .mount(&server)
        .await;

    let err = ProxyManagerClient::connect(&server.uri(), "admin@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
}

#[tokio::test]
async fn test_invalid_request_never_hits_the_wire() {
    let server = MockServer::start().await;
    mock_auth(&server).await;

    let client = connect(&server).await;

    let request = ProxyHostRequest::new("", "10.0.0.5", 8080);
    let err = client.create_proxy_host(&request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    // Only the token exchange reached the server
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
