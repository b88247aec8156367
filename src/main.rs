//! npman - CLI for the Nginx Proxy Manager API
//!
//! Usage:
//!   npman create <domain> <forward-host> <forward-port> [options]
//!   npman list [--json]
//!   npman get <id>
//!   npman rename <id> <new-domain> [options]
//!   npman enable <id> / disable <id> / delete <id>
//!   npman certs list / certs delete <id>

use anyhow::Result;
use clap::{Parser, Subcommand};
use npman::{CertificateId, ForwardScheme, ProxyHostRecord, ProxyHostRequest, ProxyManagerClient};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// CLI for managing Nginx Proxy Manager proxy hosts and certificates
#[derive(Parser, Debug)]
#[command(name = "npman")]
#[command(author = "npman Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Manage Nginx Proxy Manager proxy hosts and certificates")]
struct Args {
    /// Base URL of the Nginx Proxy Manager instance (e.g., http://localhost:81)
    #[arg(long, env = "NPM_URL")]
    url: String,

    /// Username/email for authentication
    #[arg(long, env = "NPM_IDENTITY")]
    identity: String,

    /// Password for authentication
    #[arg(long, env = "NPM_SECRET")]
    secret: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a proxy host
    Create {
        /// Primary domain name (e.g., app.example.com)
        domain: String,

        /// Hostname/IP to forward requests to
        forward_host: String,

        /// Port to forward requests to
        forward_port: u16,

        /// Scheme towards the backend (http or https)
        #[arg(long, default_value = "http")]
        scheme: String,

        /// Additional domain name (repeatable)
        #[arg(short = 'a', long = "additional-domain")]
        additional_domains: Vec<String>,

        /// Skip SSL entirely (no certificate, no forced HTTPS)
        #[arg(long)]
        no_ssl: bool,

        /// Use an existing certificate by id instead of requesting a new one
        #[arg(long, conflicts_with = "no_ssl")]
        certificate_id: Option<u64>,

        /// Request a new certificate even when an existing one covers the domains
        #[arg(long)]
        no_reuse: bool,

        /// Email for Let's Encrypt notifications (defaults to the identity)
        #[arg(long)]
        letsencrypt_email: Option<String>,

        /// Include subdomains in HSTS
        #[arg(long)]
        hsts_subdomains: bool,

        /// Disable WebSocket upgrades
        #[arg(long)]
        no_websockets: bool,

        /// Enable caching
        #[arg(long)]
        caching: bool,
    },

    /// List all proxy hosts
    List {
        /// Related objects to inline (e.g., certificate,owner)
        #[arg(long)]
        expand: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one proxy host
    Get {
        /// Proxy host id
        id: u64,

        /// Related objects to inline
        #[arg(long)]
        expand: Option<String>,
    },

    /// Change the domain names of a proxy host
    Rename {
        /// Proxy host id
        id: u64,

        /// New primary domain name
        new_domain: String,

        /// Additional domain name (repeatable)
        #[arg(short = 'a', long = "additional-domain")]
        additional_domains: Vec<String>,

        /// Keep the current certificate instead of requesting one for the
        /// new names (the certificate will no longer match the domains)
        #[arg(long)]
        keep_certificate: bool,

        /// Request a new certificate even when an existing one covers the domains
        #[arg(long)]
        no_reuse: bool,
    },

    /// Enable a proxy host
    Enable {
        /// Proxy host id
        id: u64,
    },

    /// Disable a proxy host
    Disable {
        /// Proxy host id
        id: u64,
    },

    /// Delete a proxy host
    Delete {
        /// Proxy host id
        id: u64,
    },

    /// Certificate operations
    Certs {
        #[command(subcommand)]
        subcommand: CertCommands,
    },
}

#[derive(Subcommand, Debug)]
enum CertCommands {
    /// List all certificates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a certificate
    Delete {
        /// Certificate id
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let client = ProxyManagerClient::connect(&args.url, &args.identity, &args.secret).await?;

    match args.command {
        Commands::Create {
            domain,
            forward_host,
            forward_port,
            scheme,
            additional_domains,
            no_ssl,
            certificate_id,
            no_reuse,
            letsencrypt_email,
            hsts_subdomains,
            no_websockets,
            caching,
        } => {
            let mut request = ProxyHostRequest::new(&domain, &forward_host, forward_port);
            request.forward_scheme = scheme.parse::<ForwardScheme>()?;
            request.additional_domain_names = additional_domains;
            request.hsts_subdomains = hsts_subdomains;
            request.allow_websocket_upgrade = !no_websockets;
            request.caching_enabled = caching;
            request.letsencrypt_email = letsencrypt_email;
            request.reuse_certificate = !no_reuse;

            if no_ssl {
                request.certificate_id = CertificateId::NoCertificate;
                request.ssl_forced = false;
                request.hsts_enabled = false;
            } else if let Some(id) = certificate_id {
                request.certificate_id = CertificateId::Existing(id);
            }

            let record = client.create_proxy_host(&request).await?;
            println!("Created proxy host:");
            print_record(&record);
        }

        Commands::List { expand, json } => {
            let expand = split_expand(&expand);
            let records = client.get_all_proxy_hosts(&expand).await?;

            if records.is_empty() {
                println!("No proxy hosts found");
                return Ok(());
            }

            if json {
                let output: Vec<serde_json::Value> = records.iter().map(record_json).collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!(
                    "{:<6} {:<40} {:<30} {:<8} {:<8} {:<8}",
                    "ID", "DOMAINS", "FORWARD", "SSL", "CERT", "ENABLED"
                );
                println!("{}", "-".repeat(104));

                for record in &records {
                    let forward = format!(
                        "{}://{}:{}",
                        record.forward_scheme, record.forward_host, record.forward_port
                    );
                    let cert = match record.certificate_id.as_existing() {
                        Some(id) => id.to_string(),
                        None => "-".to_string(),
                    };
                    println!(
                        "{:<6} {:<40} {:<30} {:<8} {:<8} {:<8}",
                        record.id,
                        record.domain_names.join(","),
                        forward,
                        if record.ssl_forced { "forced" } else { "-" },
                        cert,
                        record.enabled
                    );
                }

                println!("\nTotal: {} proxy host(s)", records.len());
            }
        }

        Commands::Get { id, expand } => {
            let expand = split_expand(&expand);
            let record = client.get_proxy_host(id, &expand).await?;
            print_record(&record);
        }

        Commands::Rename {
            id,
            new_domain,
            additional_domains,
            keep_certificate,
            no_reuse,
        } => {
            let record = client
                .rename_proxy_host(id, &new_domain, &additional_domains, !keep_certificate, !no_reuse)
                .await?;
            println!("Renamed proxy host {}:", id);
            print_record(&record);
        }

        Commands::Enable { id } => {
            client.enable_proxy_host(id).await?;
            println!("Enabled proxy host {}", id);
        }

        Commands::Disable { id } => {
            client.disable_proxy_host(id).await?;
            println!("Disabled proxy host {}", id);
        }

        Commands::Delete { id } => {
            client.delete_proxy_host(id).await?;
            println!("Deleted proxy host {}", id);
        }

        Commands::Certs { subcommand } => match subcommand {
            CertCommands::List { json } => {
                let certificates = client.get_all_certificates(&[]).await?;

                if certificates.is_empty() {
                    println!("No certificates found");
                    return Ok(());
                }

                if json {
                    let output: Vec<serde_json::Value> = certificates
                        .iter()
                        .map(|c| {
                            serde_json::json!({
                                "id": c.id,
                                "provider": c.provider,
                                "nice_name": c.nice_name,
                                "domain_names": c.domain_names,
                                "expires_on": c.expires_on,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!(
                        "{:<6} {:<15} {:<50} {:<25}",
                        "ID", "PROVIDER", "DOMAINS", "EXPIRES"
                    );
                    println!("{}", "-".repeat(98));

                    for cert in &certificates {
                        println!(
                            "{:<6} {:<15} {:<50} {:<25}",
                            cert.id,
                            cert.provider,
                            cert.domain_names.join(","),
                            cert.expires_on
                        );
                    }

                    println!("\nTotal: {} certificate(s)", certificates.len());
                }
            }

            CertCommands::Delete { id } => {
                client.delete_certificate(id).await?;
                println!("Deleted certificate {}", id);
            }
        },
    }

    Ok(())
}

fn split_expand(expand: &Option<String>) -> Vec<&str> {
    expand
        .as_deref()
        .map(|e| e.split(',').map(str::trim).collect())
        .unwrap_or_default()
}

fn record_json(record: &ProxyHostRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id,
        "domain_names": record.domain_names,
        "forward_scheme": record.forward_scheme,
        "forward_host": record.forward_host,
        "forward_port": record.forward_port,
        "ssl_forced": record.ssl_forced,
        "hsts_enabled": record.hsts_enabled,
        "hsts_subdomains": record.hsts_subdomains,
        "http2_support": record.http2_support,
        "certificate_id": record.certificate_id,
        "enabled": record.enabled,
    })
}

fn print_record(record: &ProxyHostRecord) {
    println!("  ID:          {}", record.id);
    println!("  Domains:     {}", record.domain_names.join(", "));
    println!(
        "  Forward:     {}://{}:{}",
        record.forward_scheme, record.forward_host, record.forward_port
    );
    let cert = match record.certificate_id.as_existing() {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    };
    println!("  Certificate: {}", cert);
    println!("  SSL forced:  {}", record.ssl_forced);
    println!("  HTTP/2:      {}", record.http2_support);
    println!(
        "  HSTS:        {}{}",
        record.hsts_enabled,
        if record.hsts_subdomains { " (incl. subdomains)" } else { "" }
    );
    println!("  Enabled:     {}", record.enabled);
    if !record.created_on.is_empty() {
        println!("  Created:     {}", record.created_on);
    }
}
