//! TLS material and configuration.
//!
//! The server terminates TLS itself, so this module owns everything between
//! "a cert path on disk" and "an `Arc<rustls::ServerConfig>` the acceptor can
//! clone per connection". TLS 1.3 is the floor; there is no fallback to 1.2.
//! When no certificate exists yet a self-signed one for `localhost` is
//! written next to where the real one would live, which keeps first boot on a
//! fresh machine from failing.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Once};

use anyhow::Context;
use rcgen::{CertificateParams, DnType, KeyPair};
use rustls_pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use tracing::{info, warn};

static CRYPTO_INIT: Once = Once::new();

/// Install the process-wide rustls crypto provider.
///
/// Safe to call from multiple server instances; only the first call does
/// anything. Tests that build their own client configs rely on this too.
pub fn init_crypto() {
    CRYPTO_INIT.call_once(|| {
        // Returns Err if a provider was already installed, which is fine.
        rustls::crypto::ring::default_provider()
            .install_default()
            .ok();
    });
}

/// Make sure a certificate/key pair exists at the given paths.
///
/// Existing files are left alone. Otherwise a self-signed certificate for
/// `localhost` is generated and both PEM files are written. The generated
/// material is for local development; production deployments are expected to
/// provision real certificates out of band.
pub fn ensure_server_certificate(cert_path: &Path, key_path: &Path) -> anyhow::Result<()> {
    if cert_path.exists() && key_path.exists() {
        return Ok(());
    }
    warn!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "no TLS material found, generating self-signed certificate"
    );

    let mut params = CertificateParams::new(vec!["localhost".to_string()])
        .context("building certificate params")?;
    params
        .distinguished_name
        .push(DnType::CommonName, "localhost");
    let key_pair = KeyPair::generate().context("generating certificate key pair")?;
    let cert = params
        .self_signed(&key_pair)
        .context("self-signing certificate")?;

    if let Some(parent) = cert_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(cert_path, cert.pem())
        .with_context(|| format!("writing {}", cert_path.display()))?;
    fs::write(key_path, key_pair.serialize_pem())
        .with_context(|| format!("writing {}", key_path.display()))?;
    info!(cert = %cert_path.display(), "self-signed certificate written");
    Ok(())
}

/// Load the PEM pair into a TLS 1.3-only server configuration.
pub fn build_server_config(
    cert_path: &Path,
    key_path: &Path,
) -> anyhow::Result<Arc<rustls::ServerConfig>> {
    let certs: Vec<CertificateDer<'static>> = CertificateDer::pem_file_iter(cert_path)
        .with_context(|| format!("reading {}", cert_path.display()))?
        .collect::<Result<_, _>>()
        .context("parsing certificate chain")?;
    let key = PrivateKeyDer::from_pem_file(key_path)
        .with_context(|| format!("reading {}", key_path.display()))?;

    let config = rustls::ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("assembling TLS server config")?;
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certificate_bootstrap_and_config_load() {
        init_crypto();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");

        ensure_server_certificate(&cert_path, &key_path).unwrap();
        assert!(cert_path.exists());
        assert!(key_path.exists());

        let pem = fs::read_to_string(&cert_path).unwrap();
        assert!(pem.contains("BEGIN CERTIFICATE"));

        let config = build_server_config(&cert_path, &key_path).unwrap();
        assert!(Arc::strong_count(&config) >= 1);
    }

    #[test]
    fn test_existing_material_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        fs::write(&cert_path, "existing cert").unwrap();
        fs::write(&key_path, "existing key").unwrap();

        ensure_server_certificate(&cert_path, &key_path).unwrap();
        assert_eq!(fs::read_to_string(&cert_path).unwrap(), "existing cert");
        assert_eq!(fs::read_to_string(&key_path).unwrap(), "existing key");
    }
}
