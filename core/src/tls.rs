//! TLS configuration loader for the RPC transport, out of scope beyond this
//! interface. Grounded on `original_source/config/tls_config.go`'s one-time
//! `SetupTLS` call: a server config built from a cert/key pair, and a
//! client config built from a CA cert, both loaded once at startup.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::{self, Certificate, PrivateKey, RootCertStore};

use crate::error::ChordError;

pub struct TlsMaterial {
    pub server_config: Arc<rustls::ServerConfig>,
    pub client_config: Arc<rustls::ClientConfig>,
}

fn load_certs(path: impl AsRef<Path>) -> Result<Vec<Certificate>, ChordError> {
    let f = std::fs::File::open(path).map_err(|e| ChordError::Config(e.to_string()))?;
    let mut reader = BufReader::new(f);
    let certs = rustls_pemfile::certs(&mut reader).map_err(|e| ChordError::Config(e.to_string()))?;
    Ok(certs.into_iter().map(Certificate).collect())
}

fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKey, ChordError> {
    let f = std::fs::File::open(path).map_err(|e| ChordError::Config(e.to_string()))?;
    let mut reader = BufReader::new(f);
    let keys = rustls_pemfile::pkcs8_private_keys(&mut reader).map_err(|e| ChordError::Config(e.to_string()))?;
    keys.into_iter()
        .next()
        .map(PrivateKey)
        .ok_or_else(|| ChordError::Config("no private key found in file".into()))
}

/// Builds a server config (for accepting connections) and a client config
/// (for dialing peers) from a CA cert plus this node's own cert/key pair.
pub fn setup_tls(
    ca_cert: impl AsRef<Path>,
    server_cert: impl AsRef<Path>,
    server_key: impl AsRef<Path>,
) -> Result<TlsMaterial, ChordError> {
    let certs = load_certs(server_cert)?;
    let key = load_private_key(server_key)?;

    let server_config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ChordError::Config(format!("server tls config: {e}")))?;

    let mut root_store = RootCertStore::empty();
    for cert in load_certs(ca_cert)? {
        root_store
            .add(&cert)
            .map_err(|e| ChordError::Config(format!("adding ca cert: {e}")))?;
    }

    let client_config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(TlsMaterial {
        server_config: Arc::new(server_config),
        client_config: Arc::new(client_config),
    })
}
