//! Certificate material for the remote-control channel.
//!
//! `unbound-control-setup` produces a self-signed server certificate plus a client
//! certificate/key signed by the server key. The server certificate has no
//! subjectAltName, so instead of WebPKI name checks we pin it: the handshake succeeds
//! only if the server presents exactly the certificate found in `unbound_server.pem`.

use std::{
    fs,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde::Serialize;

use crate::error::{ConfigError, ControlError};
use crate::hosts::EncryptionMode;

pub const SERVER_CERT_FILE: &str = "unbound_server.pem";
pub const CLIENT_CERT_FILE: &str = "unbound_control.pem";
pub const CLIENT_KEY_FILE: &str = "unbound_control.key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub server_cert: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl Credentials {
    fn in_dir(dir: &Path) -> Self {
        Credentials {
            server_cert: dir.join(SERVER_CERT_FILE),
            client_cert: dir.join(CLIENT_CERT_FILE),
            client_key: dir.join(CLIENT_KEY_FILE),
        }
    }

    fn paths(&self) -> [&Path; 3] {
        [&self.server_cert, &self.client_cert, &self.client_key]
    }
}

/// Picks the credential files for a host and checks they exist.
pub fn resolve_credentials(
    mode: EncryptionMode,
    display_name: &str,
    config_root: &Path,
) -> Result<Option<Credentials>, ConfigError> {
    let creds = match mode {
        EncryptionMode::None => return Ok(None),
        EncryptionMode::Global => Credentials::in_dir(config_root),
        EncryptionMode::PerHost => Credentials::in_dir(&config_root.join(display_name)),
    };

    if let Some(missing) = creds.paths().into_iter().find(|p| !p.is_file()) {
        return Err(ConfigError::MissingFile {
            path: missing.to_path_buf(),
            host: display_name.to_string(),
        });
    }
    Ok(Some(creds))
}

fn pem_error(path: &Path, reason: impl ToString) -> ControlError {
    ControlError::Pem {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ControlError> {
    let file = fs::File::open(path).map_err(|e| pem_error(path, e))?;
    let mut rd = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut rd)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| pem_error(path, e))?;
    if certs.is_empty() {
        return Err(pem_error(path, "no certificate found"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, ControlError> {
    let file = fs::File::open(path).map_err(|e| pem_error(path, e))?;
    let mut rd = BufReader::new(file);
    rustls_pemfile::private_key(&mut rd)
        .map_err(|e| pem_error(path, e))?
        .ok_or_else(|| pem_error(path, "no private key found"))
}

/// Accepts exactly the pinned server certificate(s); signatures are still checked.
#[derive(Debug)]
struct PinnedServerCert {
    pinned: Vec<CertificateDer<'static>>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedServerCert {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self
            .pinned
            .iter()
            .any(|c| c.as_ref() == end_entity.as_ref())
        {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::UnknownIssuer,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Builds the rustls client config for one host's credentials.
pub fn client_config(creds: &Credentials) -> Result<ClientConfig, ControlError> {
    let pinned = load_certs(&creds.server_cert)?;
    let client_chain = load_certs(&creds.client_cert)?;
    let client_key = load_key(&creds.client_key)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let verifier = PinnedServerCert {
        pinned,
        provider: provider.clone(),
    };

    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_client_auth_cert(client_chain, client_key)?;
    Ok(config)
}
