//! Client construction settings: seed target, TLS material and file loading.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tonic::transport::{Certificate, ClientTlsConfig, Identity, Uri};

use crate::ClientError;
use crate::types::{DEFAULT_PORT, NodeTarget};

pub const INSECURE_SCHEME: &str = "hstream";
pub const SECURE_SCHEME: &str = "hstreams";

/// PEM-encoded transport security material.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    pub root_certificates: Option<Vec<u8>>,
    pub private_key: Option<Vec<u8>>,
    pub certificate_chain: Option<Vec<u8>>,
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("root_certificates", &self.root_certificates.as_ref().map(Vec::len))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("certificate_chain", &self.certificate_chain.as_ref().map(Vec::len))
            .finish()
    }
}

impl TlsMaterial {
    pub fn from_pem(
        root_certificates: Option<Vec<u8>>,
        private_key: Option<Vec<u8>>,
        certificate_chain: Option<Vec<u8>>,
    ) -> Self {
        Self {
            root_certificates,
            private_key,
            certificate_chain,
        }
    }

    /// Read the material from PEM files at construction time.
    pub fn from_files(
        root_certificates: Option<&Path>,
        private_key: Option<&Path>,
        certificate_chain: Option<&Path>,
    ) -> Result<Self, ClientError> {
        fn read(path: Option<&Path>, what: &str) -> Result<Option<Vec<u8>>, ClientError> {
            path.map(|p| {
                std::fs::read(p).map_err(|e| {
                    ClientError::from_io_error(e, &format!("reading {what} '{}'", p.display()))
                })
            })
            .transpose()
        }

        Ok(Self {
            root_certificates: read(root_certificates, "root certificates")?,
            private_key: read(private_key, "private key")?,
            certificate_chain: read(certificate_chain, "certificate chain")?,
        })
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.private_key.is_some() != self.certificate_chain.is_some() {
            return Err(ClientError::InvalidConfig {
                context: "TLS material".to_string(),
                reason: "private key and certificate chain must be given together".to_string(),
            });
        }
        Ok(())
    }

    /// Without root certificates the platform trust store is used.
    pub(crate) fn to_tls_config(&self, domain: &str) -> ClientTlsConfig {
        let mut tls = ClientTlsConfig::new().domain_name(domain);
        tls = match &self.root_certificates {
            Some(root) => tls.ca_certificate(Certificate::from_pem(root)),
            None => tls.with_native_roots(),
        };
        if let (Some(chain), Some(key)) = (&self.certificate_chain, &self.private_key) {
            tls = tls.identity(Identity::from_pem(chain, key));
        }
        tls
    }
}

/// How to reach the cluster: one seed node plus optional TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub seed: NodeTarget,
    pub tls: Option<TlsMaterial>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            seed: NodeTarget::new(host, port),
            tls: None,
        }
    }

    /// Parse `hstream://host[:port]` or `hstreams://host[:port]`.
    ///
    /// The secure scheme enables TLS; attach material with [`Self::with_tls`].
    pub fn from_url(url: &str) -> Result<Self, ClientError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ClientError::from_parse_error(e, "service url"))?;

        let tls = match uri.scheme_str() {
            Some(INSECURE_SCHEME) => None,
            Some(SECURE_SCHEME) => Some(TlsMaterial::default()),
            other => {
                return Err(ClientError::InvalidConfig {
                    context: "service url".to_string(),
                    reason: format!(
                        "invalid scheme '{}', expected '{INSECURE_SCHEME}' or '{SECURE_SCHEME}'",
                        other.unwrap_or_default()
                    ),
                });
            }
        };

        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::InvalidConfig {
                context: "service url".to_string(),
                reason: format!("'{url}' has no host"),
            })?;

        Ok(Self {
            seed: NodeTarget::new(host, uri.port_u16().unwrap_or(DEFAULT_PORT)),
            tls,
        })
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsFiles {
    pub root_certificates: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
    pub certificate_chain: Option<PathBuf>,
}

/// On-disk client settings. `url` takes precedence over `host`/`port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsFiles>,
}

/// Encodings accepted for settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingsFormat {
    Json,
    Yaml,
}

impl SettingsFormat {
    /// The format a file extension names, if any. Case-insensitive.
    fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    fn parse(self, content: &str) -> Result<ClientSettings, ClientError> {
        match self {
            Self::Json => serde_json::from_str(content)
                .map_err(|e| ClientError::from_parse_error(e, "JSON settings")),
            Self::Yaml => serde_yaml::from_str(content)
                .map_err(|e| ClientError::from_parse_error(e, "YAML settings")),
        }
    }
}

impl ClientSettings {
    /// Read settings from `path`, picking the format from its extension.
    ///
    /// Files without a recognised extension are read as YAML, which also
    /// accepts JSON documents.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::from_io_error(e, &format!("reading settings '{}'", path.display()))
        })?;

        SettingsFormat::from_extension(path)
            .unwrap_or(SettingsFormat::Yaml)
            .parse(&content)
    }

    pub fn into_config(self) -> Result<ClientConfig, ClientError> {
        let mut config = match self.url {
            Some(url) => ClientConfig::from_url(&url)?,
            None => ClientConfig::new(
                self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
                self.port.unwrap_or(DEFAULT_PORT),
            ),
        };

        if let Some(files) = self.tls {
            config = config.with_tls(TlsMaterial::from_files(
                files.root_certificates.as_deref(),
                files.private_key.as_deref(),
                files.certificate_chain.as_deref(),
            )?);
        }
        Ok(config)
    }
}
