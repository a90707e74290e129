//! TLS material forwarded verbatim to the transport.

use bytes::Bytes;

/// One or more PEM/DER blobs. Accepts a string, bytes, or a list of either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pem(pub Vec<Bytes>);

impl From<&str> for Pem {
    fn from(value: &str) -> Self {
        Pem(vec![Bytes::copy_from_slice(value.as_bytes())])
    }
}

impl From<String> for Pem {
    fn from(value: String) -> Self {
        Pem(vec![Bytes::from(value)])
    }
}

impl From<&[u8]> for Pem {
    fn from(value: &[u8]) -> Self {
        Pem(vec![Bytes::copy_from_slice(value)])
    }
}

impl From<Vec<u8>> for Pem {
    fn from(value: Vec<u8>) -> Self {
        Pem(vec![Bytes::from(value)])
    }
}

impl From<Bytes> for Pem {
    fn from(value: Bytes) -> Self {
        Pem(vec![value])
    }
}

impl From<Vec<&str>> for Pem {
    fn from(values: Vec<&str>) -> Self {
        Pem(values.into_iter().map(|v| Bytes::copy_from_slice(v.as_bytes())).collect())
    }
}

impl From<Vec<String>> for Pem {
    fn from(values: Vec<String>) -> Self {
        Pem(values.into_iter().map(Bytes::from).collect())
    }
}

impl From<Vec<Vec<u8>>> for Pem {
    fn from(values: Vec<Vec<u8>>) -> Self {
        Pem(values.into_iter().map(Bytes::from).collect())
    }
}

impl From<Vec<Bytes>> for Pem {
    fn from(values: Vec<Bytes>) -> Self {
        Pem(values)
    }
}

/// PKCS#12 bundle with an optional passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pfx {
    pub data: Bytes,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: Vec<Bytes>,
    pub cert: Vec<Bytes>,
    pub key: Vec<Bytes>,
    pub pfx: Vec<Pfx>,
    /// Cleared by `disable_tls_certs`.
    pub verify_certs: bool,
}

impl Default for TlsMaterial {
    fn default() -> Self {
        Self {
            ca: Vec::new(),
            cert: Vec::new(),
            key: Vec::new(),
            pfx: Vec::new(),
            verify_certs: true,
        }
    }
}

impl TlsMaterial {
    pub fn is_empty(&self) -> bool {
        self.ca.is_empty() && self.cert.is_empty() && self.key.is_empty() && self.pfx.is_empty()
    }
}
