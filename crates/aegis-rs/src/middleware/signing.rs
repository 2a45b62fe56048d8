//! Response signing.
//!
//! Signs the canonicalized response content and attaches
//! `X-Response-Signature: keyId=<id>,algorithm=<algo>,signature=<base64>`
//! (the header name is overridable). The signing content is
//! `keyID "\n" header:value lines "\n" body`, with the included headers
//! lowercased and sorted case-insensitively so the signature is
//! deterministic. HMAC secrets are base64 and must decode to at least 32
//! bytes; RSA keys load from PEM, PKCS8 first with a PKCS1 fallback.
//!
//! A signing failure never fails the response: the unsigned response is
//! flushed and an error counter incremented.

use actix_web::http::header::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha512};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigningAlgorithm {
    HmacSha256,
    HmacSha512,
    RsaSha256,
}

impl SigningAlgorithm {
    pub fn label(&self) -> &'static str {
        match self {
            SigningAlgorithm::HmacSha256 => "hmac-sha256",
            SigningAlgorithm::HmacSha512 => "hmac-sha512",
            SigningAlgorithm::RsaSha256 => "rsa-sha256",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    pub algorithm: SigningAlgorithm,
    pub key_id: String,
    /// Base64 HMAC secret; required for the HMAC algorithms.
    #[serde(default)]
    pub secret: Option<String>,
    /// PEM private key; required for rsa-sha256.
    #[serde(default)]
    pub private_key_pem: Option<String>,
    /// Response headers folded into the signature.
    #[serde(default)]
    pub include_headers: Vec<String>,
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

fn default_header_name() -> String {
    "X-Response-Signature".to_string()
}

impl SigningConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.key_id.is_empty() {
            return Err("signing key_id cannot be empty".to_string());
        }
        // The header format is not URL-encoded, so these would corrupt it.
        if self.key_id.contains(',') || self.key_id.contains('=') {
            return Err("signing key_id must not contain ',' or '='".to_string());
        }
        match self.algorithm {
            SigningAlgorithm::HmacSha256 | SigningAlgorithm::HmacSha512 => {
                let secret = self
                    .secret
                    .as_ref()
                    .ok_or_else(|| "HMAC signing requires a secret".to_string())?;
                let decoded = BASE64
                    .decode(secret)
                    .map_err(|e| format!("signing secret is not valid base64: {}", e))?;
                if decoded.len() < 32 {
                    return Err("signing secret must decode to at least 32 bytes".to_string());
                }
            }
            SigningAlgorithm::RsaSha256 => {
                if self.private_key_pem.is_none() {
                    return Err("rsa-sha256 signing requires private_key_pem".to_string());
                }
            }
        }
        Ok(())
    }
}

enum SignerKey {
    HmacSha256(Vec<u8>),
    HmacSha512(Vec<u8>),
    RsaSha256(Box<SigningKey<Sha256>>),
}

#[derive(Debug, Clone, Serialize)]
pub struct SigningStats {
    pub signed: u64,
    pub errors: u64,
}

pub struct ResponseSigner {
    key_id: String,
    algorithm: SigningAlgorithm,
    key: SignerKey,
    header_name: String,
    include_headers: Vec<String>,
    signed: AtomicU64,
    errors: AtomicU64,
}

impl ResponseSigner {
    pub fn new(config: &SigningConfig) -> Result<Self, String> {
        config.validate()?;
        let decoded_secret = || -> Result<Vec<u8>, String> {
            let secret = config
                .secret
                .as_deref()
                .ok_or_else(|| "HMAC signing requires a secret".to_string())?;
            BASE64
                .decode(secret)
                .map_err(|e| format!("signing secret is not valid base64: {}", e))
        };
        let key = match config.algorithm {
            SigningAlgorithm::HmacSha256 => SignerKey::HmacSha256(decoded_secret()?),
            SigningAlgorithm::HmacSha512 => SignerKey::HmacSha512(decoded_secret()?),
            SigningAlgorithm::RsaSha256 => {
                let pem = config
                    .private_key_pem
                    .as_deref()
                    .ok_or_else(|| "rsa-sha256 signing requires private_key_pem".to_string())?;
                let private = RsaPrivateKey::from_pkcs8_pem(pem)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
                    .map_err(|e| format!("could not parse RSA private key: {}", e))?;
                SignerKey::RsaSha256(Box::new(SigningKey::<Sha256>::new(private)))
            }
        };
        let mut include_headers: Vec<String> = config
            .include_headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        include_headers.sort();
        Ok(Self {
            key_id: config.key_id.clone(),
            algorithm: config.algorithm,
            key,
            header_name: config.header_name.clone(),
            include_headers,
            signed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Canonical content: keyID, then sorted lowercased header lines, then
    /// the raw body bytes, newline separated.
    fn canonical_content(&self, headers: &HeaderMap, body: &[u8]) -> Vec<u8> {
        let mut content = Vec::with_capacity(body.len() + 64);
        content.extend_from_slice(self.key_id.as_bytes());
        content.push(b'\n');
        for name in &self.include_headers {
            let value = headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            content.extend_from_slice(name.as_bytes());
            content.push(b':');
            content.extend_from_slice(value.as_bytes());
            content.push(b'\n');
        }
        content.extend_from_slice(body);
        content
    }

    /// Produces the signature header value for a response.
    pub fn sign(&self, headers: &HeaderMap, body: &[u8]) -> Result<String, String> {
        let content = self.canonical_content(headers, body);
        let signature = match &self.key {
            SignerKey::HmacSha256(secret) => {
                let mut mac = Hmac::<Sha256>::new_from_slice(secret)
                    .map_err(|e| format!("hmac init failed: {}", e))?;
                mac.update(&content);
                BASE64.encode(mac.finalize().into_bytes())
            }
            SignerKey::HmacSha512(secret) => {
                let mut mac = Hmac::<Sha512>::new_from_slice(secret)
                    .map_err(|e| format!("hmac init failed: {}", e))?;
                mac.update(&content);
                BASE64.encode(mac.finalize().into_bytes())
            }
            SignerKey::RsaSha256(key) => {
                let signature = key.sign(&content);
                BASE64.encode(signature.to_bytes())
            }
        };
        self.signed.fetch_add(1, Ordering::Relaxed);
        Ok(format!(
            "keyId={},algorithm={},signature={}",
            self.key_id,
            self.algorithm.label(),
            signature
        ))
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SigningStats {
        SigningStats {
            signed: self.signed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
