//! API key verification and caller identity.

use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Length of the hex fingerprint used as caller identity.
const FINGERPRINT_LEN: usize = 16;

/// Identity used when a caller is neither authenticated nor forwarded.
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Allow-list of accepted API keys. Empty means authentication is off.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Vec<SecretString>,
}

impl ApiKeys {
    pub fn new(keys: Vec<SecretString>) -> Self {
        Self { keys }
    }

    /// Build from plain strings. Convenient in tests and for CLI input.
    pub fn from_strs<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            keys.into_iter()
                .map(|k| SecretString::from(k.into()))
                .collect(),
        )
    }

    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Check a presented credential against every configured key.
    ///
    /// Each comparison is constant-time and all keys are always compared, so
    /// timing reveals neither which key matched nor how much of it.
    pub fn verify(&self, presented: &str) -> bool {
        let mut matched = 0u8;
        for key in &self.keys {
            matched |= presented
                .as_bytes()
                .ct_eq(key.expose_secret().as_bytes())
                .unwrap_u8();
        }
        matched == 1
    }
}

/// Stable, non-reversible identity for a credential.
pub fn fingerprint(key: &str) -> String {
    let hash = blake3::hash(key.as_bytes()).to_hex();
    hash.as_str()[..FINGERPRINT_LEN].to_string()
}

/// Caller identity used for rate limiting.
pub fn caller_identity(authenticated_key: Option<&str>, forwarded: Option<&str>) -> String {
    match (authenticated_key, forwarded) {
        (Some(key), _) => format!("key:{}", fingerprint(key)),
        (None, Some(addr)) => format!("ip:{addr}"),
        (None, None) => ANONYMOUS_CALLER.to_string(),
    }
}
