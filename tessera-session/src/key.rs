//! Session keys and their generator.

use crate::config::{MAX_RANDOM_BYTES, MIN_RANDOM_BYTES};
use crate::error::{SessionError, SessionResult};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest cookie value accepted as a key.
pub const MAX_KEY_LEN: usize = 1024;

/// Raw bytes that encode to exactly [`MAX_KEY_LEN`] base64 characters.
const MAX_RAW_LEN: usize = MAX_KEY_LEN / 4 * 3;

/// Opaque session identifier: backend record key and cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Accept a client-supplied value as a key.
    ///
    /// Returns `None` for values that no generator could have produced:
    /// empty, longer than [`MAX_KEY_LEN`], or outside the base64url alphabet.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = !value.is_empty()
            && value.len() <= MAX_KEY_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(value.to_string()))
    }

    /// Borrow the key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the key text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Produces session keys from client metadata and a CSPRNG.
///
/// A key is `base64url(ip || user_agent || random)`. The random suffix is
/// what makes keys unique; the prefix only spreads keys of different
/// clients apart. The prefix is cut short so the key never exceeds
/// [`MAX_KEY_LEN`].
pub struct KeyGenerator<R = OsRng> {
    rng: Mutex<R>,
    random_bytes: usize,
}

impl KeyGenerator<OsRng> {
    /// Generator reading from the operating system's CSPRNG.
    pub fn new(random_bytes: usize) -> Self {
        Self::with_rng(OsRng, random_bytes)
    }
}

impl Default for KeyGenerator<OsRng> {
    fn default() -> Self {
        Self::new(MIN_RANDOM_BYTES)
    }
}

impl<R: RngCore + CryptoRng> KeyGenerator<R> {
    /// Generator over a caller-supplied random source.
    ///
    /// `random_bytes` is clamped to [`MIN_RANDOM_BYTES`]..=[`MAX_RANDOM_BYTES`].
    pub fn with_rng(rng: R, random_bytes: usize) -> Self {
        Self {
            rng: Mutex::new(rng),
            random_bytes: random_bytes.clamp(MIN_RANDOM_BYTES, MAX_RANDOM_BYTES),
        }
    }

    /// Random bytes appended to every key.
    pub fn random_bytes(&self) -> usize {
        self.random_bytes
    }

    /// Build a key for a client.
    ///
    /// Fails with [`SessionError::Entropy`] when the random source cannot
    /// fill the suffix. There is no fallback.
    pub fn generate(&self, ip_addr: &str, user_agent: &str) -> SessionResult<SessionKey> {
        let room = MAX_RAW_LEN - self.random_bytes;
        let mut buf = Vec::with_capacity(room + self.random_bytes);
        buf.extend(ip_addr.bytes().chain(user_agent.bytes()).take(room));
        let prefix = buf.len();
        buf.resize(prefix + self.random_bytes, 0);

        self.rng
            .lock()
            .try_fill_bytes(&mut buf[prefix..])
            .map_err(|e| SessionError::Entropy(e.to_string()))?;

        Ok(SessionKey(URL_SAFE_NO_PAD.encode(&buf)))
    }
}

/// Anything that can mint session keys. Lets the store hold a generator
/// without carrying its random source as a type parameter.
pub trait KeySource: Send + Sync {
    /// Mint a key for the given client.
    fn generate(&self, ip_addr: &str, user_agent: &str) -> SessionResult<SessionKey>;
}

impl<R> KeySource for KeyGenerator<R>
where
    R: RngCore + CryptoRng + Send,
{
    fn generate(&self, ip_addr: &str, user_agent: &str) -> SessionResult<SessionKey> {
        KeyGenerator::generate(self, ip_addr, user_agent)
    }
}
