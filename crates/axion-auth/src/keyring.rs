//! Access-token signing key ring.
//!
//! The ring is configured as a comma-separated list of `kid:secret` pairs.
//! An entry without a colon is a bare secret and gets the synthetic kid
//! `legacy-N` (1-based position in the list). With no entries at all the
//! fallback secret becomes a single key with kid `legacy`.

/// Kid given to the fallback secret when the ring spec is empty.
pub const FALLBACK_KID: &str = "legacy";

#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey {
    pub kid: String,
    pub secret: String,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Ordered keys plus the index of the one used for signing.
#[derive(Debug, Clone)]
pub struct KeyRing {
    keys: Vec<SigningKey>,
    active: usize,
}

/// Parses `raw` into ordered keys, falling back to `fallback_secret`.
pub fn build_key_ring(raw: &str, fallback_secret: Option<&str>) -> Vec<SigningKey> {
    let keys: Vec<SigningKey> = raw
        .split(',')
        .map(str::trim)
        .enumerate()
        .filter(|(_, entry)| !entry.is_empty())
        .filter_map(|(idx, entry)| match entry.split_once(':') {
            Some((kid, secret)) => {
                let (kid, secret) = (kid.trim(), secret.trim());
                if secret.is_empty() {
                    return None;
                }
                let kid = if kid.is_empty() {
                    format!("legacy-{}", idx + 1)
                } else {
                    kid.to_string()
                };
                Some(SigningKey {
                    kid,
                    secret: secret.to_string(),
                })
            }
            None => Some(SigningKey {
                kid: format!("legacy-{}", idx + 1),
                secret: entry.to_string(),
            }),
        })
        .collect();

    if !keys.is_empty() {
        return keys;
    }

    fallback_secret
        .filter(|s| !s.is_empty())
        .map(|secret| {
            vec![SigningKey {
                kid: FALLBACK_KID.to_string(),
                secret: secret.to_string(),
            }]
        })
        .unwrap_or_default()
}

impl KeyRing {
    /// The active key is `active_kid` when the ring contains it, otherwise the first key.
    pub fn new(keys: Vec<SigningKey>, active_kid: Option<&str>) -> Self {
        let active = active_kid
            .and_then(|kid| keys.iter().position(|k| k.kid == kid))
            .unwrap_or(0);
        Self { keys, active }
    }

    pub fn active(&self) -> Option<&SigningKey> {
        self.keys.get(self.active)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.kid.as_str())
    }

    /// Verification order: the key named by `kid` first, then the rest in ring order.
    pub fn candidates(&self, kid: Option<&str>) -> Vec<&SigningKey> {
        let preferred = kid.and_then(|kid| self.keys.iter().find(|k| k.kid == kid));
        preferred
            .into_iter()
            .chain(
                self.keys
                    .iter()
                    .filter(move |k| Some(k.kid.as_str()) != preferred.map(|p| p.kid.as_str())),
            )
            .collect()
    }
}
