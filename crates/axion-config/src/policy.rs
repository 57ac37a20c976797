use std::env;

/// Authorization policy cache settings.
///
/// - `POLICY_CACHE_TTL_SEC`: how long a loaded role map is trusted (default: `30`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyConfig {
    pub cache_ttl_secs: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { cache_ttl_secs: 30 }
    }
}

impl PolicyConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cache_ttl_secs: env::var("POLICY_CACHE_TTL_SEC")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ttl| *ttl > 0)
                .unwrap_or(30),
        }
    }
}
