use std::env;

/// Brute-force protection for the login endpoint, plus the bcrypt cost for new hashes.
///
/// # Environment Variables
///
/// - `AUTH_LOGIN_MAX_FAILURES`: failed attempts before the account locks (default: 5)
/// - `AUTH_LOGIN_WINDOW_SEC`: sliding window for counting failures (default: 900)
/// - `AUTH_LOGIN_LOCK_SEC`: lock duration (default: 900)
/// - `PASSWORD_SALT_ROUNDS`: bcrypt cost (default: 10)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginGuardConfig {
    pub max_failures: u64,
    pub window_secs: u64,
    pub lock_secs: u64,
    pub salt_rounds: u32,
}

impl Default for LoginGuardConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_secs: 900,
            lock_secs: 900,
            salt_rounds: 10,
        }
    }
}

impl LoginGuardConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_failures: positive("AUTH_LOGIN_MAX_FAILURES").unwrap_or(defaults.max_failures),
            window_secs: positive("AUTH_LOGIN_WINDOW_SEC").unwrap_or(defaults.window_secs),
            lock_secs: positive("AUTH_LOGIN_LOCK_SEC").unwrap_or(defaults.lock_secs),
            salt_rounds: env::var("PASSWORD_SALT_ROUNDS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (4..=31).contains(v))
                .unwrap_or(defaults.salt_rounds),
        }
    }
}

fn positive(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}
