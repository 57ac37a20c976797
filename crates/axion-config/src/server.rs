use std::env;

/// Listener address and service identity. `PORT` wins over `USER_PORT`.
///
/// # Environment Variables
///
/// - `USER_HOST`: bind host (default: `0.0.0.0`)
/// - `PORT` / `USER_PORT`: bind port (default: `5111`)
/// - `SERVICE_NAME`: name reported by the health endpoint (default: `axion`)
/// - `ENV`: environment label reported by the health endpoint (default: `development`)
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    pub environment: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = env::var("PORT")
            .or_else(|_| env::var("USER_PORT"))
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(defaults.port);

        Self {
            host: env::var("USER_HOST").unwrap_or(defaults.host),
            port,
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            environment: env::var("ENV").unwrap_or(defaults.environment),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5111,
            service_name: "axion".into(),
            environment: "development".into(),
        }
    }
}
