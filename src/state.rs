use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axion_auth::TokenService;
use axion_cache::{CacheConfig, RedisCache, StoreBackend};
use axion_config::{
    CorsConfig, LoginGuardConfig, PolicyConfig, RateLimitConfig, ServerConfig, TokenConfig,
};
use axion_core::{Clock, SystemClock};
use axion_store::{DataStore, Keyspace, KvStore, MemoryKv, MemoryPubSub, PubSub};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::authorization::AuthorizationEngine;
use crate::dispatcher::Dispatcher;
use crate::middleware::{PRE_STACK, init_registry};
use crate::modules::auth::AuthService;
use crate::modules::auth::router::init_auth_routes;
use crate::modules::authorization::router::init_authorization_routes;
use crate::pipeline::{StackError, VirtualStack};

const MEMORY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Every environment-driven setting the service reads at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub token: TokenConfig,
    pub policy: PolicyConfig,
    pub rate_limit: RateLimitConfig,
    pub login_guard: LoginGuardConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let token = TokenConfig::from_env();
        token.validate()?;

        Ok(Self {
            server: ServerConfig::from_env(),
            cors: CorsConfig::from_env(),
            token,
            policy: PolicyConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            login_guard: LoginGuardConfig::from_env(),
            cache: CacheConfig::from_env(),
        })
    }
}

/// Long-lived services shared by the middleware steps and the modules.
#[derive(Clone)]
pub struct Services {
    pub store: DataStore,
    pub engine: AuthorizationEngine,
    pub tokens: Arc<TokenService>,
    pub auth: AuthService,
    pub clock: Arc<dyn Clock>,
}

impl Services {
    pub fn new(
        kv: Arc<dyn KvStore>,
        pubsub: Arc<dyn PubSub>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        let store = DataStore::with_keyspace(
            kv,
            clock.clone(),
            Keyspace::new(config.cache.key_prefix.clone()),
        );
        let engine = AuthorizationEngine::new(Arc::new(store.clone()), clock.clone(), &config.policy)
            .with_audit(Arc::new(store.clone()))
            .with_pubsub(pubsub);
        let tokens = Arc::new(TokenService::new(&config.token, clock.clone()));
        let auth = AuthService::new(
            store.clone(),
            tokens.clone(),
            engine.clone(),
            config.login_guard.clone(),
        );

        Self {
            store,
            engine,
            tokens,
            auth,
            clock,
        }
    }

    /// Connects the configured backend.
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let (kv, pubsub): (Arc<dyn KvStore>, Arc<dyn PubSub>) = match config.cache.backend {
            StoreBackend::Redis => {
                let cache = Arc::new(
                    RedisCache::new(&config.cache.redis_url)
                        .await
                        .context("Failed to connect to Redis")?,
                );
                info!("Using Redis store backend");
                let kv: Arc<dyn KvStore> = cache.clone();
                let pubsub: Arc<dyn PubSub> = cache;
                (kv, pubsub)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store backend");
                let memory = MemoryKv::new(clock.clone());
                memory.spawn_sweeper(MEMORY_SWEEP_INTERVAL);
                let kv: Arc<dyn KvStore> = Arc::new(memory);
                let pubsub: Arc<dyn PubSub> = Arc::new(MemoryPubSub::new());
                (kv, pubsub)
            }
        };

        Ok(Self::new(kv, pubsub, clock, config))
    }

    pub fn dispatcher(&self, rate_limit: &RateLimitConfig) -> Result<Dispatcher, StackError> {
        let registry = init_registry(
            self.store.clone(),
            self.tokens.clone(),
            self.auth.clone(),
            self.engine.clone(),
            rate_limit.clone(),
        );
        let stack = VirtualStack::new(registry, PRE_STACK);

        let builder = Dispatcher::builder(stack);
        let builder = init_auth_routes(builder, self.auth.clone());
        let builder = init_authorization_routes(builder, self.engine.clone());
        builder.build()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub services: Services,
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub metrics: Option<PrometheusHandle>,
    pub started_at_ms: i64,
}

impl AppState {
    pub fn new(services: Services, config: &AppConfig) -> anyhow::Result<Self> {
        let dispatcher = services.dispatcher(&config.rate_limit)?;
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            started_at_ms: services.clock.now_millis(),
            services,
            server: config.server.clone(),
            cors: config.cors.clone(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn uptime_secs(&self) -> i64 {
        (self.services.clock.now_millis() - self.started_at_ms).max(0) / 1000
    }
}

pub async fn init_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let services = Services::connect(config).await?;

    services
        .engine
        .start_listener()
        .await
        .context("Failed to subscribe to policy updates")?;
    let roles = services
        .engine
        .list_role_permissions()
        .await
        .context("Failed to load role permissions")?;
    info!(roles = roles.len(), "Authorization policy loaded");

    AppState::new(services, config)
}
