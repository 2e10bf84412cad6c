use std::env;
use std::time::Duration;
use tracing::warn;

/// Which `SchedulingStore` implementation the API wires up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub request_timeout_secs: u64,
    pub booking_max_retries: u32,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, falling back to anon key");
                    supabase_anon_key.clone()
                }),
            supabase_anon_key,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend: match env::var("SCHEDULING_STORE").as_deref() {
                Ok("memory") => StoreBackend::Memory,
                Ok("supabase") => StoreBackend::Supabase,
                Ok(other) => {
                    warn!("Unknown SCHEDULING_STORE '{}', using supabase", other);
                    StoreBackend::Supabase
                }
                Err(_) => StoreBackend::Supabase,
            },
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 10),
            booking_max_retries: parse_or("BOOKING_MAX_RETRIES", 3),
            port: parse_or("PORT", 3000),
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Settings for tests and local runs against the in-memory store.
    pub fn for_memory_store(jwt_secret: &str) -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: jwt_secret.to_string(),
            store_backend: StoreBackend::Memory,
            request_timeout_secs: 10,
            booking_max_retries: 3,
            port: 3000,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
