use serde::Deserialize;
use std::env;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "Unknown store backend '{}', expected 'mongo' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub store_backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Rate limiting is skipped when unset
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
    /// Seeds the question tie-break RNG for reproducible selection
    pub selection_seed: Option<u64>,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then the local one
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let store_backend = settings
            .get_string("store.backend")
            .or_else(|_| env::var("STORE_BACKEND"))
            .unwrap_or_else(|_| "mongo".to_string())
            .parse::<StoreBackend>()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "edufix".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|uri| !uri.is_empty());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                DEV_JWT_SECRET.to_string()
            }
        };

        let access_token_ttl_seconds = settings
            .get_int("auth.access_token_ttl_seconds")
            .ok()
            .or_else(|| {
                env::var("JWT_ACCESS_TOKEN_TTL_SECONDS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
            })
            .unwrap_or(1800);

        let bcrypt_cost = settings
            .get_int("auth.bcrypt_cost")
            .ok()
            .map(|cost| cost as u32)
            .unwrap_or(bcrypt::DEFAULT_COST);

        let selection_seed = settings
            .get_int("practice.selection_seed")
            .ok()
            .map(|seed| seed as u64)
            .or_else(|| {
                env::var("PRACTICE_SELECTION_SEED")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
            });

        let cors_origin = settings
            .get_string("server.cors_origin")
            .or_else(|_| env::var("CORS_ORIGIN"))
            .ok();

        Ok(Config {
            bind_addr,
            store_backend,
            mongo_uri,
            mongo_database,
            redis_uri,
            jwt_secret,
            access_token_ttl_seconds,
            bcrypt_cost,
            selection_seed,
            cors_origin,
        })
    }

    /// Self-contained configuration backed by the in-process store.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            store_backend: StoreBackend::Memory,
            mongo_uri: String::new(),
            mongo_database: "edufix".to_string(),
            redis_uri: None,
            jwt_secret: jwt_secret.to_string(),
            access_token_ttl_seconds: 1800,
            bcrypt_cost: 4,
            selection_seed: None,
            cors_origin: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("mongo".parse::<StoreBackend>().ok(), Some(StoreBackend::Mongo));
        assert_eq!("MongoDB".parse::<StoreBackend>().ok(), Some(StoreBackend::Mongo));
        assert_eq!("memory".parse::<StoreBackend>().ok(), Some(StoreBackend::Memory));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
