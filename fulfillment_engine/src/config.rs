use std::{env, fmt::Display, str::FromStr};

use log::*;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/storefront.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MAX_ALTERNATE_STORES: usize = 3;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The maximum number of alternate stores the allocator will draw from for a single line item, after the nearest
    /// store. Always at least 1.
    pub max_alternate_stores: usize,
    /// Channel capacity for each event hook. Always at least 1.
    pub event_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_alternate_stores: DEFAULT_MAX_ALTERNATE_STORES,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("SFE_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ SFE_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_env("SFE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let max_alternate_stores = parse_env("SFE_MAX_ALTERNATE_STORES", DEFAULT_MAX_ALTERNATE_STORES);
        let event_buffer_size = parse_env("SFE_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self { database_url, max_connections, ..Default::default() }
            .with_max_alternate_stores(max_alternate_stores)
            .with_event_buffer_size(event_buffer_size)
    }

    pub fn with_database_url<S: Into<String>>(mut self, url: S) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_max_alternate_stores(mut self, max_alternate_stores: usize) -> Self {
        if max_alternate_stores == 0 {
            warn!("🪛️ The allocator needs at least one alternate store. Using 1 instead of 0.");
        }
        self.max_alternate_stores = max_alternate_stores.max(1);
        self
    }

    pub fn with_event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        if event_buffer_size == 0 {
            warn!("🪛️ Event channels need room for at least one event. Using 1 instead of 0.");
        }
        self.event_buffer_size = event_buffer_size.max(1);
        self
    }
}

fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(key) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fan_out_is_at_least_one() {
        let config = EngineConfig::default().with_max_alternate_stores(0);
        assert_eq!(config.max_alternate_stores, 1);
        let config = EngineConfig::default().with_max_alternate_stores(5);
        assert_eq!(config.max_alternate_stores, 5);
    }

    #[test]
    fn event_buffer_is_at_least_one() {
        let config = EngineConfig::default().with_event_buffer_size(0);
        assert_eq!(config.event_buffer_size, 1);
        assert_eq!(EngineConfig::default().event_buffer_size, 25);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        env::set_var("SFE_TEST_ONLY_NUMBER", "not-a-number");
        assert_eq!(parse_env("SFE_TEST_ONLY_NUMBER", 7u32), 7);
        env::set_var("SFE_TEST_ONLY_NUMBER", "12");
        assert_eq!(parse_env("SFE_TEST_ONLY_NUMBER", 7u32), 12);
        assert_eq!(parse_env("SFE_TEST_ONLY_UNSET", 3usize), 3);
    }
}
