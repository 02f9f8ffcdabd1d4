pub const DEFAULT_TICK_RATE: u32 = 30;
pub const DEFAULT_WORLD_WIDTH: f64 = 1600.0;
pub const DEFAULT_WORLD_HEIGHT: f64 = 1200.0;
pub const DEFAULT_ADDR: &str = "127.0.0.1:6969";
pub const DEFAULT_QUEUE_CAPACITY: usize = 2000;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub world_width: f64,
    pub world_height: f64,
    pub addr: String,
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            world_width: DEFAULT_WORLD_WIDTH,
            world_height: DEFAULT_WORLD_HEIGHT,
            addr: DEFAULT_ADDR.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            tick_rate: parse_env("STAMPEDE_TICK_RATE", defaults.tick_rate),
            world_width: parse_env("STAMPEDE_WORLD_WIDTH", defaults.world_width),
            world_height: parse_env("STAMPEDE_WORLD_HEIGHT", defaults.world_height),
            addr: std::env::var("STAMPEDE_ADDR").unwrap_or(defaults.addr),
            queue_capacity: parse_env("STAMPEDE_QUEUE_CAPACITY", defaults.queue_capacity),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = ServerConfig::default();

        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.world_width, 1600.0);
        assert_eq!(config.world_height, 1200.0);
        assert_eq!(config.addr, "127.0.0.1:6969");
        assert_eq!(config.queue_capacity, 2000);
    }
}
