pub const DEFAULT_PORT: u16 = 39100;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:party.db?mode=rwc";

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Requests per minute per credential. Zero disables rate limiting.
    pub rate_limit_per_minute: u32,
    pub allow_registration: bool,
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(v) if v == "1" || v.eq_ignore_ascii_case("true") => true,
        Ok(v) if v == "0" || v.eq_ignore_ascii_case("false") => false,
        _ => default,
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let db_max_connections = match env_parse("PARTY_DB_MAX_CONNECTIONS", 5u32) {
            0 => 5,
            n => n,
        };

        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            db_max_connections,
            rate_limit_per_minute: env_parse("PARTY_RATE_LIMIT", 120),
            allow_registration: env_flag("PARTY_ALLOW_REGISTRATION", true),
        }
    }
}
