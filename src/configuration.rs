use crate::error::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Credential signing settings
///
/// All four values are required; nothing here has a default.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret_access: String,
    pub secret_renewal: String,
    pub access_ttl: i64,       // seconds (e.g., 900 for 15 minutes)
    pub renewal_ttl_days: i64, // days (e.g., 30)
}

/// Upper bound on `renewal_ttl_days` (about a century)
pub const MAX_RENEWAL_TTL_DAYS: i64 = 36_500;

const SECONDS_PER_DAY: i64 = 86_400;

impl JwtSettings {
    /// Reject settings that would mint unusable or forgeable credentials
    ///
    /// Lifetimes must be positive, the renewal lifetime at most
    /// `MAX_RENEWAL_TTL_DAYS`, and an access credential may not outlive the
    /// renewal credential that produced it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_access.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret_access".to_string()));
        }
        if self.secret_renewal.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.secret_renewal".to_string()));
        }
        if self.access_ttl <= 0 {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.access_ttl must be positive, got {}",
                self.access_ttl
            )));
        }
        if self.renewal_ttl_days <= 0 {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.renewal_ttl_days must be positive, got {}",
                self.renewal_ttl_days
            )));
        }
        if self.renewal_ttl_days > MAX_RENEWAL_TTL_DAYS {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.renewal_ttl_days must be at most {}, got {}",
                MAX_RENEWAL_TTL_DAYS, self.renewal_ttl_days
            )));
        }
        if self.access_ttl > self.renewal_ttl_days * SECONDS_PER_DAY {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.access_ttl ({}s) must not exceed the renewal lifetime of {} days",
                self.access_ttl, self.renewal_ttl_days
            )));
        }
        Ok(())
    }
}

/// Which token store backs the renewal service
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone, Default)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
}

/// Load settings from `configuration.yaml` (optional) and `APP__*` environment variables
///
/// `APP__JWT__SECRET_RENEWAL=...` overrides `jwt.secret_renewal`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.jwt.validate()?;
    Ok(settings)
}
