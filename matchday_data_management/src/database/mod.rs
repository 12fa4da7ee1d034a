pub mod constants;
pub mod db;

use std::{fmt, path::PathBuf};

use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};

/// Connection settings for the MySQL store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl: bool,
    /// Root certificate used to verify the server. Implies TLS.
    pub ssl_ca: Option<PathBuf>,
    /// Create missing tables on connect. Needs the CREATE privilege.
    pub create_tables: bool,
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .charset("utf8mb4");

        match (&self.ssl_ca, self.ssl) {
            (Some(ca), _) => options.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca),
            (None, true) => options.ssl_mode(MySqlSslMode::Required),
            (None, false) => options.ssl_mode(MySqlSslMode::Disabled),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .field("ssl_ca", &self.ssl_ca)
            .field("create_tables", &self.create_tables)
            .finish()
    }
}
