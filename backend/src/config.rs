use anyhow::anyhow;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub listen_port: u16,
    pub time_zone: Tz,
    /// Default age threshold used by the `audit_purge` binary.
    pub audit_retention_days: u32,
    /// Row cap applied to audit export downloads.
    pub audit_export_max_rows: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/gradekeeper".to_string());

        let listen_port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let time_zone_name = env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let time_zone: Tz = time_zone_name
            .parse()
            .map_err(|_| anyhow!("Invalid APP_TIMEZONE value: {}", time_zone_name))?;

        let audit_retention_days = env::var("AUDIT_RETENTION_DAYS")
            .unwrap_or_else(|_| "365".to_string())
            .parse()
            .unwrap_or(365);

        let audit_export_max_rows = env::var("AUDIT_EXPORT_MAX_ROWS")
            .unwrap_or_else(|_| "10000".to_string())
            .parse()
            .unwrap_or(10_000);

        Ok(Config {
            database_url,
            listen_port,
            time_zone,
            audit_retention_days,
            audit_export_max_rows,
        })
    }
}
