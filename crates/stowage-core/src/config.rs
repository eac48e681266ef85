//! Configuration module
//!
//! Env-driven configuration for the API and services: server, database,
//! blob/scratch roots, ingestion limits, transcoding parameters, and the
//! API credentials the identity check validates against.

use std::env;
use std::path::PathBuf;

use uuid::Uuid;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: usize = 20;
const MAX_ARCHIVE_SIZE_MB: usize = 1024;
const MAX_CHUNK_COUNT: i32 = 10_000;
const IMAGE_MAX_DIMENSION: u32 = 1024;
const WEBP_QUALITY: f32 = 70.0;

/// One configured API credential: the secret presented by the client and
/// the opaque principal it resolves to.
#[derive(Clone, Debug)]
pub struct ApiKeyEntry {
    pub key: String,
    pub credential_id: Uuid,
    pub owner_id: Option<Uuid>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// Canonical store root; category partitions live directly under it.
    pub blob_root: PathBuf,
    /// Scratch root for in-flight chunk sets and archive staging.
    pub scratch_root: PathBuf,
    pub max_file_size_bytes: usize,
    pub max_archive_size_bytes: usize,
    pub max_chunk_count: i32,
    pub image_max_dimension: u32,
    pub webp_quality: f32,
    pub api_keys: Vec<ApiKeyEntry>,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let api_keys = parse_api_keys(&env::var("API_KEYS").unwrap_or_default())?;
        if is_production && api_keys.is_empty() {
            return Err(anyhow::anyhow!("API_KEYS must be set in production"));
        }

        Ok(Config {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            blob_root: PathBuf::from(
                env::var("BLOB_ROOT").unwrap_or_else(|_| "uploads".to_string()),
            ),
            scratch_root: PathBuf::from(
                env::var("SCRATCH_ROOT").unwrap_or_else(|_| "scratch".to_string()),
            ),
            max_file_size_bytes: env::var("MAX_FILE_SIZE_MB")
                .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            max_archive_size_bytes: env::var("MAX_ARCHIVE_SIZE_MB")
                .unwrap_or_else(|_| MAX_ARCHIVE_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_ARCHIVE_SIZE_MB)
                * 1024
                * 1024,
            max_chunk_count: env::var("MAX_CHUNK_COUNT")
                .unwrap_or_else(|_| MAX_CHUNK_COUNT.to_string())
                .parse()
                .unwrap_or(MAX_CHUNK_COUNT),
            image_max_dimension: env::var("IMAGE_MAX_DIMENSION")
                .unwrap_or_else(|_| IMAGE_MAX_DIMENSION.to_string())
                .parse()
                .unwrap_or(IMAGE_MAX_DIMENSION),
            webp_quality: env::var("WEBP_QUALITY")
                .unwrap_or_else(|_| WEBP_QUALITY.to_string())
                .parse()
                .unwrap_or(WEBP_QUALITY),
            api_keys,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.blob_root == self.scratch_root {
            return Err(anyhow::anyhow!(
                "BLOB_ROOT and SCRATCH_ROOT must be distinct directories"
            ));
        }
        if self.max_chunk_count <= 0 {
            return Err(anyhow::anyhow!("MAX_CHUNK_COUNT must be positive"));
        }
        if !(0.0..=100.0).contains(&self.webp_quality) {
            return Err(anyhow::anyhow!("WEBP_QUALITY must be between 0 and 100"));
        }
        Ok(())
    }
}

/// Parse `API_KEYS` entries of the form `key:credential_uuid[:owner_uuid]`,
/// comma separated. An empty string yields no credentials (development only).
fn parse_api_keys(raw: &str) -> Result<Vec<ApiKeyEntry>, anyhow::Error> {
    let mut entries = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut fields = part.split(':');
        let key = fields
            .next()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("API_KEYS entry missing key: {}", part))?;
        let credential_id = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("API_KEYS entry missing credential id: {}", part))?
            .parse::<Uuid>()
            .map_err(|e| anyhow::anyhow!("API_KEYS credential id is not a UUID: {}", e))?;
        let owner_id = match fields.next() {
            Some(s) => Some(
                s.parse::<Uuid>()
                    .map_err(|e| anyhow::anyhow!("API_KEYS owner id is not a UUID: {}", e))?,
            ),
            None => None,
        };
        entries.push(ApiKeyEntry {
            key: key.to_string(),
            credential_id,
            owner_id,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_keys() {
        let entries = parse_api_keys(
            "s3cret:11111111-1111-1111-1111-111111111111,\
             other:22222222-2222-2222-2222-222222222222:33333333-3333-3333-3333-333333333333",
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "s3cret");
        assert!(entries[0].owner_id.is_none());
        assert!(entries[1].owner_id.is_some());
    }

    #[test]
    fn test_parse_api_keys_empty() {
        assert!(parse_api_keys("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_api_keys_rejects_bad_uuid() {
        assert!(parse_api_keys("key:not-a-uuid").is_err());
    }
}
