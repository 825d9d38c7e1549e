//! Process configuration shared by both binaries
//!
//! Values come from flags, then environment (a `.env` file is loaded by
//! each binary first). Nothing here changes after startup.

use crate::auth::principal::AuthConfig;
use crate::storage::PostgresConfig;
use clap::Args;
use std::net::SocketAddr;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GATEHOUSE_TOKEN_KEY is required")]
    MissingTokenKey,

    #[error("invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("invalid DATABASE_URL")]
    InvalidDatabaseUrl,
}

/// Credentials and keys used for principal resolution
#[derive(Debug, Clone, Default, Args)]
pub struct AuthArgs {
    /// Operator key granting full access
    #[arg(long, env = "GATEHOUSE_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// OIDC group whose members get full access
    #[arg(long, env = "GATEHOUSE_ADMIN_GROUP")]
    pub admin_group: Option<String>,

    /// Key for API token digests
    #[arg(long, env = "GATEHOUSE_TOKEN_KEY", hide_env_values = true)]
    pub token_key: Option<String>,
}

impl AuthArgs {
    pub fn to_auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let token_key = self
            .token_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingTokenKey)?;

        let mut config = AuthConfig::new(token_key.as_bytes().to_vec());
        if let Some(key) = self.admin_key.as_deref().filter(|k| !k.is_empty()) {
            config = config.with_admin_key(key);
        }
        if let Some(group) = &self.admin_group {
            config = config.with_admin_group(group.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct DatabaseArgs {
    /// Postgres URL; without it the daemon keeps state in memory
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
}

impl DatabaseArgs {
    /// `Ok(None)` when no database is configured
    pub fn postgres_config(&self) -> Result<Option<PostgresConfig>, ConfigError> {
        match self.database_url.as_deref().filter(|u| !u.is_empty()) {
            None => Ok(None),
            Some(url) => PostgresConfig::from_url(url)
                .map(Some)
                .ok_or(ConfigError::InvalidDatabaseUrl),
        }
    }
}

/// Daemon settings
#[derive(Debug, Clone, Args)]
pub struct ServerArgs {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND, env = "GATEHOUSE_BIND")]
    pub bind: String,

    #[command(flatten)]
    pub auth: AuthArgs,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

impl ServerArgs {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        server: ServerArgs,
    }

    fn parse(args: &[&str]) -> ServerArgs {
        TestCli::try_parse_from(std::iter::once("gatehoused").chain(args.iter().copied()))
            .unwrap()
            .server
    }

    #[test]
    fn test_token_key_required() {
        let args = AuthArgs::default();
        assert!(matches!(args.to_auth_config(), Err(ConfigError::MissingTokenKey)));

        let args = AuthArgs {
            token_key: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(args.to_auth_config(), Err(ConfigError::MissingTokenKey)));
    }

    #[test]
    fn test_auth_config() {
        let args = AuthArgs {
            admin_key: Some("root".into()),
            admin_group: Some("ops".into()),
            token_key: Some("k".into()),
        };
        let config = args.to_auth_config().unwrap();
        assert!(config.admin_key.as_ref().is_some_and(|k| k.matches("root")));
        assert_eq!(config.admin_group.as_deref(), Some("ops"));
    }

    #[test]
    fn test_empty_admin_key_disabled() {
        let args = AuthArgs {
            admin_key: Some(String::new()),
            token_key: Some("k".into()),
            ..Default::default()
        };
        assert!(args.to_auth_config().unwrap().admin_key.is_none());
    }

    #[test]
    fn test_server_args_flags() {
        let args = parse(&[
            "--bind",
            "127.0.0.1:9000",
            "--token-key",
            "k",
            "--database-url",
            "postgres://u:p@localhost/gatehouse",
        ]);
        assert_eq!(args.bind_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert!(args.database.postgres_config().unwrap().is_some());

        let bad = ServerArgs {
            bind: "nowhere".into(),
            ..args
        };
        assert!(matches!(bad.bind_addr(), Err(ConfigError::InvalidBind(_))));
    }

    #[test]
    fn test_database_url() {
        let none = DatabaseArgs::default();
        assert!(none.postgres_config().unwrap().is_none());

        let bad = DatabaseArgs {
            database_url: Some("mysql://x".into()),
        };
        assert!(matches!(bad.postgres_config(), Err(ConfigError::InvalidDatabaseUrl)));
    }
}
