//! CLI command definitions

use clap::{Parser, Subcommand};
use gatehouse::auth::PermissionInput;
use gatehouse::config::{AuthArgs, DatabaseArgs};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Namespace-scoped authorization administration", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database schema
    Init,

    /// Show database status and counts
    Status,

    /// Manage namespaces
    Namespace {
        #[command(subcommand)]
        command: NamespaceCommands,
    },

    /// Manage API tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },

    /// Manage roles
    Role {
        #[command(subcommand)]
        command: RoleCommands,
    },

    /// Evaluate one request against stored credentials
    ///
    /// Examples:
    ///   gatehouse check -X GET /api/v2/namespaces/p1/secrets --token gth_...
    ///   gatehouse check -X POST /namespaces --groups ops,dev
    Check {
        /// Request method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request path
        path: String,

        /// Admin key to present
        #[arg(long)]
        key: Option<String>,

        /// Token secret to present
        #[arg(long)]
        token: Option<String>,

        /// Comma-separated OIDC groups to present
        #[arg(long)]
        groups: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NamespaceCommands {
    /// Create a namespace
    Create { name: String },

    /// List all namespaces
    List,

    /// Delete a namespace with its tokens and roles
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Create a token and print its secret
    ///
    /// Examples:
    ///   gatehouse token create p1 deploy -p secrets:read -p variables:manage
    Create {
        namespace: String,
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// ISO-8601 lifetime, e.g. P30D or PT12H
        #[arg(long, default_value = "P30D")]
        duration: String,

        /// Grant as topic:method (can be repeated)
        #[arg(short, long = "permission", value_parser = parse_permission)]
        permission: Vec<PermissionInput>,
    },

    /// List tokens of a namespace
    List { namespace: String },

    /// Show token details
    Show { namespace: String, name: String },

    /// Revoke (delete) a token
    Revoke { namespace: String, name: String },
}

#[derive(Subcommand)]
pub enum RoleCommands {
    /// Create a role
    ///
    /// Examples:
    ///   gatehouse role create n1 readers -g g1 -p secrets:read
    Create {
        namespace: String,
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// OIDC group (can be repeated)
        #[arg(short, long = "group")]
        group: Vec<String>,

        /// Grant as topic:method (can be repeated)
        #[arg(short, long = "permission", value_parser = parse_permission)]
        permission: Vec<PermissionInput>,
    },

    /// List roles of a namespace
    List { namespace: String },

    /// Show role details
    Show { namespace: String, name: String },

    /// Delete a role
    Delete { namespace: String, name: String },
}

/// `topic:method`; full validation happens with the rest of the request
fn parse_permission(s: &str) -> Result<PermissionInput, String> {
    let (topic, method) = s
        .split_once(':')
        .ok_or_else(|| format!("Invalid permission: {}. Expected topic:method", s))?;

    Ok(PermissionInput {
        topic: topic.to_string(),
        method: method.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_permission() {
        let p = parse_permission("secrets:read").unwrap();
        assert_eq!(p.topic, "secrets");
        assert_eq!(p.method, "read");

        assert!(parse_permission("secrets").is_err());
    }

    #[test]
    fn test_cli_parses_token_create() {
        let cli = Cli::try_parse_from([
            "gatehouse",
            "token",
            "create",
            "p1",
            "deploy",
            "-p",
            "secrets:read",
            "-p",
            "variables:manage",
        ])
        .unwrap();

        match cli.command {
            Commands::Token {
                command:
                    TokenCommands::Create {
                        namespace,
                        permission,
                        duration,
                        ..
                    },
            } => {
                assert_eq!(namespace, "p1");
                assert_eq!(permission.len(), 2);
                assert_eq!(duration, "P30D");
            }
            _ => panic!("expected token create"),
        }
    }
}
