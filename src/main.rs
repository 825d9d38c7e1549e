//! Gatehouse CLI entry point

mod cli;

use crate::cli::{Cli, Commands, NamespaceCommands, RoleCommands, TokenCommands};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use gatehouse::auth::permissions::validate_permissions;
use gatehouse::auth::{
    Credentials, Gatekeeper, IsoDuration, NewApiToken, Permission, PrincipalResolver, RoleSpec,
    TokenSecret, Verb, Verdict,
};
use gatehouse::config::AuthArgs;
use gatehouse::server::{RoleView, TokenView};
use gatehouse::storage::{NamespaceStore, PostgresConfig, PostgresStore, RoleStore, TokenStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let db_config = cli
        .database
        .postgres_config()?
        .context("DATABASE_URL not set")?;

    match cli.command {
        Commands::Init => init(db_config).await,
        Commands::Status => status(db_config).await,
        Commands::Namespace { command } => namespace(db_config, command).await,
        Commands::Token { command } => token(db_config, &cli.auth, command).await,
        Commands::Role { command } => role(db_config, command).await,
        Commands::Check {
            method,
            path,
            key,
            token,
            groups,
        } => check(db_config, &cli.auth, method, path, key, token, groups).await,
    }
}

fn print_permissions(permissions: &Option<Vec<Permission>>) {
    match permissions.as_deref() {
        None | Some([]) => println!("  (none)"),
        Some(permissions) => {
            for permission in permissions {
                println!("  {}", permission);
            }
        }
    }
}

async fn init(db_config: PostgresConfig) -> Result<()> {
    let _store = PostgresStore::new(db_config).await?;
    println!("Database schema initialized successfully");
    Ok(())
}

async fn status(db_config: PostgresConfig) -> Result<()> {
    let store = PostgresStore::new(db_config).await?;
    let namespaces = store.list_namespaces().await?;

    println!("Gatehouse Status");
    println!("================");
    println!("Database: Connected");
    println!("Namespaces: {}", namespaces.len());

    for ns in &namespaces {
        let tokens = store.list_tokens(&ns.name).await?;
        let roles = store.list_roles(&ns.name).await?;
        println!("  {} ({} tokens, {} roles)", ns.name, tokens.len(), roles.len());
    }

    Ok(())
}

async fn namespace(db_config: PostgresConfig, command: NamespaceCommands) -> Result<()> {
    let store = PostgresStore::new(db_config).await?;

    match command {
        NamespaceCommands::Create { name } => {
            store.create_namespace(&name).await?;
            println!("Created namespace: {}", name);
        }
        NamespaceCommands::List => {
            for ns in store.list_namespaces().await? {
                println!("{}\t{}", ns.name, ns.created_at.to_rfc3339());
            }
        }
        NamespaceCommands::Delete { name } => {
            store.delete_namespace(&name).await?;
            println!("Deleted namespace: {}", name);
        }
    }

    Ok(())
}

async fn token(db_config: PostgresConfig, auth: &AuthArgs, command: TokenCommands) -> Result<()> {
    let store = PostgresStore::new(db_config).await?;

    match command {
        TokenCommands::Create {
            namespace,
            name,
            description,
            duration,
            permission,
        } => {
            let auth = auth.to_auth_config()?;
            let lifetime = IsoDuration::parse(&duration)
                .and_then(|d| d.to_time_delta())
                .with_context(|| format!("Invalid duration: {}", duration))?;
            let expires_at = Utc::now()
                .checked_add_signed(lifetime)
                .context("Duration out of range")?;

            let secret = TokenSecret::generate();
            let token = store
                .create_token(
                    &namespace,
                    NewApiToken {
                        name,
                        description,
                        digest: auth.hasher.digest(&secret),
                        permissions: validate_permissions(Some(permission.as_slice()))?,
                        expires_at,
                    },
                )
                .await?;

            println!("{}", secret.expose());
            println!();
            println!("Token: {}/{} ({})", token.namespace, token.name, token.prefix);
            println!("Expires: {}", token.expires_at.to_rfc3339());
            println!("Permissions:");
            print_permissions(&token.permissions);
        }
        TokenCommands::List { namespace } => {
            for token in store.list_tokens(&namespace).await? {
                let view = TokenView::from(token);
                let state = if view.is_expired { "expired" } else { "active" };
                println!("{}\t{}\t{}", view.name, view.prefix, state);
            }
        }
        TokenCommands::Show { namespace, name } => {
            let view = TokenView::from(store.get_token(&namespace, &name).await?);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        TokenCommands::Revoke { namespace, name } => {
            store.delete_token(&namespace, &name).await?;
            println!("Revoked token: {}/{}", namespace, name);
        }
    }

    Ok(())
}

async fn role(db_config: PostgresConfig, command: RoleCommands) -> Result<()> {
    let store = PostgresStore::new(db_config).await?;

    match command {
        RoleCommands::Create {
            namespace,
            name,
            description,
            group,
            permission,
        } => {
            let role = store
                .create_role(
                    &namespace,
                    RoleSpec {
                        name,
                        description,
                        oidc_groups: Some(group),
                        permissions: validate_permissions(Some(permission.as_slice()))?,
                    },
                )
                .await?;

            println!("Created role: {}/{}", role.namespace, role.name);
            println!("Permissions:");
            print_permissions(&role.permissions);
        }
        RoleCommands::List { namespace } => {
            for role in store.list_roles(&namespace).await? {
                let groups = role.oidc_groups.unwrap_or_default().join(",");
                println!("{}\t{}", role.name, groups);
            }
        }
        RoleCommands::Show { namespace, name } => {
            let view = RoleView::from(store.get_role(&namespace, &name).await?);
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        RoleCommands::Delete { namespace, name } => {
            store.delete_role(&namespace, &name).await?;
            println!("Deleted role: {}/{}", namespace, name);
        }
    }

    Ok(())
}

async fn check(
    db_config: PostgresConfig,
    auth: &AuthArgs,
    method: String,
    path: String,
    key: Option<String>,
    token: Option<String>,
    groups: Option<String>,
) -> Result<()> {
    let verb: Verb = method.parse()?;
    let store = Arc::new(PostgresStore::new(db_config).await?);
    let gate = Gatekeeper::new(PrincipalResolver::new(auth.to_auth_config()?, store));

    let mut credentials = Credentials::anonymous();
    if let Some(key) = key {
        credentials = credentials.with_admin_key(key);
    }
    if let Some(token) = token {
        credentials = credentials.with_token(token);
    }
    if let Some(groups) = groups {
        credentials = credentials.with_groups(&groups);
    }

    match gate.check_path(&credentials, verb, &path).await? {
        Verdict::Allow(principal) => println!("allow ({})", principal),
        Verdict::Deny => println!("deny"),
        Verdict::Unauthenticated => println!("unauthenticated"),
    }

    Ok(())
}
