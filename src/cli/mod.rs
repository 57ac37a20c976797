//! Command line entry points: run the server or administer the policy
//! store directly.

use anyhow::Context;
use axion_cache::StoreBackend;
use axion_store::keys;
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::state::{AppConfig, Services};

#[derive(Parser, Debug)]
#[command(name = "axion")]
#[command(about = "Axion - role-based access control API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Inspect or change role permissions
    #[command(subcommand)]
    Policy(PolicyCommand),
    /// Manage school records
    #[command(subcommand)]
    School(SchoolCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum PolicyCommand {
    /// Print every role with its permissions
    List,
    /// Replace the permission set of a role
    Set {
        /// Role name, e.g. school_admin
        role: String,

        /// Permission keys such as school:read
        #[arg(required = true)]
        permissions: Vec<String>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SchoolCommand {
    /// Create a school that school admins can be attached to
    Create {
        /// Display name
        name: String,

        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },
}

/// Writes against a private in-memory store would vanish when the command exits.
fn require_shared_store(config: &AppConfig, action: &str) -> anyhow::Result<()> {
    if config.cache.backend != StoreBackend::Redis {
        anyhow::bail!("{} requires STORE_BACKEND=redis; the in-memory store is not shared", action);
    }
    Ok(())
}

pub async fn run_policy(command: PolicyCommand, config: &AppConfig) -> anyhow::Result<()> {
    if matches!(command, PolicyCommand::Set { .. }) {
        require_shared_store(config, "policy set")?;
    }
    let services = Services::connect(config).await?;

    match command {
        PolicyCommand::List => {
            let roles = services
                .engine
                .list_role_permissions()
                .await
                .context("Failed to load role permissions")?;
            for role in roles {
                println!("{}: {}", role.role, role.permissions.join(", "));
            }
        }
        PolicyCommand::Set { role, permissions } => {
            let write = services
                .engine
                .set_role_permissions(&role, &permissions, None)
                .await?;
            println!(
                "Updated {} ({} permissions), policy version {}",
                write.role,
                write.permissions.len(),
                write.version
            );
        }
    }

    Ok(())
}

pub async fn run_school(command: SchoolCommand, config: &AppConfig) -> anyhow::Result<()> {
    require_shared_store(config, "school create")?;
    let services = Services::connect(config).await?;

    match command {
        SchoolCommand::Create { name, id } => {
            let doc = services
                .store
                .upsert_doc(keys::SCHOOLS, id.as_deref(), json!({ "name": name.trim() }))
                .await?;
            println!("Created school {}", doc["_id"].as_str().unwrap_or_default());
        }
    }

    Ok(())
}
