//! CLI entry point for the portal client.

pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Portal API CLI
#[derive(Parser, Debug)]
#[command(name = "portal", version, about = "Portal API client CLI")]
pub struct Cli {
    /// TOML config file (defaults < file < PORTAL_* environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with a faculty ID
    Login(LoginArgs),
    /// Select the active role after a multi-role login
    Role(RoleArgs),
    /// Show the signed-in user
    Whoami,
    /// GET an API path and print the JSON body
    Get(GetArgs),
    /// End the session and revoke its refresh credential
    Logout,
}

/// Arguments for `portal login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    pub faculty_id: String,

    /// Prompted on stdin when omitted
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Arguments for `portal role`.
#[derive(Parser, Debug)]
pub struct RoleArgs {
    pub name: String,
}

/// Arguments for `portal get`.
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Path relative to the API base URL, e.g. /syllabi/
    pub path: String,

    /// Query parameters as key=value
    #[arg(short, long = "query", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_login_with_password() {
        let cli = Cli::try_parse_from(["portal", "login", "2020-0001", "-p", "secret"]).unwrap();
        match cli.command {
            Commands::Login(args) => {
                assert_eq!(args.faculty_id, "2020-0001");
                assert_eq!(args.password.as_deref(), Some("secret"));
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_login_without_password() {
        let cli = Cli::try_parse_from(["portal", "login", "2020-0001"]).unwrap();
        match cli.command {
            Commands::Login(args) => assert!(args.password.is_none()),
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn parse_role() {
        let cli = Cli::try_parse_from(["portal", "role", "Dean"]).unwrap();
        match cli.command {
            Commands::Role(args) => assert_eq!(args.name, "Dean"),
            other => panic!("expected Role, got {other:?}"),
        }
    }

    #[test]
    fn parse_get_with_query_and_global_config() {
        let cli = Cli::try_parse_from([
            "portal",
            "get",
            "/syllabi/",
            "-q",
            "status=pending",
            "--config",
            "portal.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("portal.toml")));
        match cli.command {
            Commands::Get(args) => {
                assert_eq!(args.path, "/syllabi/");
                assert_eq!(args.query, vec![("status".to_string(), "pending".to_string())]);
            }
            other => panic!("expected Get, got {other:?}"),
        }
    }

    #[test]
    fn parse_whoami_and_logout() {
        let cli = Cli::try_parse_from(["portal", "whoami"]).unwrap();
        assert!(matches!(cli.command, Commands::Whoami));
        let cli = Cli::try_parse_from(["portal", "logout"]).unwrap();
        assert!(matches!(cli.command, Commands::Logout));
    }

    #[test]
    fn parse_bad_query_pair_is_error() {
        assert!(Cli::try_parse_from(["portal", "get", "/tos/", "-q", "nokey"]).is_err());
    }

    #[test]
    fn parse_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["portal"]).is_err());
    }

    #[test]
    fn parse_login_missing_faculty_id_is_error() {
        assert!(Cli::try_parse_from(["portal", "login"]).is_err());
    }
}
