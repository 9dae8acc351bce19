//! CLI handlers for the session commands.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::auth::TeardownReason;
use crate::client::{ApiClient, ApiRequest, LoginOutcome};
use crate::config::ClientConfig;
use crate::error::ClientError;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Build a client from the config file (if any) and the environment.
pub fn build_client(config_path: Option<&Path>) -> Result<ApiClient, ClientError> {
    let _ = dotenvy::dotenv();
    let config = match config_path {
        Some(path) => ClientConfig::load_from_path(path)?,
        None => ClientConfig::default(),
    };
    let config = config.apply_env(|name| std::env::var(name).ok())?;

    let signal = |reason: TeardownReason| match reason {
        TeardownReason::Logout => eprintln!("👋 Signed out"),
        TeardownReason::RenewalFailed => {
            eprintln!("⚠️  Session expired, run `portal login` to sign in again")
        }
    };
    ApiClient::builder()
        .config(config)
        .signal(Arc::new(signal))
        .build()
}

/// Handle `portal login <faculty_id>`.
pub async fn handle_login(client: &ApiClient, faculty_id: &str, password: Option<String>) -> CliResult {
    let password = match password {
        Some(p) => p,
        None => prompt("Password: ")?,
    };

    match client.login(faculty_id, &password).await? {
        LoginOutcome::Ready { role, identity } => {
            println!("✅ Signed in as {} ({role})", identity.display_name());
        }
        LoginOutcome::ChooseRole { roles } => {
            println!("✅ Signed in. Choose a role with `portal role <name>`:");
            for role in roles {
                println!("  - {role}");
            }
        }
    }
    Ok(())
}

/// Handle `portal role <name>`.
pub fn handle_role(client: &ApiClient, name: &str) -> CliResult {
    let role = client.choose_role(name)?;
    println!("✅ Active role: {role}");
    Ok(())
}

/// Handle `portal whoami`.
pub fn handle_whoami(client: &ApiClient) -> CliResult {
    let Some(identity) = client.restore_session()? else {
        println!("❌ Not signed in");
        return Ok(());
    };
    println!("👤 {} <{}>", identity.display_name(), identity.email);
    println!("   Faculty ID: {}", identity.faculty_id);
    match client.active_role()? {
        Some(role) => println!("   Role: {role}"),
        None => println!("   Role: (none selected) of {}", identity.role_names().join(", ")),
    }
    Ok(())
}

/// Handle `portal get <path>`.
pub async fn handle_get(client: &ApiClient, path: &str, query: Vec<(String, String)>) -> CliResult {
    let mut request = ApiRequest::get(path);
    for (key, value) in query {
        request = request.query(key, value);
    }
    let response = client.send(request).await?;
    match response.json::<serde_json::Value>() {
        Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}

/// Handle `portal logout`.
pub async fn handle_logout(client: &ApiClient) -> CliResult {
    if !client.logout().await? {
        println!("Not signed in");
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String, std::io::Error> {
    print!("{label}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
