//! Portal CLI binary entry point.

use portal_client::cli::{session, Cli, Commands};
use portal_client::error::{ClientError, RecoverySuggestion};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let client = match session::build_client(cli.config.as_deref()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Login(args) => session::handle_login(&client, &args.faculty_id, args.password).await,
        Commands::Role(args) => session::handle_role(&client, &args.name),
        Commands::Whoami => session::handle_whoami(&client),
        Commands::Get(args) => session::handle_get(&client, &args.path, args.query).await,
        Commands::Logout => session::handle_logout(&client).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        if let Some(err) = e.downcast_ref::<ClientError>() {
            match err.recovery_suggestion() {
                RecoverySuggestion::Reauthenticate => eprintln!("Hint: run `portal login`"),
                RecoverySuggestion::CheckConfiguration => {
                    eprintln!("Hint: check --config or PORTAL_API_BASE_URL")
                }
                _ => {}
            }
        }
        std::process::exit(1);
    }
}
