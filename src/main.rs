// Entrypoint for the CLI application.
// - Keeps `main` small: create an API client and hand it to the UI loop.
// - Returns `anyhow::Result` to simplify error handling at the boundary.

use mpesa_cli::{api::ApiClient, ui::welcome_menu};

fn main() -> anyhow::Result<()> {
    // Create an API client configured by the environment variable
    // `MPESA_API_URL`, or default to the local backend. See
    // `api::ApiClient::from_env`.
    let api = ApiClient::from_env()?;

    // Start the interactive menu. This call blocks until the user exits.
    welcome_menu(api)?;
    Ok(())
}
