use serde_json::json;

use crate::auth::CredentialVault;
use crate::cli::OutputFormat;
use crate::config;

pub async fn handle(password: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let vault = CredentialVault::new(&config::config().security.credential_path);
    vault.set_credential(password).await?;

    match output_format {
        OutputFormat::Json => println!("{}", json!({ "success": true, "credential_path": vault.path() })),
        OutputFormat::Text => println!("Master password updated ({})", vault.path().display()),
    }
    Ok(())
}
