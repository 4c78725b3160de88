use std::path::Path;

use eyre::{Result, WrapErr, bail};
use nfc_access_credential::KeyManager;
use tracing::debug;

use crate::utils::display;

/// Open the key store under `data_dir`
pub fn open_keys(data_dir: &Path) -> Result<KeyManager> {
    debug!(data_dir = %data_dir.display(), "Opening key store");
    KeyManager::open(data_dir)
        .wrap_err_with(|| format!("Cannot open key store in {}", data_dir.display()))
}

/// Generate a new signing key pair
pub fn generate_keys_command(keys: &KeyManager, force: bool) -> Result<()> {
    if keys.has_key_pair() && !force {
        bail!("A key pair already exists, pass --force to replace it");
    }

    let pair = keys.generate().wrap_err("Failed to generate key pair")?;
    println!("{}", display::success("Key pair generated"));
    println!(
        "{}",
        display::key_value_box("Public key", vec![("Base64", pair.public_base64())])
    );
    if force {
        println!(
            "{}",
            display::warning("Credentials signed with the previous key no longer verify")
        );
    }
    Ok(())
}

/// Import an existing key pair
pub fn import_keys_command(keys: &KeyManager, public: &str, private: &str) -> Result<()> {
    keys.import_base64(public, private)
        .wrap_err("Failed to import key pair")?;
    println!("{}", display::success("Key pair imported"));
    Ok(())
}

/// Show the configured keys
pub fn show_keys_command(keys: &KeyManager, private: bool) -> Result<()> {
    let Some(public) = keys.public_key_base64() else {
        println!("{}", display::warning("No key pair configured"));
        return Ok(());
    };

    let mut items = vec![("Public", public)];
    let signing = if keys.load_private().is_some() {
        "available"
    } else {
        "unavailable (sealed key cannot be opened)"
    };
    items.push(("Signing", signing.to_string()));

    if private {
        let Some(pair) = keys.export() else {
            bail!("Private key cannot be opened");
        };
        println!("{}", display::sensitive_data_warning());
        items.push(("Private", pair.private_base64().to_string()));
    }

    println!("{}", display::key_value_box("Keys", items));
    Ok(())
}

/// Erase the key pair
pub fn clear_keys_command(keys: &KeyManager) -> Result<()> {
    keys.clear().wrap_err("Failed to clear key pair")?;
    println!("{}", display::success("Key pair cleared"));
    Ok(())
}
