use std::path::Path;
use std::sync::Arc;

use eyre::{Result, WrapErr, eyre};
use nfc_access_credential::{
    Authenticity, ContactCard, CredentialVerifier, KeyManager, access_code, find_note,
};

use crate::utils::display;

/// Print the legacy door code of a UID
pub fn door_code_command(uid: &str) -> Result<()> {
    let code = access_code::derive(uid)
        .ok_or_else(|| eyre!("UID '{uid}' is shorter than 4 bytes"))?;
    println!("{code}");
    Ok(())
}

/// Check a credential or bare note against a UID without a reader
pub fn verify_command(
    keys: &Arc<KeyManager>,
    uid: &str,
    text: Option<&str>,
    file: Option<&Path>,
    public_key: Option<&str>,
) -> Result<()> {
    let text = match (text, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Cannot read {}", path.display()))?,
        (None, None) => return Err(eyre!("Pass either --note or --file")),
    };

    let verifier = match public_key {
        Some(public) => {
            CredentialVerifier::from_public_base64(public).wrap_err("Invalid public key")?
        }
        None => {
            if keys.load_public().is_none() {
                return Err(eyre!(
                    "No public key configured, pass --public-key or run `keys import`"
                ));
            }
            CredentialVerifier::new(Arc::clone(keys))
        }
    };

    let verdict = if find_note(&text).is_some() || text.trim().is_empty() {
        verifier.inspect(uid, &text)
    } else if verifier.verify(uid, text.trim()) {
        Authenticity::Genuine
    } else {
        Authenticity::Forged
    };

    let contact = ContactCard::parse(&text);
    if !contact.is_empty() {
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
        println!(
            "{}",
            display::key_value_box(
                "Holder",
                vec![
                    ("Name", field(&contact.name)),
                    ("Organization", field(&contact.organization)),
                    ("Phone", field(&contact.phone)),
                    ("Email", field(&contact.email)),
                ],
            )
        );
    }
    println!("Signature: {}", display::authenticity(Some(verdict)));

    match verdict {
        Authenticity::Forged => Err(eyre!("Signature does not verify for UID {uid}")),
        Authenticity::Genuine | Authenticity::Unsigned => Ok(()),
    }
}
