use std::path::PathBuf;

use eyre::OptionExt;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use nfc_access_credential::CredentialProfile;
use nfc_access_session::{DEFAULT_LANGUAGE, SessionOptions};
use serde::{Deserialize, Serialize};

/// Name of the configuration file inside [`config_dir`]
pub const CONFIG_FILE: &str = "config.toml";

/// Prefix of environment variables overriding the file
pub const ENV_PREFIX: &str = "NFC_ACCESS_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Where keys live, the config directory when unset
    pub data_dir: Option<PathBuf>,
    /// Reader to use, any reader when unset
    pub reader: Option<String>,
    pub organization: String,
    pub email_domain: String,
    /// Language code of written text records
    pub language: String,
    /// Turn on the anti-clone counter when issuing
    pub enable_counter: bool,
    /// Seconds to wait for a tag
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let profile = CredentialProfile::default();
        Self {
            data_dir: None,
            reader: None,
            organization: profile.organization,
            email_domain: profile.email_domain,
            language: DEFAULT_LANGUAGE.to_string(),
            enable_counter: true,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Directory holding the key material
    pub fn data_dir(&self) -> eyre::Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => config_dir(),
        }
    }

    pub fn profile(&self) -> CredentialProfile {
        CredentialProfile {
            organization: self.organization.clone(),
            email_domain: self.email_domain.clone(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            language: self.language.clone(),
            profile: self.profile(),
        }
    }
}

/// Returns the base config directory. It also creates the directory if it
/// doesn't exist yet.
pub fn config_dir() -> eyre::Result<PathBuf> {
    let dir = std::env::home_dir()
        .ok_or_eyre("home directory not found")?
        .join(".nfc-access");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Defaults, then the config file, then `NFC_ACCESS_*` variables
pub fn figment(file: PathBuf) -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX))
}

pub fn load_config(file: Option<PathBuf>) -> eyre::Result<Config> {
    let file = match file {
        Some(file) => file,
        None => config_dir()?.join(CONFIG_FILE),
    };
    Ok(figment(file).extract()?)
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|jail| {
            let config: Config = figment(jail.directory().join("missing.toml")).extract()?;
            assert_eq!(config, Config::default());
            assert_eq!(config.organization, "COMCORN");
            assert_eq!(config.language, "zh");
            assert!(config.enable_counter);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    reader = "ACS ACR122U"
                    organization = "ACME"
                    enable_counter = false
                "#,
            )?;
            jail.set_env("NFC_ACCESS_ORGANIZATION", "Initech");
            jail.set_env("NFC_ACCESS_TIMEOUT_SECS", "5");

            let config: Config = figment(jail.directory().join("config.toml")).extract()?;
            assert_eq!(config.reader.as_deref(), Some("ACS ACR122U"));
            assert_eq!(config.organization, "Initech");
            assert_eq!(config.email_domain, "comcorn.cn");
            assert!(!config.enable_counter);
            assert_eq!(config.timeout_secs, 5);
            assert_eq!(config.session_options().profile.organization, "Initech");
            Ok(())
        });
    }
}
