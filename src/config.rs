// Remote store configuration
// Loaded once at startup from a key=value env file and injected into the
// components that talk to the remote. An absent file or missing MONGO_URI is
// a valid state: the remote is simply unreachable and everything stays local.

use std::path::Path;

use crate::constants::REMOTE_DB_NAME_DEFAULT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub mongo_uri: Option<String>,
    pub db_name: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            mongo_uri: None,
            db_name: REMOTE_DB_NAME_DEFAULT.to_string(),
        }
    }
}

impl RemoteConfig {
    /// Remote explicitly unset: every remote call degrades to local-only.
    pub fn unset() -> Self {
        Self::default()
    }

    /// Load from a key=value file. Unknown keys are ignored; a missing file
    /// yields the unset config rather than an error.
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => {
                log::info!("No remote config at {}, running local-only", path.display());
                return Self::unset();
            }
        };
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Self {
        let mut config = Self::unset();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "MONGO_URI" if !value.is_empty() => {
                    config.mongo_uri = Some(value.to_string());
                }
                "MONGO_DB_NAME" if !value.is_empty() => {
                    config.db_name = value.to_string();
                }
                _ => {}
            }
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.mongo_uri.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = RemoteConfig::parse(
            "MONGO_URI=mongodb+srv://user:pw@cluster0.example.net/\nMONGO_DB_NAME=farm\n",
        );
        assert_eq!(
            config.mongo_uri.as_deref(),
            Some("mongodb+srv://user:pw@cluster0.example.net/")
        );
        assert_eq!(config.db_name, "farm");
        assert!(config.is_configured());
    }

    #[test]
    fn test_parse_uri_only_uses_default_db_name() {
        let config = RemoteConfig::parse("MONGO_URI=mongodb://localhost:27017\n");
        assert!(config.is_configured());
        assert_eq!(config.db_name, REMOTE_DB_NAME_DEFAULT);
    }

    #[test]
    fn test_comments_blanks_and_junk_ignored() {
        let config = RemoteConfig::parse("# comment\n\nnot a pair\nOTHER_KEY=x\n");
        assert!(!config.is_configured());
        assert_eq!(config.db_name, REMOTE_DB_NAME_DEFAULT);
    }

    #[test]
    fn test_missing_file_is_unset_not_error() {
        let config = RemoteConfig::load(Path::new("/definitely/not/here/config.env"));
        assert!(!config.is_configured());
    }

    #[test]
    fn test_empty_value_treated_as_unset() {
        let config = RemoteConfig::parse("MONGO_URI=\n");
        assert!(!config.is_configured());
    }
}
