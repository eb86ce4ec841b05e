// davbackup/src/config/provider.rs
use std::fmt;
use std::str::FromStr;

use crate::errors::{BackupError, BackupResult};

/// How credentials are presented to the WebDAV endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
}

impl FromStr for AuthScheme {
    type Err = BackupError;

    fn from_str(s: &str) -> BackupResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(AuthScheme::Basic),
            "digest" => Ok(AuthScheme::Digest),
            other => Err(BackupError::config(format!(
                "unsupported auth scheme '{}', expected 'basic' or 'digest'",
                other
            ))),
        }
    }
}

/// Named WebDAV endpoints. Each one resolves to a [`Preset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Yandex,
    GoogleProxy,
    DropboxProxy,
    CloudMe,
    Mail,
    OneDrive { cid: String },
    Custom { url: String, auth: AuthScheme },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub base_url: String,
    pub auth: AuthScheme,
}

impl Provider {
    /// Parses the provider name used in `config.json`. The extra fields only
    /// matter for `custom` and `onedrive`.
    pub fn from_config(
        name: &str,
        url: Option<&str>,
        auth: Option<&str>,
        cid: Option<&str>,
    ) -> BackupResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "yandex" => Ok(Provider::Yandex),
            "google" => Ok(Provider::GoogleProxy),
            "dropbox" => Ok(Provider::DropboxProxy),
            "cloudme" => Ok(Provider::CloudMe),
            "mail" => Ok(Provider::Mail),
            "onedrive" => Ok(Provider::OneDrive {
                cid: cid.unwrap_or_default().to_string(),
            }),
            "custom" => {
                let url = url.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
                    BackupError::config("provider 'custom' requires a 'url'")
                })?;
                let auth = match auth {
                    Some(a) => a.parse()?,
                    None => AuthScheme::Basic,
                };
                Ok(Provider::Custom {
                    url: url.to_string(),
                    auth,
                })
            }
            other => Err(BackupError::config(format!("unknown provider '{}'", other))),
        }
    }

    /// Resolves the endpoint for `login`. Providers that shut down their
    /// WebDAV access fail here rather than somewhere inside the pipeline.
    pub fn preset(&self, login: &str) -> BackupResult<Preset> {
        let (base_url, auth) = match self {
            Provider::Yandex => ("https://webdav.yandex.ru/".to_string(), AuthScheme::Basic),
            Provider::GoogleProxy => (
                "https://dav-pocket.appspot.com/docso/".to_string(),
                AuthScheme::Basic,
            ),
            Provider::DropboxProxy => ("https://dav.dropdav.com/".to_string(), AuthScheme::Basic),
            Provider::CloudMe => (
                format!("https://webdav.cloudme.com/{}/xios/", login),
                AuthScheme::Digest,
            ),
            Provider::Mail => {
                return Err(BackupError::config(
                    "Mail.ru temporarily disabled access to WebDAV",
                ));
            }
            Provider::OneDrive { .. } => {
                return Err(BackupError::config(
                    "Microsoft temporarily disabled access to WebDAV",
                ));
            }
            Provider::Custom { url, auth } => (url.clone(), *auth),
        };
        Ok(Preset { base_url, auth })
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Yandex => "Yandex Disk",
            Provider::GoogleProxy => "Google Drive (dav-pocket)",
            Provider::DropboxProxy => "DropBox (dropdav)",
            Provider::CloudMe => "CloudMe",
            Provider::Mail => "Mail.ru Cloud",
            Provider::OneDrive { .. } => "OneDrive",
            Provider::Custom { .. } => "custom WebDAV",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yandex_preset_uses_basic_auth() {
        let preset = Provider::Yandex.preset("user").unwrap();
        assert_eq!(preset.base_url, "https://webdav.yandex.ru/");
        assert_eq!(preset.auth, AuthScheme::Basic);
    }

    #[test]
    fn test_cloudme_preset_embeds_login_and_uses_digest() {
        let preset = Provider::CloudMe.preset("alice").unwrap();
        assert_eq!(preset.base_url, "https://webdav.cloudme.com/alice/xios/");
        assert_eq!(preset.auth, AuthScheme::Digest);
    }

    #[test]
    fn test_disabled_providers_fail_at_selection() {
        let mail = Provider::Mail.preset("user");
        assert!(matches!(mail, Err(BackupError::Configuration(_))));

        let onedrive = Provider::from_config("onedrive", None, None, Some("abc123"))
            .unwrap()
            .preset("user");
        assert!(matches!(onedrive, Err(BackupError::Configuration(_))));
    }

    #[test]
    fn test_custom_provider_requires_url() {
        let err = Provider::from_config("custom", None, None, None);
        assert!(matches!(err, Err(BackupError::Configuration(_))));

        let custom =
            Provider::from_config("custom", Some("https://dav.example.org/"), Some("digest"), None)
                .unwrap();
        let preset = custom.preset("user").unwrap();
        assert_eq!(preset.base_url, "https://dav.example.org/");
        assert_eq!(preset.auth, AuthScheme::Digest);
    }

    #[test]
    fn test_unknown_provider_and_scheme_are_rejected() {
        assert!(Provider::from_config("ftp", None, None, None).is_err());
        assert!("ntlm".parse::<AuthScheme>().is_err());
        assert_eq!("Basic".parse::<AuthScheme>().unwrap(), AuthScheme::Basic);
    }
}
