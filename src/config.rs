use crate::error::ConfigError;
use crate::registry::{LifecyclePolicy, ReadStamp};
use std::env;
use url::Url;

const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:5000";

#[derive(Debug)]
pub struct Settings {
    pub database_url: String,
    pub server_address: String,
    /// Base for the verification and status urls handed out to senders.
    pub public_url: Url,
    pub policy: LifecyclePolicy,
    /// Answer unknown ids on the verification route with the pixel too.
    pub uniform_verification_response: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let public_url = parse_public_url(
            &lookup("PUBLIC_URL").unwrap_or_else(|| DEFAULT_PUBLIC_URL.to_string()),
        )?;
        let read_stamp = match lookup("READ_TIMESTAMP") {
            Some(value) => value.parse::<ReadStamp>().map_err(|reason| ConfigError::Invalid {
                name: "READ_TIMESTAMP",
                value,
                reason,
            })?,
            None => ReadStamp::default(),
        };
        Ok(Settings {
            database_url: required("DATABASE_URL")?,
            server_address: required("SERVER_ADDRESS")?,
            public_url,
            policy: LifecyclePolicy {
                rearm_after_read: parse_flag("REARM_AFTER_READ", lookup("REARM_AFTER_READ"))?,
                read_stamp,
            },
            uniform_verification_response: parse_flag(
                "UNIFORM_VERIFICATION_RESPONSE",
                lookup("UNIFORM_VERIFICATION_RESPONSE"),
            )?,
        })
    }
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value,
            reason: "expected a boolean".into(),
        }),
    }
}

/// Parses the public base url, forcing a trailing slash so that joins append to its path.
fn parse_public_url(text: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        name: "PUBLIC_URL",
        value: text.to_string(),
        reason,
    };
    let mut url = Url::parse(text).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("not a base url".into()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "sqlite::memory:"),
        ("SERVER_ADDRESS", "127.0.0.1:5000"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let settings = settings(&REQUIRED).unwrap();
        assert_eq!(settings.public_url.as_str(), "http://127.0.0.1:5000/");
        assert_eq!(settings.policy, LifecyclePolicy::default());
        assert!(!settings.policy.rearm_after_read);
        assert_eq!(settings.policy.read_stamp, ReadStamp::Last);
        assert!(!settings.uniform_verification_response);
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = settings(&[("SERVER_ADDRESS", "127.0.0.1:5000")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn optional_vars_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("PUBLIC_URL", "https://mail.example.com/tracker"),
            ("REARM_AFTER_READ", "true"),
            ("READ_TIMESTAMP", "first"),
            ("UNIFORM_VERIFICATION_RESPONSE", "1"),
        ]);
        let settings = settings(&vars).unwrap();
        assert_eq!(settings.public_url.as_str(), "https://mail.example.com/tracker/");
        assert!(settings.policy.rearm_after_read);
        assert_eq!(settings.policy.read_stamp, ReadStamp::First);
        assert!(settings.uniform_verification_response);
    }

    #[test]
    fn bad_flag_names_the_variable() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("REARM_AFTER_READ", "maybe"));
        let err = settings(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "REARM_AFTER_READ", .. }));
    }

    #[test]
    fn bad_read_timestamp_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("READ_TIMESTAMP", "sometimes"));
        let err = settings(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "READ_TIMESTAMP", .. }));
    }

    #[test]
    fn relative_public_url_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PUBLIC_URL", "/tracker"));
        let err = settings(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PUBLIC_URL", .. }));
    }
}
