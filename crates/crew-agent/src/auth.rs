//! Credentials for the Anthropic API
//!
//! Looked up from the environment, in priority order:
//! 1. `CLAUDE_CODE_OAUTH_TOKEN` - subscription token, sent as a bearer token
//! 2. `ANTHROPIC_API_KEY` - sent as `x-api-key`
//! 3. `ANTHROPIC_AUTH_TOKEN` - bearer token for compatible gateways

use crew_core::{CrewError, Result};
use std::env;

/// Environment variables consulted for a credential, highest priority first
pub const AUTH_ENV_VARS: [&str; 3] = [
    "CLAUDE_CODE_OAUTH_TOKEN",
    "ANTHROPIC_API_KEY",
    "ANTHROPIC_AUTH_TOKEN",
];

/// A credential and how it must be presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    Bearer(String),
}

impl Credential {
    /// Header name and value carrying this credential
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Credential::ApiKey(key) => ("x-api-key", key.clone()),
            Credential::Bearer(token) => ("authorization", format!("Bearer {token}")),
        }
    }
}

/// Get the credential for the Anthropic API
pub fn get_auth_token() -> Result<Credential> {
    if let Some(token) = non_empty_var(AUTH_ENV_VARS[0]) {
        tracing::info!("Using Claude Code OAuth token (subscription)");
        return Ok(Credential::Bearer(token));
    }

    if let Some(key) = non_empty_var(AUTH_ENV_VARS[1]) {
        tracing::info!("Using ANTHROPIC_API_KEY");
        return Ok(Credential::ApiKey(key));
    }

    if let Some(token) = non_empty_var(AUTH_ENV_VARS[2]) {
        tracing::info!("Using ANTHROPIC_AUTH_TOKEN");
        return Ok(Credential::Bearer(token));
    }

    Err(CrewError::Auth(
        "No credential found. Set one of:\n\
         - CLAUDE_CODE_OAUTH_TOKEN=sk-ant-oat01-... (subscription access)\n\
         - ANTHROPIC_API_KEY=sk-ant-api03-...\n\
         - ANTHROPIC_AUTH_TOKEN=...   (bearer token for a compatible gateway)"
            .to_string(),
    ))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_LOCK.lock().unwrap();
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        for (key, value) in vars {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        let result = f();

        for (key, original) in originals {
            match original {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }

        result
    }

    #[test]
    fn test_oauth_token_priority() {
        with_env_vars(
            &[
                ("CLAUDE_CODE_OAUTH_TOKEN", Some("oauth")),
                ("ANTHROPIC_API_KEY", Some("key")),
            ],
            || {
                assert_eq!(get_auth_token().unwrap(), Credential::Bearer("oauth".into()));
            },
        );
    }

    #[test]
    fn test_api_key_before_gateway_token() {
        with_env_vars(
            &[
                ("CLAUDE_CODE_OAUTH_TOKEN", None),
                ("ANTHROPIC_API_KEY", Some("key")),
                ("ANTHROPIC_AUTH_TOKEN", Some("token")),
            ],
            || {
                let credential = get_auth_token().unwrap();
                assert_eq!(credential, Credential::ApiKey("key".into()));
                assert_eq!(credential.header(), ("x-api-key", "key".to_string()));
            },
        );
    }

    #[test]
    fn test_bearer_fallback() {
        with_env_vars(
            &[
                ("CLAUDE_CODE_OAUTH_TOKEN", None),
                ("ANTHROPIC_API_KEY", Some("  ")),
                ("ANTHROPIC_AUTH_TOKEN", Some("token")),
            ],
            || {
                let credential = get_auth_token().unwrap();
                assert_eq!(
                    credential.header(),
                    ("authorization", "Bearer token".to_string())
                );
            },
        );
    }

    #[test]
    fn test_no_credential() {
        with_env_vars(
            &[
                ("CLAUDE_CODE_OAUTH_TOKEN", None),
                ("ANTHROPIC_API_KEY", None),
                ("ANTHROPIC_AUTH_TOKEN", None),
            ],
            || {
                assert!(matches!(get_auth_token(), Err(CrewError::Auth(_))));
            },
        );
    }
}
