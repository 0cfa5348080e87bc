//! Bearer tokens for the Terra and broker APIs.
//!
//! Tokens come either from a fixed value or from an external credential
//! helper (by default the gcloud CLI reading application-default
//! credentials). Helper output is cached for a while so a long scenario does
//! not spawn a process per request.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::AuthConfig;

/// Helper tokens are reused for this long.
const TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no credential helper configured and no token given")]
    NoSource,

    #[error("failed to run credential helper {program}: {source}")]
    HelperSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("credential helper {program} exited with {code:?}: {stderr}")]
    HelperFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("credential helper {program} printed an empty token")]
    EmptyToken { program: String },

    #[error("TEST_MULE_CREDS is not valid base64: {0}")]
    InvalidCredentials(#[from] base64::DecodeError),

    #[error("failed to write credentials to {path}: {source}")]
    WriteCredentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of bearer tokens.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// A token known up front.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}

/// Runs an external command that prints a token on stdout.
pub struct HelperCommand {
    program: String,
    args: Vec<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

impl HelperCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<String, AuthError> {
        debug!(program = %self.program, "requesting access token from credential helper");
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|source| AuthError::HelperSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AuthError::HelperFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AuthError::EmptyToken {
                program: self.program.clone(),
            });
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl TokenProvider for HelperCommand {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < TOKEN_TTL {
                return Ok(token.clone());
            }
        }
        let token = self.fetch().await?;
        *cached = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

/// Pick the token source described by `config`.
pub fn provider_from_config(config: &AuthConfig) -> Result<Arc<dyn TokenProvider>, AuthError> {
    if let Some(token) = &config.token {
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }
    let (program, args) = config.helper_command.split_first().ok_or(AuthError::NoSource)?;
    Ok(Arc::new(HelperCommand::new(program.clone(), args.to_vec())))
}

/// Decode base64 application-default credentials into
/// `<home>/.config/gcloud/application_default_credentials.json`.
pub fn install_mule_credentials(encoded: &str, home: &Path) -> Result<PathBuf, AuthError> {
    // Secrets stores tend to wrap long values.
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;

    let dir = home.join(".config").join("gcloud");
    std::fs::create_dir_all(&dir).map_err(|source| AuthError::WriteCredentials {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join("application_default_credentials.json");
    std::fs::write(&path, decoded).map_err(|source| AuthError::WriteCredentials {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), "installed test account credentials");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_wins_over_helper() {
        let config = AuthConfig {
            token: Some("abc".to_string()),
            ..AuthConfig::default()
        };
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.access_token().await.unwrap(), "abc");
    }

    #[test]
    fn test_empty_helper_is_rejected() {
        let config = AuthConfig {
            token: None,
            helper_command: Vec::new(),
            mule_credentials: None,
        };
        assert!(matches!(
            provider_from_config(&config),
            Err(AuthError::NoSource)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_output_is_trimmed() {
        let helper = HelperCommand::new("echo", vec!["  ya29.token  ".to_string()]);
        assert_eq!(helper.access_token().await.unwrap(), "ya29.token");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_failure_reports_exit_code() {
        let helper = HelperCommand::new("false", Vec::new());
        let err = helper.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::HelperFailed { code: Some(1), .. }));
    }

    #[test]
    fn test_install_mule_credentials() {
        let home = tempfile::tempdir().unwrap();
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(b"{\"type\": \"authorized_user\"}");
        let wrapped = format!("{}\n{}", &encoded[..10], &encoded[10..]);
        let path = install_mule_credentials(&wrapped, home.path()).unwrap();
        assert!(path.ends_with(".config/gcloud/application_default_credentials.json"));
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "{\"type\": \"authorized_user\"}"
        );
    }

    #[test]
    fn test_install_rejects_garbage() {
        let home = tempfile::tempdir().unwrap();
        let err = install_mule_credentials("not base64!!", home.path()).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }
}
