//! Access-token providers.
//!
//! Nexus authenticates every HTTP and websocket request with the
//! `myqos_id` cookie. Providers only read tokens; logging in and writing
//! token files is left to other tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Environment variable read by [`EnvTokenProvider::nexus`].
pub const TOKEN_ENV_VAR: &str = "NEXUS_TOKEN";

/// Token file location relative to the home directory.
pub const TOKEN_FILE: &str = ".qnx/auth/access_token";

/// Cookie carrying the access token.
pub const AUTH_COOKIE: &str = "myqos_id";

/// Source of access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token.
    async fn get_token(&self) -> ClientResult<String>;

    /// Check if a token is available without fetching it.
    fn has_valid_token(&self) -> bool;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> ClientResult<String> {
        Ok(self.token.clone())
    }

    fn has_valid_token(&self) -> bool {
        !self.token.is_empty()
    }
}

/// Environment variable token provider.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    env_var: String,
}

impl EnvTokenProvider {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }

    /// Provider for `NEXUS_TOKEN`.
    pub fn nexus() -> Self {
        Self::new(TOKEN_ENV_VAR)
    }
}

#[async_trait]
impl TokenProvider for EnvTokenProvider {
    async fn get_token(&self) -> ClientResult<String> {
        match std::env::var(&self.env_var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(ClientError::MissingToken),
        }
    }

    fn has_valid_token(&self) -> bool {
        std::env::var(&self.env_var).is_ok_and(|t| !t.trim().is_empty())
    }
}

/// Reads the token stored by a previous login.
#[derive(Debug, Clone)]
pub struct FileTokenProvider {
    path: PathBuf,
}

impl FileTokenProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Provider for `~/.qnx/auth/access_token`. `None` without a home
    /// directory.
    pub fn default_location() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(TOKEN_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenProvider for FileTokenProvider {
    async fn get_token(&self) -> ClientResult<String> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            debug!(path = %self.path.display(), error = %e, "Token file not readable");
            ClientError::MissingToken
        })?;
        let token = contents.trim();
        if token.is_empty() {
            return Err(ClientError::MissingToken);
        }
        Ok(token.to_string())
    }

    fn has_valid_token(&self) -> bool {
        self.path.is_file()
    }
}

/// Tries each provider in order and returns the first token found.
#[derive(Clone, Default)]
pub struct ChainTokenProvider {
    providers: Vec<Arc<dyn TokenProvider>>,
}

impl ChainTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// `NEXUS_TOKEN`, then the token file.
    pub fn standard() -> Self {
        let chain = Self::new().with(Arc::new(EnvTokenProvider::nexus()));
        match FileTokenProvider::default_location() {
            Some(file) => chain.with(Arc::new(file)),
            None => chain,
        }
    }
}

impl std::fmt::Debug for ChainTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainTokenProvider")
            .field("providers", &self.providers.len())
            .finish()
    }
}

#[async_trait]
impl TokenProvider for ChainTokenProvider {
    async fn get_token(&self) -> ClientResult<String> {
        for provider in &self.providers {
            match provider.get_token().await {
                Ok(token) => return Ok(token),
                Err(ClientError::MissingToken) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ClientError::MissingToken)
    }

    fn has_valid_token(&self) -> bool {
        self.providers.iter().any(|p| p.has_valid_token())
    }
}
