/// Environment variable consulted when no token is configured.
pub const ACCESS_TOKEN_ENV: &str = "HUB_ACCESS_TOKEN";

/// Identity gate in front of every API request.
pub trait IdentityProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;
    /// Bearer token attached to requests, if signed in.
    fn access_token(&self) -> Option<String>;
}

/// Fixed bearer token handed out by the identity service beforehand.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        Self { token }
    }

    /// Uses `configured` when present, otherwise `HUB_ACCESS_TOKEN`.
    pub fn from_env_or(configured: Option<String>) -> Self {
        let from_config = Self::new(configured);
        if from_config.is_authenticated() {
            return from_config;
        }
        Self::new(std::env::var(ACCESS_TOKEN_ENV).ok())
    }
}

impl IdentityProvider for StaticTokenProvider {
    fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
