//! OAuth2 client-credentials broker and token management.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::{basic::BasicClient, ClientId, ClientSecret, Scope, TokenResponse, TokenUrl};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use sharehub_common::{Error, Result};

/// OAuth2 token endpoint of the identity provider.
pub const DEFAULT_TOKEN_URL: &str = "https://auth.globus.org/v2/oauth2/token";

/// Scope for directory and access-rule operations.
pub const TRANSFER_SCOPE: &str = "urn:globus:auth:scope:transfer.api.globus.org:all";
/// Scope for identity lookups.
pub const VIEW_IDENTITIES_SCOPE: &str = "urn:globus:auth:scope:auth.globus.org:view_identities";

/// Group of scopes an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeFamily {
    /// mkdir, ls, access rules, delete tasks.
    Transfer,
    /// Username to principal resolution.
    Identities,
    /// HTTPS file retrieval from the collection.
    CollectionData,
}

/// Bearer token that zeroizes on drop and never prints.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// `Bearer <token>` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

/// Access token with expiration tracking.
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: AccessToken,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Check if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        // Consider expired if less than 5 minutes remaining
        self.expires_at < Utc::now() + Duration::minutes(5)
    }
}

/// Client credentials and scope settings for the broker.
#[derive(Clone)]
pub struct BrokerConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    /// Collection whose data-access scope file retrieval needs.
    pub collection_id: String,
    /// Reuse tokens per scope family until they near expiry.
    pub cache_tokens: bool,
    /// Per-request timeout for token exchanges.
    pub timeout: std::time::Duration,
}

impl BrokerConfig {
    /// Scopes requested for a family.
    pub fn scopes(&self, family: ScopeFamily) -> Vec<String> {
        match family {
            ScopeFamily::Transfer => vec![TRANSFER_SCOPE.to_string()],
            ScopeFamily::Identities => vec![VIEW_IDENTITIES_SCOPE.to_string()],
            ScopeFamily::CollectionData => vec![format!(
                "https://auth.globus.org/scopes/{}/https",
                self.collection_id
            )],
        }
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("token_url", &self.token_url)
            .field("collection_id", &self.collection_id)
            .field("cache_tokens", &self.cache_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Source of bearer tokens for remote calls.
#[async_trait]
pub trait CredentialBroker: Send + Sync {
    /// Get a token carrying the scopes of `family`.
    ///
    /// # Errors
    /// - [`Error::Authentication`] when the exchange fails
    async fn authorize(&self, family: ScopeFamily) -> Result<AccessToken>;
}

/// Broker exchanging client credentials through the OAuth2 token endpoint.
///
/// Without caching every call performs a fresh exchange. With caching enabled,
/// tokens are kept per scope family and replaced once they enter the expiry
/// buffer.
pub struct OAuthBroker {
    config: BrokerConfig,
    token_url: TokenUrl,
    http: oauth2::reqwest::Client,
    cache: Option<RwLock<HashMap<ScopeFamily, Tokens>>>,
}

impl OAuthBroker {
    /// Create a new broker.
    ///
    /// # Errors
    /// - Invalid token URL
    /// - HTTP client construction failure
    pub fn new(config: BrokerConfig) -> Result<Self> {
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| Error::Config(format!("Invalid token URL: {}", e)))?;

        // Token requests must not follow redirects.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let cache = config.cache_tokens.then(|| RwLock::new(HashMap::new()));

        Ok(Self {
            config,
            token_url,
            http,
            cache,
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Perform one client-credentials exchange.
    ///
    /// # Errors
    /// - Rejected credentials
    /// - Network errors
    pub async fn exchange(&self, family: ScopeFamily) -> Result<Tokens> {
        let client = BasicClient::new(ClientId::new(self.config.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.config.client_secret.clone()))
            .set_token_uri(self.token_url.clone());

        tracing::debug!(?family, "Requesting client-credentials token");

        let token_result = client
            .exchange_client_credentials()
            .add_scopes(self.config.scopes(family).into_iter().map(Scope::new))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        let expires_in = token_result
            .expires_in()
            .unwrap_or_else(|| std::time::Duration::from_secs(3600));

        let expires_at =
            Utc::now() + Duration::from_std(expires_in).unwrap_or_else(|_| Duration::hours(1));

        Ok(Tokens {
            access_token: AccessToken::new(token_result.access_token().secret().clone()),
            expires_at,
        })
    }
}

#[async_trait]
impl CredentialBroker for OAuthBroker {
    async fn authorize(&self, family: ScopeFamily) -> Result<AccessToken> {
        let Some(cache) = &self.cache else {
            return Ok(self.exchange(family).await?.access_token);
        };

        {
            let tokens = cache.read().await;
            if let Some(cached) = tokens.get(&family).filter(|t| !t.is_expired()) {
                return Ok(cached.access_token.clone());
            }
        }

        let mut tokens = cache.write().await;

        // Double-check after acquiring write lock
        if let Some(cached) = tokens.get(&family).filter(|t| !t.is_expired()) {
            return Ok(cached.access_token.clone());
        }

        tracing::info!(?family, "Refreshing cached access token");

        let fresh = self.exchange(family).await?;
        let token = fresh.access_token.clone();
        tokens.insert(family, fresh);

        Ok(token)
    }
}

/// Broker that hands out one fixed token for every family.
///
/// Used with the in-memory adapter, where tokens are never inspected.
#[derive(Debug, Clone)]
pub struct StaticBroker {
    token: AccessToken,
}

impl StaticBroker {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl CredentialBroker for StaticBroker {
    async fn authorize(&self, _family: ScopeFamily) -> Result<AccessToken> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(cache_tokens: bool) -> BrokerConfig {
        BrokerConfig {
            client_id: "test_id".to_string(),
            client_secret: "test_secret".to_string(),
            // Nothing listens here; exchanges fail fast.
            token_url: "http://127.0.0.1:9/token".to_string(),
            collection_id: "2f1e-coll".to_string(),
            cache_tokens,
            timeout: std::time::Duration::from_secs(5),
        }
    }

    #[test]
    fn test_tokens_expiration() {
        let tokens = Tokens {
            access_token: AccessToken::new("test"),
            expires_at: Utc::now() - Duration::hours(1),
        };

        assert!(tokens.is_expired());

        let valid_tokens = Tokens {
            access_token: AccessToken::new("test"),
            expires_at: Utc::now() + Duration::hours(1),
        };

        assert!(!valid_tokens.is_expired());
    }

    #[test]
    fn test_tokens_near_expiration() {
        // Token expiring in 4 minutes should be considered expired (5 min buffer)
        let tokens = Tokens {
            access_token: AccessToken::new("test"),
            expires_at: Utc::now() + Duration::minutes(4),
        };

        assert!(tokens.is_expired());
    }

    #[test]
    fn test_scope_families() {
        let config = test_config(false);
        assert_eq!(config.scopes(ScopeFamily::Transfer), vec![TRANSFER_SCOPE]);
        assert_eq!(
            config.scopes(ScopeFamily::Identities),
            vec![VIEW_IDENTITIES_SCOPE]
        );
        assert_eq!(
            config.scopes(ScopeFamily::CollectionData),
            vec!["https://auth.globus.org/scopes/2f1e-coll/https"]
        );
    }

    #[test]
    fn test_secrets_are_redacted() {
        let token = AccessToken::new("very-secret");
        assert!(!format!("{:?}", token).contains("very-secret"));
        assert_eq!(token.bearer(), "Bearer very-secret");

        let config = test_config(false);
        assert!(!format!("{:?}", config).contains("test_secret"));
    }

    #[test]
    fn test_invalid_token_url() {
        let mut config = test_config(false);
        config.token_url = "not a url".to_string();
        assert!(matches!(OAuthBroker::new(config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_exchange_failure_is_authentication_error() {
        let broker = OAuthBroker::new(test_config(false)).unwrap();
        let err = broker.authorize(ScopeFamily::Transfer).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_silent_token_endpoint_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept connections and never answer.
        let holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = test_config(false);
        config.token_url = format!("http://{}/token", addr);
        config.timeout = std::time::Duration::from_millis(200);
        let broker = OAuthBroker::new(config).unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            broker.authorize(ScopeFamily::Transfer),
        )
        .await
        .expect("token exchange must give up on its own");
        assert!(matches!(result, Err(Error::Authentication(_))));

        holder.abort();
    }

    #[tokio::test]
    async fn test_cache_serves_only_fresh_tokens() {
        let broker = OAuthBroker::new(test_config(true)).unwrap();
        let cache = broker.cache.as_ref().unwrap();

        cache.write().await.insert(
            ScopeFamily::Transfer,
            Tokens {
                access_token: AccessToken::new("fresh"),
                expires_at: Utc::now() + Duration::hours(1),
            },
        );
        cache.write().await.insert(
            ScopeFamily::Identities,
            Tokens {
                access_token: AccessToken::new("stale"),
                expires_at: Utc::now() - Duration::minutes(1),
            },
        );

        let token = broker.authorize(ScopeFamily::Transfer).await.unwrap();
        assert_eq!(token.secret(), "fresh");

        // The stale entry forces an exchange, which fails against the dead endpoint.
        let err = broker.authorize(ScopeFamily::Identities).await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_static_broker() {
        let broker = StaticBroker::new("fixed");
        let token = broker.authorize(ScopeFamily::CollectionData).await.unwrap();
        assert_eq!(token.secret(), "fixed");
    }
}
