use crate::push::credentials::{CredentialError, FreshToken, TokenSource};
use anyhow::Context;
use async_trait::async_trait;
use jwt_simple::prelude::{Claims, Duration as JwtDuration, RS256KeyPair, RSAKeyPairLike};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: u64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The parts of a Google service account key file the push stack needs.
#[derive(Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: Secret<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub fn from_json(raw: &str) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| CredentialError::Configuration(format!("invalid key file: {}", e)))?;
        for (field, value) in [
            ("project_id", &key.project_id),
            ("client_email", &key.client_email),
            ("private_key", key.private_key.expose_secret()),
        ] {
            if value.trim().is_empty() {
                return Err(CredentialError::Configuration(format!(
                    "`{}` is empty in the key file",
                    field
                )));
            }
        }
        Ok(key)
    }

    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CredentialError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}

#[derive(Serialize, Deserialize)]
pub struct ScopeClaim {
    pub scope: String,
}

/// Builds the RS256-signed assertion presented to the token endpoint.
pub struct AssertionSigner {
    key_pair: RS256KeyPair,
    client_email: String,
    audience: String,
}

impl AssertionSigner {
    pub fn new(key: &ServiceAccountKey, audience: &str) -> Result<Self, CredentialError> {
        // Key files written by hand sometimes carry literal `\n` sequences.
        let pem = key.private_key.expose_secret().replace("\\n", "\n");
        let key_pair = RS256KeyPair::from_pem(&pem).map_err(|e| {
            CredentialError::Configuration(format!("private key is not a usable RSA key: {}", e))
        })?;
        Ok(Self {
            key_pair,
            client_email: key.client_email.clone(),
            audience: audience.to_string(),
        })
    }

    pub fn sign(&self) -> Result<String, CredentialError> {
        let claims = Claims::with_custom_claims(
            ScopeClaim {
                scope: MESSAGING_SCOPE.to_string(),
            },
            JwtDuration::from_secs(ASSERTION_LIFETIME_SECONDS),
        )
        .with_issuer(&self.client_email)
        .with_audience(&self.audience);
        self.key_pair.sign(claims).map_err(CredentialError::Signing)
    }

    #[cfg(test)]
    fn public_key(&self) -> jwt_simple::prelude::RS256PublicKey {
        self.key_pair.public_key()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Trades a signed assertion for an access token.
pub struct OAuthExchange {
    http_client: reqwest::Client,
    token_uri: String,
}

impl OAuthExchange {
    pub fn new(http_client: reqwest::Client, token_uri: String) -> Self {
        Self {
            http_client,
            token_uri,
        }
    }

    #[tracing::instrument(name = "Exchange assertion for access token", skip(self, assertion), fields(token_uri = %self.token_uri))]
    pub async fn exchange(&self, assertion: &str) -> Result<FreshToken, CredentialError> {
        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion)])
            .send()
            .await
            .context("Failed to reach the token endpoint")
            .map_err(CredentialError::Exchange)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Exchange(anyhow::anyhow!(
                "token endpoint answered {}: {}",
                status,
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("Token endpoint returned a malformed body")
            .map_err(CredentialError::Exchange)?;
        if token.access_token.is_empty() {
            return Err(CredentialError::Exchange(anyhow::anyhow!(
                "token endpoint returned an empty access token"
            )));
        }
        Ok(FreshToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

/// Production `TokenSource`: sign, then exchange.
pub struct ServiceAccountTokenSource {
    signer: AssertionSigner,
    exchange: OAuthExchange,
}

impl ServiceAccountTokenSource {
    pub fn new(signer: AssertionSigner, exchange: OAuthExchange) -> Self {
        Self { signer, exchange }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn fetch(&self) -> Result<FreshToken, CredentialError> {
        let assertion = self.signer.sign()?;
        self.exchange.exchange(&assertion).await
    }
}
