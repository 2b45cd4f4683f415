// Discord OAuth2 client for the dashboard login flow. Token exchange and
// the identity lookup retry transient failures a few times with a fixed
// backoff before giving up.

use crate::config::OauthConfig;
use serde::Deserialize;
use std::time::Duration;

const AUTHORIZE_URL: &str = "https://discord.com/api/oauth2/authorize";
const TOKEN_URL: &str = "https://discord.com/api/oauth2/token";
const IDENTITY_URL: &str = "https://discord.com/api/users/@me";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordIdentity {
    pub id: String,
    pub username: String,
}

impl DiscordIdentity {
    pub fn user_id(&self) -> anyhow::Result<u64> {
        self.id
            .parse()
            .map_err(|_| anyhow::anyhow!("Discord returned a non-numeric user id"))
    }
}

#[derive(Clone)]
pub struct OauthClient {
    config: OauthConfig,
    http: reqwest::Client,
}

impl OauthClient {
    pub fn new(config: OauthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// The URL the browser is sent to for consent.
    pub fn authorize_url(&self, state: &str) -> anyhow::Result<String> {
        let url = reqwest::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "identify"),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    /// Exchange the callback code and resolve who just logged in.
    pub async fn identify(&self, code: &str) -> anyhow::Result<DiscordIdentity> {
        let token = self.exchange_code(code).await?;
        self.fetch_identity(&token).await
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
        ];

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.http.post(TOKEN_URL).form(&params).send().await {
                Ok(response) if response.status().is_success() => {
                    let token: TokenResponse = response.json().await?;
                    return Ok(token.access_token);
                }
                Ok(response) if response.status().is_client_error() => {
                    // A rejected code never becomes valid; don't retry.
                    anyhow::bail!("OAuth code exchange rejected: {}", response.status());
                }
                Ok(response) => {
                    last_error = Some(anyhow::anyhow!(
                        "OAuth token endpoint returned {}",
                        response.status()
                    ));
                }
                Err(e) => last_error = Some(e.into()),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("OAuth code exchange failed")))
    }

    async fn fetch_identity(&self, access_token: &str) -> anyhow::Result<DiscordIdentity> {
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .http
                .get(IDENTITY_URL)
                .bearer_auth(access_token)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json().await?);
                }
                Ok(response) => {
                    last_error = Some(anyhow::anyhow!(
                        "Identity endpoint returned {}",
                        response.status()
                    ));
                }
                Err(e) => last_error = Some(e.into()),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Identity lookup failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OauthClient {
        OauthClient::new(OauthConfig {
            client_id: "12345".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://localhost:8080/login/callback".to_string(),
        })
    }

    #[test]
    fn authorize_url_carries_all_parameters() {
        let url = client().authorize_url("nonce123").unwrap();
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=12345"));
        assert!(url.contains("state=nonce123"));
        assert!(url.contains("scope=identify"));
        assert!(url.contains("response_type=code"));
        // The redirect URI must be percent-encoded.
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Flogin%2Fcallback"));
    }

    #[test]
    fn identity_ids_parse_to_u64() {
        let identity = DiscordIdentity {
            id: "302050872383242240".to_string(),
            username: "tester".to_string(),
        };
        assert_eq!(identity.user_id().unwrap(), 302050872383242240);

        let bad = DiscordIdentity {
            id: "not-a-number".to_string(),
            username: "tester".to_string(),
        };
        assert!(bad.user_id().is_err());
    }
}
