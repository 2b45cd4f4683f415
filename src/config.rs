// Process configuration, loaded once at startup from the environment
// (with .env support in development).

use anyhow::Context as _;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    /// Dashboard bind address, e.g. "0.0.0.0:8080". None disables the web
    /// server entirely.
    pub web_addr: Option<String>,
    pub oauth: Option<OauthConfig>,
    pub session_secret: String,
}

#[derive(Debug, Clone)]
pub struct OauthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let discord_token = std::env::var("DISCORD_TOKEN")
            .context("Missing DISCORD_TOKEN environment variable")?;
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "data/guildkeeper.db".to_string());

        let web_addr = std::env::var("WEB_ADDR").ok();
        let oauth = match (
            std::env::var("DISCORD_CLIENT_ID").ok(),
            std::env::var("DISCORD_CLIENT_SECRET").ok(),
            std::env::var("OAUTH_REDIRECT_URL").ok(),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(OauthConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        if web_addr.is_some() && oauth.is_none() {
            anyhow::bail!(
                "WEB_ADDR is set but DISCORD_CLIENT_ID / DISCORD_CLIENT_SECRET / \
                 OAUTH_REDIRECT_URL are incomplete"
            );
        }

        let session_secret = std::env::var("SESSION_SECRET")
            .unwrap_or_else(|_| "development-secret-do-not-use".to_string());

        Ok(Self {
            discord_token,
            database_url,
            web_addr,
            oauth,
            session_secret,
        })
    }
}
