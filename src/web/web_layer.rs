// Web dashboard - a small axum app that runs next to the gateway and
// shares the same service handles. Login goes through Discord OAuth2;
// sessions are signed JWT cookies.

#[path = "oauth.rs"]
pub mod oauth;

#[path = "routes.rs"]
pub mod routes;

#[path = "session.rs"]
pub mod session;

use crate::config::OauthConfig;
use crate::core::activity::ActivityService;
use crate::core::bumps::BumpService;
use crate::core::custom_commands::CustomCommandService;
use crate::core::leveling::LevelingService;
use crate::core::settings::SettingsService;
use crate::infra::activity::SqliteActivityStore;
use crate::infra::bumps::SqliteBumpStore;
use crate::infra::custom_commands::SqliteCommandStore;
use crate::infra::leveling::SqliteLevelStore;
use crate::infra::settings::SqliteSettingsStore;
use axum::Router;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct WebState {
    pub leveling: Arc<LevelingService<SqliteLevelStore>>,
    pub bumps: Arc<BumpService<SqliteBumpStore>>,
    pub activity: Arc<ActivityService<SqliteActivityStore>>,
    pub settings: Arc<SettingsService<SqliteSettingsStore>>,
    pub custom_commands: Arc<CustomCommandService<SqliteCommandStore>>,
    pub cache: Arc<serenity::Cache>,
    pub oauth: oauth::OauthClient,
    pub sessions: session::SessionKeys,
    /// Outstanding OAuth state nonces, consumed on callback.
    pub login_nonces: Arc<DashMap<String, ()>>,
}

impl WebState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        leveling: Arc<LevelingService<SqliteLevelStore>>,
        bumps: Arc<BumpService<SqliteBumpStore>>,
        activity: Arc<ActivityService<SqliteActivityStore>>,
        settings: Arc<SettingsService<SqliteSettingsStore>>,
        custom_commands: Arc<CustomCommandService<SqliteCommandStore>>,
        cache: Arc<serenity::Cache>,
        oauth_config: OauthConfig,
        session_secret: &str,
    ) -> Self {
        Self {
            leveling,
            bumps,
            activity,
            settings,
            custom_commands,
            cache,
            oauth: oauth::OauthClient::new(oauth_config),
            sessions: session::SessionKeys::new(session_secret),
            login_nonces: Arc::new(DashMap::new()),
        }
    }
}

pub fn create_app(state: WebState) -> Router {
    routes::create_router().with_state(state)
}

/// Bind and serve the dashboard until the process exits.
pub async fn run_server(app: Router, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Dashboard listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
