// Guildkeeper entry point.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (SQLite stores)
// - `discord/` = Discord-specific adapters (commands, events, tasks)
// - `web/` = Optional dashboard served next to the gateway
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands, event handlers and background tasks

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "web/web_layer.rs"]
mod web;

mod config;

use crate::config::Config;
use crate::core::activity::ActivityService;
use crate::core::birthdays::BirthdayService;
use crate::core::bumps::BumpService;
use crate::core::custom_commands::CustomCommandService;
use crate::core::facts::FactService;
use crate::core::leveling::LevelingService;
use crate::core::moderation::ModerationService;
use crate::core::posts::PostService;
use crate::core::quiz::QuizService;
use crate::core::settings::SettingsService;
use crate::discord::guild_state::GuildState;
use crate::discord::{commands, events, tasks, Data};
use crate::infra::activity::SqliteActivityStore;
use crate::infra::birthdays::SqliteBirthdayStore;
use crate::infra::bumps::SqliteBumpStore;
use crate::infra::custom_commands::SqliteCommandStore;
use crate::infra::facts::SqliteFactStore;
use crate::infra::leveling::SqliteLevelStore;
use crate::infra::moderation::SqliteModerationStore;
use crate::infra::posts::SqlitePostStore;
use crate::infra::quiz::SqliteQuizStore;
use crate::infra::settings::SqliteSettingsStore;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    let discord_token = config.discord_token.clone();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = infra::db::connect(&config.database_url).await?;

    let leveling = Arc::new(LevelingService::new(
        SqliteLevelStore::new(pool.clone()).await?,
    ));
    let bumps = Arc::new(BumpService::new(SqliteBumpStore::new(pool.clone()).await?));
    let birthdays = Arc::new(BirthdayService::new(
        SqliteBirthdayStore::new(pool.clone()).await?,
    ));
    let moderation = Arc::new(ModerationService::new(
        SqliteModerationStore::new(pool.clone()).await?,
    ));
    let quiz = Arc::new(QuizService::new(SqliteQuizStore::new(pool.clone()).await?));
    let custom_commands = Arc::new(CustomCommandService::new(
        SqliteCommandStore::new(pool.clone()).await?,
    ));
    let settings = Arc::new(SettingsService::new(
        SqliteSettingsStore::new(pool.clone()).await?,
    ));
    let activity = Arc::new(ActivityService::new(
        SqliteActivityStore::new(pool.clone()).await?,
    ));
    let posts = Arc::new(PostService::new(SqlitePostStore::new(pool.clone()).await?));
    let facts = Arc::new(FactService::new(SqliteFactStore::new(pool.clone()).await?));

    let data = Data {
        leveling: Arc::clone(&leveling),
        bumps: Arc::clone(&bumps),
        birthdays: Arc::clone(&birthdays),
        moderation: Arc::clone(&moderation),
        quiz: Arc::clone(&quiz),
        custom_commands: Arc::clone(&custom_commands),
        settings: Arc::clone(&settings),
        activity: Arc::clone(&activity),
        posts: Arc::clone(&posts),
        facts: Arc::clone(&facts),
        guild_state: Arc::new(GuildState::new()),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::GUILD_VOICE_STATES
        | serenity::GatewayIntents::GUILD_PRESENCES
        | serenity::GatewayIntents::GUILD_INVITES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::leveling::rank(),
                commands::leveling::leaderboard(),
                commands::bumps::nextbump(),
                commands::bumps::topbumpers(),
                commands::birthdays::setbirthday(),
                commands::birthdays::removebirthday(),
                commands::birthdays::birthday(),
                commands::moderation::warn(),
                commands::moderation::timeout(),
                commands::moderation::ban(),
                commands::moderation::warns(),
                commands::quiz::quiz(),
                commands::quiz::quizscore(),
                commands::custom::add_command(),
                commands::custom::remove_command(),
                commands::custom::list_commands(),
                commands::activity::serverstats(),
                commands::posts::post(),
                commands::posts::pending_posts(),
                commands::posts::approve_post(),
                commands::posts::deny_post(),
                commands::posts::set_post_channels(),
                commands::setup::set_prefix(),
                commands::setup::set_channel(),
                commands::setup::set_role(),
                commands::setup::show_settings(),
                commands::setup::add_fact(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            // Every guild can pick its own prefix for text commands.
            prefix_options: poise::PrefixFrameworkOptions {
                dynamic_prefix: Some(|ctx| {
                    Box::pin(async move {
                        let Some(guild_id) = ctx.guild_id else {
                            return Ok(Some("!".to_string()));
                        };
                        match ctx.data.settings.prefix(guild_id.get()).await {
                            Ok(prefix) => Ok(Some(prefix)),
                            Err(e) => {
                                tracing::error!("Failed to load guild prefix: {e}");
                                Ok(Some("!".to_string()))
                            }
                        }
                    })
                }),
                ..Default::default()
            },
            // Hook to run after every command, feeding the usage statistics.
            post_command: |ctx| {
                Box::pin(async move {
                    if let Some(guild_id) = ctx.guild_id() {
                        let command = ctx.command().qualified_name.clone();
                        if let Err(e) = ctx
                            .data()
                            .activity
                            .log_command(guild_id.get(), &command, Utc::now())
                            .await
                        {
                            tracing::error!("Failed to log command use: {e}");
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("Connected, registering commands");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                // Seed invite snapshots so join attribution works from the
                // first member onwards.
                for guild_id in ctx.cache.guilds() {
                    events::refresh_invite_snapshot(ctx, &data, guild_id).await;
                }

                tasks::spawn_bump_reminder_loop(
                    ctx.http.clone(),
                    Arc::clone(&data.bumps),
                    Arc::clone(&data.settings),
                );
                tasks::spawn_birthday_loop(
                    ctx.http.clone(),
                    Arc::clone(&data.birthdays),
                    Arc::clone(&data.settings),
                );
                tasks::spawn_fact_loop(
                    ctx.http.clone(),
                    ctx.cache.clone(),
                    Arc::clone(&data.facts),
                    Arc::clone(&data.settings),
                );
                tasks::spawn_activity_sampler(ctx.cache.clone(), Arc::clone(&data.activity));

                // Dashboard, if configured.
                if let Some(addr) = config.web_addr.clone() {
                    let oauth = config
                        .oauth
                        .clone()
                        .expect("checked during config loading");
                    let state = web::WebState::new(
                        Arc::clone(&data.leveling),
                        Arc::clone(&data.bumps),
                        Arc::clone(&data.activity),
                        Arc::clone(&data.settings),
                        Arc::clone(&data.custom_commands),
                        ctx.cache.clone(),
                        oauth,
                        &config.session_secret,
                    );
                    tokio::spawn(async move {
                        let app = web::create_app(state);
                        if let Err(e) = web::run_server(app, &addr).await {
                            tracing::error!("Dashboard server exited: {e}");
                        }
                    });
                }

                tracing::info!("Ready");
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}
