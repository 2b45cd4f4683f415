// Discord layer - commands, event handlers and background tasks.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "events.rs"]
pub mod events;

#[path = "guild_state.rs"]
pub mod guild_state;

#[path = "tasks.rs"]
pub mod tasks;

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
use guild_state::GuildState;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data shared across all commands, event handlers and the dashboard.
pub struct Data {
    pub leveling: Arc<LevelingService<SqliteLevelStore>>,
    pub bumps: Arc<BumpService<SqliteBumpStore>>,
    pub birthdays: Arc<BirthdayService<SqliteBirthdayStore>>,
    pub moderation: Arc<ModerationService<SqliteModerationStore>>,
    pub quiz: Arc<QuizService<SqliteQuizStore>>,
    pub custom_commands: Arc<CustomCommandService<SqliteCommandStore>>,
    pub settings: Arc<SettingsService<SqliteSettingsStore>>,
    pub activity: Arc<ActivityService<SqliteActivityStore>>,
    pub posts: Arc<PostService<SqlitePostStore>>,
    pub facts: Arc<FactService<SqliteFactStore>>,
    pub guild_state: Arc<GuildState>,
}
