// The core module contains all business logic.
// Each feature gets its own submodule with a service generic over a store
// trait, so everything here is testable without Discord or a database.

#[path = "leveling/leveling_service.rs"]
pub mod leveling;

#[path = "bumps/bump_service.rs"]
pub mod bumps;

#[path = "birthdays/birthday_service.rs"]
pub mod birthdays;

#[path = "moderation/moderation_service.rs"]
pub mod moderation;

#[path = "quiz/quiz_service.rs"]
pub mod quiz;

#[path = "custom_commands/custom_command_service.rs"]
pub mod custom_commands;

#[path = "settings/settings_service.rs"]
pub mod settings;

#[path = "activity/activity_service.rs"]
pub mod activity;

#[path = "posts/post_service.rs"]
pub mod posts;

#[path = "facts/fact_service.rs"]
pub mod facts;
