// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "db.rs"]
pub mod db;

#[path = "leveling/sqlite_store.rs"]
pub mod leveling;

#[path = "bumps/sqlite_store.rs"]
pub mod bumps;

#[path = "birthdays/sqlite_store.rs"]
pub mod birthdays;

#[path = "moderation/sqlite_store.rs"]
pub mod moderation;

#[path = "quiz/sqlite_store.rs"]
pub mod quiz;

#[path = "custom_commands/sqlite_store.rs"]
pub mod custom_commands;

#[path = "settings/sqlite_store.rs"]
pub mod settings;

#[path = "activity/sqlite_store.rs"]
pub mod activity;

#[path = "posts/sqlite_store.rs"]
pub mod posts;

#[path = "facts/sqlite_store.rs"]
pub mod facts;
