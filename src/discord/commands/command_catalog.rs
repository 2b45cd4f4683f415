// Discord commands module.
// Each feature gets its own command file.

pub mod leveling;

pub mod bumps;

pub mod birthdays;

pub mod moderation;

pub mod quiz;

pub mod custom;

pub mod activity;

pub mod posts;

pub mod setup;
