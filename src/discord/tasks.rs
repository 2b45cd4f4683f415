// Background loops spawned once the gateway is ready: the bump reminder
// sweep, the birthday check at local midnight, the daily fact post and
// the activity sampler.

use crate::core::activity::ActivityService;
use crate::core::birthdays::{
    age_on, congratulation_channel, next_local_midnight, BirthdayService, BIRTHDAY_TZ,
};
use crate::core::bumps::BumpService;
use crate::core::facts::{next_fact_time, FactService};
use crate::core::settings::{ChannelKind, SettingsService};
use crate::infra::activity::SqliteActivityStore;
use crate::infra::birthdays::SqliteBirthdayStore;
use crate::infra::bumps::SqliteBumpStore;
use crate::infra::facts::SqliteFactStore;
use crate::infra::settings::SqliteSettingsStore;
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::sleep;

const BUMP_SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(1);
const ACTIVITY_SAMPLE_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);

/// Sweep bump states and deliver at most one reminder per cooldown window.
pub fn spawn_bump_reminder_loop(
    http: Arc<serenity::Http>,
    bumps: Arc<BumpService<SqliteBumpStore>>,
    settings: Arc<SettingsService<SqliteSettingsStore>>,
) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_bump_sweep(&http, &bumps, &settings).await {
                tracing::warn!("Bump reminder sweep failed: {e}");
            }
            sleep(BUMP_SWEEP_INTERVAL).await;
        }
    });
}

async fn run_bump_sweep(
    http: &serenity::Http,
    bumps: &BumpService<SqliteBumpStore>,
    settings: &SettingsService<SqliteSettingsStore>,
) -> anyhow::Result<()> {
    let due = bumps.guilds_due_for_reminder(Utc::now()).await?;
    if due.is_empty() {
        return Ok(());
    }

    let targets = settings.bump_reminder_targets().await?;
    for guild_id in due {
        let Some(target) = targets.iter().find(|t| t.guild_id == guild_id) else {
            // No reminder channel configured: mark the window as handled so
            // the sweep doesn't retry it forever.
            bumps.confirm_reminder_sent(guild_id).await?;
            continue;
        };

        let message = match target.bumper_role {
            Some(role) => format!("<@&{role}> The server can be bumped again! `/bump`"),
            None => "The server can be bumped again! `/bump`".to_string(),
        };

        match serenity::ChannelId::new(target.channel_id)
            .say(http, message)
            .await
        {
            Ok(_) => {
                bumps.confirm_reminder_sent(guild_id).await?;
                tracing::info!(guild_id, "Bump reminder sent");
            }
            Err(e) => tracing::warn!(guild_id, "Failed to send bump reminder: {e}"),
        }
    }
    Ok(())
}

/// Congratulate birthdays once per local day, aligned to midnight in the
/// configured civil timezone. The check also runs at startup so restarts
/// around midnight don't skip a day.
pub fn spawn_birthday_loop(
    http: Arc<serenity::Http>,
    birthdays: Arc<BirthdayService<SqliteBirthdayStore>>,
    settings: Arc<SettingsService<SqliteSettingsStore>>,
) {
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_birthday_check(&http, &birthdays, &settings).await {
                tracing::warn!("Birthday check failed: {e}");
            }

            let next = next_local_midnight(Utc::now());
            let wait = (next - Utc::now()).to_std().unwrap_or(StdDuration::from_secs(60));
            sleep(wait).await;
        }
    });
}

async fn run_birthday_check(
    http: &serenity::Http,
    birthdays: &BirthdayService<SqliteBirthdayStore>,
    settings: &SettingsService<SqliteSettingsStore>,
) -> anyhow::Result<()> {
    let today = Utc::now().with_timezone(&BIRTHDAY_TZ).date_naive();
    let due = birthdays.due_today(today).await?;

    for record in due {
        let guild_settings = settings.settings(record.guild_id).await?;

        // Members who left since registering keep their record but get no
        // dangling mention. The record stays unmarked in case they return.
        let member_present = http
            .get_member(
                serenity::GuildId::new(record.guild_id),
                serenity::UserId::new(record.user_id),
            )
            .await
            .is_ok();
        let Some(channel) =
            congratulation_channel(guild_settings.channel(ChannelKind::Birthday), member_present)
        else {
            continue;
        };

        let message = format!(
            "Happy birthday, <@{}>! 🎂 All the best for your {}th!",
            record.user_id,
            age_on(record.date, today)
        );
        match serenity::ChannelId::new(channel).say(http, message).await {
            Ok(_) => {
                birthdays
                    .mark_congratulated(record.guild_id, record.user_id, today)
                    .await?;
            }
            Err(e) => tracing::warn!(
                guild_id = record.guild_id,
                "Failed to send birthday message: {e}"
            ),
        }
    }
    Ok(())
}

/// Post the next fact from the rotation at the fixed daily time, to every
/// guild that configured a fact channel.
pub fn spawn_fact_loop(
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
    facts: Arc<FactService<SqliteFactStore>>,
    settings: Arc<SettingsService<SqliteSettingsStore>>,
) {
    tokio::spawn(async move {
        loop {
            let next = next_fact_time(Utc::now());
            let wait = (next - Utc::now()).to_std().unwrap_or(StdDuration::from_secs(60));
            sleep(wait).await;

            if let Err(e) = run_fact_post(&http, &cache, &facts, &settings).await {
                tracing::warn!("Fact post failed: {e}");
            }
        }
    });
}

async fn run_fact_post(
    http: &serenity::Http,
    cache: &serenity::Cache,
    facts: &FactService<SqliteFactStore>,
    settings: &SettingsService<SqliteSettingsStore>,
) -> anyhow::Result<()> {
    let Some(fact) = facts.take_next(Utc::now()).await? else {
        tracing::debug!("Fact rotation is empty");
        return Ok(());
    };

    let guild_ids: Vec<u64> = cache.guilds().iter().map(|g| g.get()).collect();
    for guild_id in guild_ids {
        let guild_settings = settings.settings(guild_id).await?;
        let Some(channel) = guild_settings.channel(ChannelKind::Fact) else {
            continue;
        };
        if let Err(e) = serenity::ChannelId::new(channel)
            .say(http, format!("💡 Did you know? {}", fact.text))
            .await
        {
            tracing::warn!(guild_id, "Failed to post fact: {e}");
        }
    }
    Ok(())
}

/// Sample online and total member counts into the peak tracker.
pub fn spawn_activity_sampler(
    cache: Arc<serenity::Cache>,
    activity: Arc<ActivityService<SqliteActivityStore>>,
) {
    tokio::spawn(async move {
        loop {
            let samples: Vec<(u64, u32, u32)> = cache
                .guilds()
                .iter()
                .filter_map(|guild_id| {
                    cache.guild(*guild_id).map(|g| {
                        (
                            guild_id.get(),
                            g.presences.len() as u32,
                            g.member_count as u32,
                        )
                    })
                })
                .collect();

            for (guild_id, active, members) in samples {
                if let Err(e) = activity.sample_active_users(guild_id, active).await {
                    tracing::error!("Failed to sample active users: {e}");
                }
                if let Err(e) = activity.sample_member_count(guild_id, members).await {
                    tracing::error!("Failed to sample member count: {e}");
                }
            }

            sleep(ACTIVITY_SAMPLE_INTERVAL).await;
        }
    });
}
