// Discord commands for moderation. Sanctions are recorded first, then the
// platform action is applied; a failed platform action is reported but the
// log row stays, so moderators see what was attempted.

use crate::core::moderation::AUTO_TIMEOUT_MINUTES;
use crate::core::settings::ChannelKind;
use crate::discord::{Context, Error};
use chrono::{Duration, Utc};
use poise::serenity_prelude as serenity;

/// Warn a member. Two warns within 24 hours trigger an automatic timeout.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "Member to warn"] user: serenity::User,
    #[description = "Reason"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;
    let now = Utc::now();

    let outcome = ctx
        .data()
        .moderation
        .record_warn(guild_id.get(), user.id.get(), &reason, now)
        .await?;

    let mut message = format!(
        "{} has been warned ({} warn(s) in the last 24h). Reason: {}",
        user.name, outcome.recent_warns, reason
    );

    if outcome.escalate {
        let auto_reason = "Automatic timeout: repeated warns";
        match apply_timeout(ctx, guild_id, &user, AUTO_TIMEOUT_MINUTES).await {
            Ok(()) => {
                ctx.data()
                    .moderation
                    .record_timeout(
                        guild_id.get(),
                        user.id.get(),
                        AUTO_TIMEOUT_MINUTES,
                        auto_reason,
                        now,
                    )
                    .await?;
                message.push_str("\nThey were automatically timed out for 24 hours.");
            }
            Err(e) => {
                tracing::warn!("Failed to apply automatic timeout: {e}");
                message.push_str("\nAutomatic timeout could not be applied (missing permissions?).");
            }
        }
    }

    ctx.say(&message).await?;
    announce_sanction(ctx, guild_id.get(), &message).await;
    Ok(())
}

/// Time a member out for a number of minutes.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] user: serenity::User,
    #[description = "Duration in minutes"]
    #[min = 1]
    #[max = 40320]
    minutes: u32,
    #[description = "Reason"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;

    ctx.data()
        .moderation
        .record_timeout(guild_id.get(), user.id.get(), minutes, &reason, Utc::now())
        .await?;
    apply_timeout(ctx, guild_id, &user, minutes).await?;

    let message = format!(
        "{} has been timed out for {} minutes. Reason: {}",
        user.name, minutes, reason
    );
    ctx.say(&message).await?;
    announce_sanction(ctx, guild_id.get(), &message).await;
    Ok(())
}

/// Ban a member from the server.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] user: serenity::User,
    #[description = "Reason"] reason: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;

    ctx.data()
        .moderation
        .record_ban(guild_id.get(), user.id.get(), &reason, Utc::now())
        .await?;
    guild_id
        .ban_with_reason(ctx.http(), user.id, 0, &reason)
        .await?;

    let message = format!("{} has been banned. Reason: {}", user.name, reason);
    ctx.say(&message).await?;
    announce_sanction(ctx, guild_id.get(), &message).await;
    Ok(())
}

/// List a member's warns from the last 24 hours.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn warns(
    ctx: Context<'_>,
    #[description = "Member to check"] user: serenity::User,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let warns = ctx
        .data()
        .moderation
        .recent_warns(guild_id, user.id.get(), Utc::now())
        .await?;

    if warns.is_empty() {
        ctx.say(format!("{} has no recent warns.", user.name)).await?;
        return Ok(());
    }

    let mut description = String::new();
    for warn in &warns {
        description.push_str(&format!(
            "<t:{}:R>: {}\n",
            warn.at.timestamp(),
            warn.reason
        ));
    }
    let embed = serenity::CreateEmbed::new()
        .title(format!("Recent warns for {}", user.name))
        .color(0xff0000)
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

async fn apply_timeout(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    minutes: u32,
) -> Result<(), Error> {
    let until = Utc::now() + Duration::minutes(minutes as i64);
    let mut member = guild_id.member(ctx.http(), user.id).await?;
    member
        .disable_communication_until_datetime(ctx.http(), until.into())
        .await?;
    Ok(())
}

/// Mirror the sanction into the configured sanctions channel, if any.
async fn announce_sanction(ctx: Context<'_>, guild_id: u64, message: &str) {
    let settings = match ctx.data().settings.settings(guild_id).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Failed to load guild settings: {e}");
            return;
        }
    };
    let Some(channel_id) = settings.channel(ChannelKind::Sanctions) else {
        return;
    };
    if let Err(e) = serenity::ChannelId::new(channel_id)
        .say(ctx.http(), message)
        .await
    {
        tracing::warn!("Failed to post to sanctions channel: {e}");
    }
}
