// Discord commands for guild activity statistics.

use crate::discord::{Context, Error};
use chrono::{Duration, Utc};
use poise::serenity_prelude as serenity;

/// Show this server's activity statistics.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn serverstats(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let now = Utc::now();

    let peaks = ctx.data().activity.peaks(guild_id).await?;
    let top_channels = ctx
        .data()
        .activity
        .top_channels(guild_id, now - Duration::days(7), 5)
        .await?;
    let top_commands = ctx
        .data()
        .activity
        .top_commands(guild_id, now - Duration::days(7), 5)
        .await?;

    let channels_text = if top_channels.is_empty() {
        "No messages this week.".to_string()
    } else {
        top_channels
            .iter()
            .map(|c| format!("<#{}>: {} messages", c.channel_id, c.messages))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let commands_text = if top_commands.is_empty() {
        "No commands this week.".to_string()
    } else {
        top_commands
            .iter()
            .map(|c| format!("`{}`: {} uses", c.command, c.uses))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title("Server statistics")
        .color(0x00bfff)
        .field(
            "Peak online members",
            peaks.max_active_users.to_string(),
            true,
        )
        .field("Peak member count", peaks.max_members.to_string(), true)
        .field("Busiest channels (7 days)", channels_text, false)
        .field("Most used commands (7 days)", commands_text, false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
