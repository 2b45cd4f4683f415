// Discord commands for Disboard bump tracking.

use crate::core::bumps::BumpAvailability;
use crate::discord::{Context, Error};
use chrono::{Duration, Utc};
use poise::serenity_prelude as serenity;

/// When the server can be bumped again.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn nextbump(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let message = match ctx.data().bumps.availability(guild_id, Utc::now()).await? {
        BumpAvailability::NeverBumped => "No bump recorded yet. Go ahead and `/bump`!".to_string(),
        BumpAvailability::Ready => "The server can be bumped right now!".to_string(),
        BumpAvailability::CoolingDown { until } => {
            format!("Next bump possible <t:{}:R>.", until.timestamp())
        }
    };

    ctx.say(message).await?;
    Ok(())
}

/// Top bumpers of this server.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn topbumpers(
    ctx: Context<'_>,
    #[description = "Only count the last 30 days"] monthly: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let monthly = monthly.unwrap_or(false);
    let tallies = if monthly {
        ctx.data()
            .bumps
            .top_bumpers_since(guild_id, Utc::now() - Duration::days(30), 3)
            .await?
    } else {
        ctx.data().bumps.top_bumpers_all_time(guild_id, 3).await?
    };

    if tallies.is_empty() {
        ctx.say("Nobody has bumped this server yet.").await?;
        return Ok(());
    }

    let mut description = String::new();
    for (i, tally) in tallies.iter().enumerate() {
        description.push_str(&format!(
            "**{}.** <@{}> - {} bumps\n",
            i + 1,
            tally.user_id,
            tally.count
        ));
    }

    let title = if monthly {
        "Top bumpers (30 days)"
    } else {
        "Top bumpers (all time)"
    };
    let embed = serenity::CreateEmbed::new()
        .title(title)
        .color(0x5865f2)
        .description(description);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
