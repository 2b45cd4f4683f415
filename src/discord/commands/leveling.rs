// Discord commands for the leveling system.
//
// This layer is THIN - no business logic, just translation between
// Discord types and the core service.

use crate::core::leveling::messages_to_next_level;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show your current level and message count.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn rank(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    if target_user.bot {
        ctx.say("Bots don't have a rank.").await?;
        return Ok(());
    }

    let Some(progress) = ctx
        .data()
        .leveling
        .member_progress(guild_id, target_user.id.get())
        .await?
    else {
        ctx.say(format!("{} hasn't written any messages yet.", target_user.name))
            .await?;
        return Ok(());
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("Rank of {}", target_user.name))
        .color(0x00ff00)
        .thumbnail(target_user.face())
        .field("Level", format!("**{}**", progress.level), true)
        .field("Messages", format!("**{}**", progress.counter), true)
        .field(
            "Progress",
            format!(
                "{}\n{} messages to next level",
                build_progress_bar(progress.progress, 15),
                messages_to_next_level(progress.counter)
            ),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the most active members of this server.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let top = ctx.data().leveling.leaderboard(guild_id, 10).await?;
    if top.is_empty() {
        ctx.say("Nobody has written anything yet.").await?;
        return Ok(());
    }

    let mut description = String::new();
    for (i, member) in top.iter().enumerate() {
        let name = if member.username.is_empty() {
            format!("<@{}>", member.user_id)
        } else {
            member.username.clone()
        };
        description.push_str(&format!(
            "**{}.** {} - level {} ({} messages)\n",
            i + 1,
            name,
            member.level,
            member.counter
        ));
    }

    let embed = serenity::CreateEmbed::new()
        .title("Leaderboard")
        .color(0x00ff00)
        .description(description);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Render a text progress bar for a fraction in [0, 1].
pub fn build_progress_bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}
