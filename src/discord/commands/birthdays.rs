// Discord commands for birthday management.

use crate::core::birthdays::{age_on, parse_birthday, BirthdayError};
use crate::discord::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;

/// Save your birthday so the server can congratulate you.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn setbirthday(
    ctx: Context<'_>,
    #[description = "Your birthday as DD.MM.YYYY"] date: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let date = match parse_birthday(&date) {
        Ok(date) => date,
        Err(BirthdayError::InvalidDate) => {
            ctx.say("That doesn't look like a date. Use the format `DD.MM.YYYY`, e.g. `24.12.1998`.")
                .await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    ctx.data()
        .birthdays
        .set_birthday(guild_id, ctx.author().id.get(), date)
        .await?;

    ctx.say(format!("Saved! Your birthday is set to {}.", date.format("%d.%m.%Y")))
        .await?;
    Ok(())
}

/// Remove your saved birthday.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn removebirthday(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let removed = ctx
        .data()
        .birthdays
        .remove_birthday(guild_id, ctx.author().id.get())
        .await?;

    if removed {
        ctx.say("Your birthday has been removed.").await?;
    } else {
        ctx.say("You don't have a birthday saved.").await?;
    }
    Ok(())
}

/// Show a member's saved birthday.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn birthday(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let Some(record) = ctx
        .data()
        .birthdays
        .get_birthday(guild_id, target_user.id.get())
        .await?
    else {
        ctx.say(format!("{} has no birthday saved.", target_user.name))
            .await?;
        return Ok(());
    };

    let today = Utc::now().date_naive();
    ctx.say(format!(
        "{} was born on {} (turns {} this year).",
        target_user.name,
        record.date.format("%d.%m.%Y"),
        age_on(record.date, today)
    ))
    .await?;
    Ok(())
}
