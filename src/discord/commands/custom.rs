// Admin commands for managing custom text commands. Dispatch of the
// commands themselves happens in the message event handler.

use crate::core::custom_commands::CustomCommandError;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Add or overwrite a custom command. Use {user} in the response to
/// mention the invoker.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "addcommand"
)]
pub async fn add_command(
    ctx: Context<'_>,
    #[description = "Command name (alphanumeric)"] name: String,
    #[description = "Response text"] response: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx.data().custom_commands.add(guild_id, &name, &response).await {
        Ok(()) => {
            ctx.say(format!("Custom command `{}` saved.", name.to_lowercase()))
                .await?;
        }
        Err(CustomCommandError::InvalidName) => {
            ctx.say("Command names must be alphanumeric, e.g. `welcome2`.")
                .await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Remove a custom command.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "removecommand"
)]
pub async fn remove_command(
    ctx: Context<'_>,
    #[description = "Command name"] name: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    if ctx.data().custom_commands.remove(guild_id, &name).await? {
        ctx.say(format!("Custom command `{}` removed.", name.to_lowercase()))
            .await?;
    } else {
        ctx.say(format!("There is no custom command named `{}`.", name.to_lowercase()))
            .await?;
    }
    Ok(())
}

/// List this server's custom commands.
#[poise::command(slash_command, prefix_command, guild_only, rename = "commands")]
pub async fn list_commands(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let commands = ctx.data().custom_commands.list(guild_id).await?;
    if commands.is_empty() {
        ctx.say("This server has no custom commands yet.").await?;
        return Ok(());
    }

    let prefix = ctx.data().settings.prefix(guild_id).await?;
    let description = commands
        .iter()
        .map(|c| format!("`{}{}`", prefix, c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let embed = serenity::CreateEmbed::new()
        .title("Custom commands")
        .color(0x5865f2)
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
