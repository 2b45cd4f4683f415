// Guild configuration commands. Everything here writes through the
// settings service; reads happen wherever the feature runs.

use crate::core::settings::{ChannelKind, RoleKind};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter as _;

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum ChannelSlot {
    #[name = "Birthday announcements"]
    Birthday,
    #[name = "Sanction log"]
    Sanctions,
    #[name = "Welcome messages"]
    Welcome,
    #[name = "Bump reminders"]
    BumpReminder,
    #[name = "Daily facts"]
    Fact,
    #[name = "Dynamic voice lobby"]
    DynamicVoice,
}

impl From<ChannelSlot> for ChannelKind {
    fn from(slot: ChannelSlot) -> Self {
        match slot {
            ChannelSlot::Birthday => ChannelKind::Birthday,
            ChannelSlot::Sanctions => ChannelKind::Sanctions,
            ChannelSlot::Welcome => ChannelKind::Welcome,
            ChannelSlot::BumpReminder => ChannelKind::BumpReminder,
            ChannelSlot::Fact => ChannelKind::Fact,
            ChannelSlot::DynamicVoice => ChannelKind::DynamicVoice,
        }
    }
}

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum RoleSlot {
    #[name = "Bumper ping role"]
    Bumper,
    #[name = "Quiz reward role"]
    QuizReward,
}

impl From<RoleSlot> for RoleKind {
    fn from(slot: RoleSlot) -> Self {
        match slot {
            RoleSlot::Bumper => RoleKind::Bumper,
            RoleSlot::QuizReward => RoleKind::QuizReward,
        }
    }
}

/// Change the text command prefix for this server.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "setprefix"
)]
pub async fn set_prefix(
    ctx: Context<'_>,
    #[description = "New prefix, e.g. !"] prefix: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let prefix = prefix.trim();
    if prefix.is_empty() || prefix.len() > 5 {
        ctx.say("The prefix must be 1 to 5 characters.").await?;
        return Ok(());
    }

    ctx.data().settings.set_prefix(guild_id, prefix).await?;
    ctx.say(format!("Prefix changed to `{prefix}`.")).await?;
    Ok(())
}

/// Assign a feature channel.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "setchannel"
)]
pub async fn set_channel(
    ctx: Context<'_>,
    #[description = "Which feature"] slot: ChannelSlot,
    #[description = "Channel to use (omit to unset)"] channel: Option<serenity::Channel>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let channel_id = channel.as_ref().map(|c| c.id().get());
    ctx.data()
        .settings
        .set_channel(guild_id, slot.into(), channel_id)
        .await?;

    match channel_id {
        Some(id) => {
            ctx.say(format!("{} channel set to <#{id}>.", slot.name()))
                .await?
        }
        None => ctx.say(format!("{} channel unset.", slot.name())).await?,
    };
    Ok(())
}

/// Assign a feature role.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "setrole"
)]
pub async fn set_role(
    ctx: Context<'_>,
    #[description = "Which feature"] slot: RoleSlot,
    #[description = "Role to use (omit to unset)"] role: Option<serenity::Role>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let role_id = role.as_ref().map(|r| r.id.get());
    ctx.data()
        .settings
        .set_role(guild_id, slot.into(), role_id)
        .await?;

    match role_id {
        Some(id) => ctx.say(format!("{} set to <@&{id}>.", slot.name())).await?,
        None => ctx.say(format!("{} unset.", slot.name())).await?,
    };
    Ok(())
}

/// Show this server's configuration.
#[poise::command(slash_command, prefix_command, guild_only, rename = "settings")]
pub async fn show_settings(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let settings = ctx.data().settings.settings(guild_id).await?;
    let fmt_channel = |id: Option<u64>| {
        id.map(|id| format!("<#{id}>"))
            .unwrap_or_else(|| "not set".to_string())
    };
    let fmt_role = |id: Option<u64>| {
        id.map(|id| format!("<@&{id}>"))
            .unwrap_or_else(|| "not set".to_string())
    };

    let embed = serenity::CreateEmbed::new()
        .title("Server configuration")
        .color(0x5865f2)
        .field("Prefix", format!("`{}`", settings.effective_prefix()), true)
        .field("Birthday channel", fmt_channel(settings.birthday_channel), true)
        .field("Sanction channel", fmt_channel(settings.sanctions_channel), true)
        .field("Welcome channel", fmt_channel(settings.welcome_channel), true)
        .field(
            "Bump reminder channel",
            fmt_channel(settings.bump_reminder_channel),
            true,
        )
        .field("Fact channel", fmt_channel(settings.fact_channel), true)
        .field(
            "Dynamic voice lobby",
            fmt_channel(settings.dynamic_voice_channel),
            true,
        )
        .field("Bumper role", fmt_role(settings.bumper_role), true)
        .field("Quiz reward role", fmt_role(settings.quiz_reward_role), true);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Add a fact to the daily rotation.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "addfact"
)]
pub async fn add_fact(
    ctx: Context<'_>,
    #[description = "Fact text"] text: String,
) -> Result<(), Error> {
    use crate::core::facts::FactError;

    match ctx.data().facts.add(&text).await {
        Ok(_) => {
            let count = ctx.data().facts.count().await?;
            ctx.say(format!("Fact saved. The rotation now holds {count} facts."))
                .await?;
        }
        Err(FactError::EmptyFact) => {
            ctx.say("The fact text must not be empty.").await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
