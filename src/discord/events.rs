// Event handler for non-command Discord events. Message counting, bump
// detection, custom command dispatch, welcome messages with invite
// attribution and the dynamic voice lobby all hang off the gateway here.

use crate::core::bumps::detect_successful_bump;
use crate::core::settings::ChannelKind;
use crate::discord::{Data, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            handle_message(ctx, data, new_message).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            if let Err(e) = handle_member_join(ctx, data, new_member).await {
                tracing::error!("Error handling member join: {e}");
            }
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            if let Err(e) = handle_member_remove(ctx, data, *guild_id, user).await {
                tracing::error!("Error handling member removal: {e}");
            }
        }
        serenity::FullEvent::VoiceStateUpdate { old, new } => {
            if let Err(e) = handle_voice_state(ctx, data, old.as_ref(), new).await {
                tracing::error!("Error handling voice state update: {e}");
            }
        }
        serenity::FullEvent::InviteCreate { data: invite } => {
            if let Some(guild_id) = invite.guild_id {
                refresh_invite_snapshot(ctx, data, guild_id).await;
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            refresh_invite_snapshot(ctx, data, guild.id).await;
        }
        _ => {}
    }
    Ok(())
}

async fn handle_message(ctx: &serenity::Context, data: &Data, message: &serenity::Message) {
    let Some(guild_id) = message.guild_id else {
        return;
    };
    let guild_id = guild_id.get();

    // Bot messages only matter for bump detection.
    if message.author.bot {
        let embed_texts: Vec<String> = message
            .embeds
            .iter()
            .flat_map(|e| [e.title.clone(), e.description.clone()])
            .flatten()
            .collect();
        let interaction_user = message.interaction.as_ref().map(|i| i.user.id.get());

        if let Some(bumper) = detect_successful_bump(
            message.author.id.get(),
            &message.content,
            &embed_texts,
            interaction_user,
        ) {
            tracing::info!(guild_id, bumper, "Bump detected");
            if let Err(e) = data.bumps.record_bump(guild_id, bumper, Utc::now()).await {
                tracing::error!("Failed to record bump: {e}");
            }
        }
        return;
    }

    let user_id = message.author.id.get();
    let now = Utc::now();

    // Count the message for leveling.
    match data
        .leveling
        .process_message(guild_id, user_id, &message.author.name)
        .await
    {
        Ok(progress) => {
            tracing::debug!(user_id, guild_id, counter = progress.counter, "Message counted");
        }
        Err(e) => tracing::error!("Error counting message: {e}"),
    }

    // Channel activity log.
    if let Err(e) = data
        .activity
        .log_message(guild_id, message.channel_id.get(), now)
        .await
    {
        tracing::error!("Error logging channel activity: {e}");
    }

    // Custom command dispatch.
    let prefix = match data.settings.prefix(guild_id).await {
        Ok(prefix) => prefix,
        Err(e) => {
            tracing::error!("Failed to load prefix: {e}");
            return;
        }
    };
    let mention = format!("<@{user_id}>");
    match data
        .custom_commands
        .dispatch(guild_id, &message.content, &prefix, &mention)
        .await
    {
        Ok(Some(response)) => {
            if let Err(e) = message.channel_id.say(&ctx.http, response).await {
                tracing::warn!("Failed to send custom command response: {e}");
            }
        }
        Ok(None) => {}
        Err(e) => tracing::error!("Custom command dispatch failed: {e}"),
    }
}

async fn handle_member_join(
    ctx: &serenity::Context,
    data: &Data,
    member: &serenity::Member,
) -> Result<(), Error> {
    let guild_id = member.guild_id;

    // Sample the new member count for the peak tracker.
    if let Some(count) = ctx.cache.guild(guild_id).map(|g| g.member_count) {
        if let Err(e) = data
            .activity
            .sample_member_count(guild_id.get(), count as u32)
            .await
        {
            tracing::error!("Error sampling member count: {e}");
        }
    }

    let settings = data.settings.settings(guild_id.get()).await?;
    let Some(welcome_channel) = settings.channel(ChannelKind::Welcome) else {
        // Still refresh the snapshot so later joins attribute correctly.
        refresh_invite_snapshot(ctx, data, guild_id).await;
        return Ok(());
    };

    // Diff invite uses against the snapshot to find who invited them.
    let invited_via = match guild_id.invites(&ctx.http).await {
        Ok(invites) => {
            let current: HashMap<String, u64> = invites
                .iter()
                .map(|i| (i.code.clone(), i.uses))
                .collect();
            let code = data.guild_state.diff_invites(guild_id.get(), &current);
            data.guild_state.snapshot_invites(guild_id.get(), current);
            code.and_then(|code| {
                invites
                    .iter()
                    .find(|i| i.code == code)
                    .map(|i| (i.code.clone(), i.inviter.as_ref().map(|u| u.id.get())))
            })
        }
        Err(e) => {
            tracing::warn!("Failed to fetch invites: {e}");
            None
        }
    };

    let mut welcome = format!("Welcome to the server, <@{}>!", member.user.id.get());
    match invited_via {
        Some((code, Some(inviter))) => {
            welcome.push_str(&format!(" Invited by <@{inviter}> (`{code}`)."));
        }
        Some((code, None)) => {
            welcome.push_str(&format!(" Joined via invite `{code}`."));
        }
        None => {}
    }

    serenity::ChannelId::new(welcome_channel)
        .say(&ctx.http, welcome)
        .await?;
    Ok(())
}

async fn handle_member_remove(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
    user: &serenity::User,
) -> Result<(), Error> {
    let settings = data.settings.settings(guild_id.get()).await?;
    let Some(welcome_channel) = settings.channel(ChannelKind::Welcome) else {
        return Ok(());
    };
    serenity::ChannelId::new(welcome_channel)
        .say(&ctx.http, format!("{} has left the server.", user.name))
        .await?;
    Ok(())
}

/// Dynamic voice channels: joining the configured lobby spawns a personal
/// voice channel and moves the member there; the channel is deleted once
/// it empties out.
async fn handle_voice_state(
    ctx: &serenity::Context,
    data: &Data,
    old: Option<&serenity::VoiceState>,
    new: &serenity::VoiceState,
) -> Result<(), Error> {
    let Some(guild_id) = new.guild_id else {
        return Ok(());
    };

    // Clean up an emptied temp channel first.
    if let Some(left_channel) = old.and_then(|o| o.channel_id) {
        if data.guild_state.is_temp_channel(left_channel.get())
            && channel_is_empty(ctx, guild_id, left_channel)
        {
            data.guild_state.forget_temp_channel(left_channel.get());
            if let Err(e) = left_channel.delete(&ctx.http).await {
                tracing::warn!("Failed to delete temp voice channel: {e}");
            }
        }
    }

    let Some(joined) = new.channel_id else {
        return Ok(());
    };
    let settings = data.settings.settings(guild_id.get()).await?;
    if settings.channel(ChannelKind::DynamicVoice) != Some(joined.get()) {
        return Ok(());
    }

    let user_id = new.user_id;
    let owner_name = new
        .member
        .as_ref()
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| "Member".to_string());

    let parent = joined
        .to_channel(&ctx.http)
        .await
        .ok()
        .and_then(|c| c.guild())
        .and_then(|c| c.parent_id);

    let mut builder = serenity::CreateChannel::new(format!("{owner_name}'s channel"))
        .kind(serenity::ChannelType::Voice);
    if let Some(parent) = parent {
        builder = builder.category(parent);
    }

    let channel = guild_id.create_channel(&ctx.http, builder).await?;
    data.guild_state
        .register_temp_channel(channel.id.get(), guild_id.get());

    guild_id
        .edit_member(
            &ctx.http,
            user_id,
            serenity::EditMember::new().voice_channel(channel.id),
        )
        .await?;
    Ok(())
}

fn channel_is_empty(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    channel_id: serenity::ChannelId,
) -> bool {
    ctx.cache
        .guild(guild_id)
        .map(|g| {
            !g.voice_states
                .values()
                .any(|vs| vs.channel_id == Some(channel_id))
        })
        .unwrap_or(false)
}

pub async fn refresh_invite_snapshot(
    ctx: &serenity::Context,
    data: &Data,
    guild_id: serenity::GuildId,
) {
    match guild_id.invites(&ctx.http).await {
        Ok(invites) => {
            let uses: HashMap<String, u64> =
                invites.iter().map(|i| (i.code.clone(), i.uses)).collect();
            data.guild_state.snapshot_invites(guild_id.get(), uses);
        }
        Err(e) => tracing::debug!("Could not snapshot invites for {guild_id}: {e}"),
    }
}
