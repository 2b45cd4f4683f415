// Member post submissions and their moderation queue.

use crate::core::posts::{PostChannels, PostError};
use crate::discord::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;

/// Submit a post for moderator review.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn post(
    ctx: Context<'_>,
    #[description = "Post content"] content: String,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let id = ctx
        .data()
        .posts
        .submit(guild_id, ctx.author().id.get(), &content, Utc::now())
        .await?;

    ctx.send(
        poise::CreateReply::default()
            .content(format!("Your post was submitted for review (#{id})."))
            .ephemeral(true),
    )
    .await?;

    // Notify the review channel so moderators see the queue grow.
    let channels = ctx.data().posts.channels(guild_id).await?;
    if let Some(review_channel) = channels.review_channel {
        let embed = serenity::CreateEmbed::new()
            .title(format!("New post submission #{id}"))
            .description(&content)
            .color(0xffa500)
            .footer(serenity::CreateEmbedFooter::new(format!(
                "Submitted by {} | /approvepost {} or /denypost {}",
                ctx.author().name,
                id,
                id
            )));
        if let Err(e) = serenity::ChannelId::new(review_channel)
            .send_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
            .await
        {
            tracing::warn!("Failed to notify review channel: {e}");
        }
    }
    Ok(())
}

/// List posts waiting for review.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    rename = "pendingposts"
)]
pub async fn pending_posts(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let pending = ctx.data().posts.pending(guild_id).await?;
    if pending.is_empty() {
        ctx.say("The review queue is empty.").await?;
        return Ok(());
    }

    let mut description = String::new();
    for post in pending.iter().take(10) {
        description.push_str(&format!(
            "**#{}** by <@{}>: {}\n",
            post.id,
            post.author_id,
            preview(&post.content)
        ));
    }

    let embed = serenity::CreateEmbed::new()
        .title("Pending posts")
        .color(0xffa500)
        .description(description);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Approve a pending post and publish it.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    rename = "approvepost"
)]
pub async fn approve_post(
    ctx: Context<'_>,
    #[description = "Post id"] id: i64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let post = match ctx.data().posts.approve(guild_id, id).await {
        Ok(post) => post,
        Err(PostError::NotFound(_)) => {
            ctx.say(format!("There is no post #{id}.")).await?;
            return Ok(());
        }
        Err(PostError::AlreadyReviewed(_)) => {
            ctx.say(format!("Post #{id} was already reviewed.")).await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let channels = ctx.data().posts.channels(guild_id).await?;
    match channels.publish_channel {
        Some(publish_channel) => {
            let embed = serenity::CreateEmbed::new()
                .description(&post.content)
                .color(0x00ff00)
                .footer(serenity::CreateEmbedFooter::new(format!(
                    "Post by <@{}>",
                    post.author_id
                )));
            serenity::ChannelId::new(publish_channel)
                .send_message(ctx.http(), serenity::CreateMessage::new().embed(embed))
                .await?;
            ctx.say(format!("Post #{id} approved and published.")).await?;
        }
        None => {
            ctx.say(format!(
                "Post #{id} approved, but no publish channel is configured (`/setpostchannels`)."
            ))
            .await?;
        }
    }
    Ok(())
}

/// Deny a pending post.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    rename = "denypost"
)]
pub async fn deny_post(
    ctx: Context<'_>,
    #[description = "Post id"] id: i64,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx.data().posts.deny(guild_id, id).await {
        Ok(_) => {
            ctx.say(format!("Post #{id} denied.")).await?;
        }
        Err(PostError::NotFound(_)) => {
            ctx.say(format!("There is no post #{id}.")).await?;
        }
        Err(PostError::AlreadyReviewed(_)) => {
            ctx.say(format!("Post #{id} was already reviewed.")).await?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

/// Configure where submissions are reviewed and published.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    rename = "setpostchannels"
)]
pub async fn set_post_channels(
    ctx: Context<'_>,
    #[description = "Channel where moderators review submissions"]
    review: serenity::Channel,
    #[description = "Channel where approved posts are published"]
    publish: serenity::Channel,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    ctx.data()
        .posts
        .set_channels(
            guild_id,
            PostChannels {
                review_channel: Some(review.id().get()),
                publish_channel: Some(publish.id().get()),
            },
        )
        .await?;

    ctx.say(format!(
        "Posts will be reviewed in <#{}> and published in <#{}>.",
        review.id(),
        publish.id()
    ))
    .await?;
    Ok(())
}

const PREVIEW_CHARS: usize = 100;

/// Cut long submissions down for the queue listing. The cut must land on a
/// character boundary, not a byte offset.
fn preview(content: &str) -> String {
    match content.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_shown_as_is() {
        assert_eq!(preview("hello"), "hello");
        assert_eq!(preview(&"a".repeat(100)), "a".repeat(100));
    }

    #[test]
    fn long_content_is_cut_with_an_ellipsis() {
        let long = "a".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), 103);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn multibyte_content_is_cut_on_character_boundaries() {
        // 120 chars of 3 bytes each puts byte offset 100 mid-character.
        let long = "€".repeat(120);
        let cut = preview(&long);
        assert_eq!(cut, format!("{}...", "€".repeat(100)));
    }
}
