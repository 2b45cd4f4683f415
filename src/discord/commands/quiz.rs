// Interactive IT quiz. Ten questions, four answer buttons each, 30 seconds
// per question. Only the invoker's clicks count; a timeout counts as a
// wrong answer. The final score overwrites the member's stored result.

use crate::core::quiz::{reward_earned, sample_questions, QUIZ_LENGTH};
use crate::discord::{Context, Error};
use chrono::Utc;
use poise::serenity_prelude as serenity;
use std::time::Duration;

const ANSWER_TIME: Duration = Duration::from_secs(30);
const ANSWER_LABELS: [&str; 4] = ["A", "B", "C", "D"];

/// Start a ten-question IT quiz.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn quiz(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();
    let user_id = ctx.author().id.get();

    let questions = sample_questions(QUIZ_LENGTH);
    let total = questions.len();
    let mut score: u32 = 0;

    let reply = ctx.say("Starting the quiz...").await?;
    let msg_id = reply.message().await?.id;

    for (index, question) in questions.iter().enumerate() {
        let mut options_text = String::new();
        for (i, option) in question.options.iter().enumerate() {
            options_text.push_str(&format!("**{}** {}\n", ANSWER_LABELS[i], option));
        }

        let embed = serenity::CreateEmbed::new()
            .title(format!("Question {}/{}", index + 1, total))
            .description(format!("{}\n\n{}", question.question, options_text))
            .color(0x5865f2)
            .footer(serenity::CreateEmbedFooter::new(format!("Score: {score}")));

        let buttons = (0..4)
            .map(|i| {
                serenity::CreateButton::new(format!("answer_{i}"))
                    .label(ANSWER_LABELS[i])
                    .style(serenity::ButtonStyle::Primary)
            })
            .collect();
        let components = vec![serenity::CreateActionRow::Buttons(buttons)];

        reply
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content("")
                    .embed(embed)
                    .components(components),
            )
            .await?;

        let interaction = serenity::ComponentInteractionCollector::new(ctx)
            .author_id(ctx.author().id)
            .channel_id(ctx.channel_id())
            .timeout(ANSWER_TIME)
            .filter(move |mci| mci.message.id == msg_id)
            .await;

        match interaction {
            Some(mci) => {
                let picked = mci
                    .data
                    .custom_id
                    .strip_prefix("answer_")
                    .and_then(|s| s.parse::<usize>().ok());
                let correct = picked == Some(question.answer);
                if correct {
                    score += 1;
                }

                let feedback = if correct {
                    "Correct!".to_string()
                } else {
                    format!(
                        "Wrong. The answer was **{}**.",
                        question.options[question.answer]
                    )
                };
                mci.create_response(
                    &ctx,
                    serenity::CreateInteractionResponse::Message(
                        serenity::CreateInteractionResponseMessage::new()
                            .content(feedback)
                            .ephemeral(true),
                    ),
                )
                .await?;
            }
            None => {
                // No answer in time counts as wrong; keep going.
            }
        }
    }

    ctx.data()
        .quiz
        .save_score(guild_id, user_id, score, Utc::now().date_naive())
        .await?;

    let mut summary = format!("Quiz finished! You scored **{score}/{total}**.");
    if reward_earned(score) {
        if let Some(role_id) = ctx
            .data()
            .settings
            .settings(guild_id)
            .await?
            .quiz_reward_role
        {
            match assign_reward_role(ctx, role_id).await {
                Ok(()) => summary.push_str("\nYou earned the quiz champion role!"),
                Err(e) => tracing::warn!("Failed to assign quiz reward role: {e}"),
            }
        }
    }

    reply
        .edit(
            ctx,
            poise::CreateReply::default()
                .content(summary)
                .embed(
                    serenity::CreateEmbed::new()
                        .title("Quiz complete")
                        .color(0x00ff00)
                        .description(format!("Final score: {score}/{total}")),
                )
                .components(vec![]),
        )
        .await?;
    Ok(())
}

/// Show a member's latest quiz result.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn quizscore(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    match ctx
        .data()
        .quiz
        .last_score(guild_id, target_user.id.get())
        .await?
    {
        Some(result) => {
            ctx.say(format!(
                "{} scored {}/{} on {}.",
                target_user.name,
                result.score,
                QUIZ_LENGTH,
                result.date_played.format("%d.%m.%Y")
            ))
            .await?;
        }
        None => {
            ctx.say(format!("{} hasn't played the quiz yet.", target_user.name))
                .await?;
        }
    }
    Ok(())
}

async fn assign_reward_role(ctx: Context<'_>, role_id: u64) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;
    let member = guild_id.member(ctx.http(), ctx.author().id).await?;
    member
        .add_role(ctx.http(), serenity::RoleId::new(role_id))
        .await?;
    Ok(())
}
