// Dashboard routes. HTML pages for humans, a small JSON API underneath.
// Every handler except the login flow requires a valid session cookie.

use crate::core::custom_commands::CustomCommandError;
use crate::web::session::{
    clear_cookie_header, set_cookie_header, token_from_cookie_header, SessionClaims,
};
use crate::web::WebState;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

pub fn create_router() -> Router<WebState> {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/login/callback", get(login_callback))
        .route("/logout", get(logout))
        .route("/guild/:guild_id", get(guild_page))
        .route("/guild/:guild_id", post(update_guild))
        .route("/guild/:guild_id/commands", post(add_custom_command))
        .route(
            "/guild/:guild_id/commands/delete",
            post(remove_custom_command),
        )
        .route("/api/guilds", get(api_guilds))
        .route("/api/guild/:guild_id", get(api_guild))
}

fn session_from(headers: &HeaderMap, state: &WebState) -> Option<SessionClaims> {
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    let token = token_from_cookie_header(cookie)?;
    state.sessions.verify(token)
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// LOGIN FLOW
// ============================================================================

async fn login(State(state): State<WebState>) -> Response {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    state.login_nonces.insert(nonce.clone(), ());

    match state.oauth.authorize_url(&nonce) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => {
            tracing::error!("Failed to build authorize URL: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: String,
    state: String,
}

async fn login_callback(
    State(state): State<WebState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // A nonce is single-use; an unknown one means a forged or replayed
    // callback.
    if state.login_nonces.remove(&query.state).is_none() {
        return (StatusCode::BAD_REQUEST, "Invalid login state").into_response();
    }

    let identity = match state.oauth.identify(&query.code).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!("OAuth login failed: {e}");
            return (StatusCode::BAD_GATEWAY, "Login with Discord failed").into_response();
        }
    };
    let user_id = match identity.user_id() {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Bad identity payload: {e}");
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    if let Err(e) = state
        .settings
        .record_web_login(user_id, &identity.username, Utc::now())
        .await
    {
        tracing::error!("Failed to record web login: {e}");
    }

    let token = match state.sessions.issue(user_id, &identity.username) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to issue session: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    (
        [(header::SET_COOKIE, set_cookie_header(&token))],
        Redirect::to("/"),
    )
        .into_response()
}

async fn logout() -> Response {
    (
        [(header::SET_COOKIE, clear_cookie_header())],
        Redirect::to("/"),
    )
        .into_response()
}

// ============================================================================
// HTML PAGES
// ============================================================================

async fn index(State(state): State<WebState>, headers: HeaderMap) -> Response {
    let Some(session) = session_from(&headers, &state) else {
        return Html(
            "<html><body><h1>Guildkeeper</h1>\
             <p><a href=\"/login\">Log in with Discord</a></p></body></html>"
                .to_string(),
        )
        .into_response();
    };

    let mut rows = String::new();
    for guild_id in state.cache.guilds() {
        let Some(guild) = state.cache.guild(guild_id) else {
            continue;
        };
        rows.push_str(&format!(
            "<li><a href=\"/guild/{}\">{}</a> ({} members)</li>",
            guild_id.get(),
            escape_html(&guild.name),
            guild.member_count
        ));
    }

    Html(format!(
        "<html><body><h1>Guildkeeper</h1>\
         <p>Logged in as {} | <a href=\"/logout\">Log out</a></p>\
         <h2>Servers</h2><ul>{rows}</ul></body></html>",
        escape_html(&session.name)
    ))
    .into_response()
}

async fn guild_page(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(guild_id): Path<u64>,
) -> Response {
    if session_from(&headers, &state).is_none() {
        return Redirect::to("/login").into_response();
    }

    let guild_name = state
        .cache
        .guild(poise::serenity_prelude::GuildId::new(guild_id))
        .map(|g| g.name.clone())
        .unwrap_or_else(|| format!("Guild {guild_id}"));

    let settings = match state.settings.settings(guild_id).await {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load settings: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let peaks = state.activity.peaks(guild_id).await.unwrap_or_default();
    let top = state
        .leveling
        .leaderboard(guild_id, 10)
        .await
        .unwrap_or_default();

    let commands = state
        .custom_commands
        .list(guild_id)
        .await
        .unwrap_or_default();

    let mut leaderboard_rows = String::new();
    for (i, member) in top.iter().enumerate() {
        leaderboard_rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            i + 1,
            escape_html(&member.username),
            member.level,
            member.counter
        ));
    }

    let mut command_rows = String::new();
    for command in &commands {
        command_rows.push_str(&format!(
            "<tr><td><code>{}</code></td><td>{}</td>\
             <td><form method=\"post\" action=\"/guild/{guild_id}/commands/delete\">\
             <input type=\"hidden\" name=\"name\" value=\"{}\">\
             <button type=\"submit\">Remove</button></form></td></tr>",
            escape_html(&command.name),
            escape_html(&command.response),
            escape_html(&command.name),
        ));
    }

    Html(format!(
        "<html><body><h1>{}</h1><p><a href=\"/\">Back</a></p>\
         <h2>Statistics</h2>\
         <p>Peak online: {} | Peak members: {}</p>\
         <h2>Leaderboard</h2>\
         <table><tr><th>#</th><th>Member</th><th>Level</th><th>Messages</th></tr>{}</table>\
         <h2>Settings</h2>\
         <form method=\"post\">\
         <label>Prefix: <input name=\"prefix\" value=\"{}\" maxlength=\"5\"></label>\
         <button type=\"submit\">Save</button>\
         </form>\
         <h2>Custom commands</h2>\
         <table><tr><th>Name</th><th>Response</th><th></th></tr>{}</table>\
         <form method=\"post\" action=\"/guild/{guild_id}/commands\">\
         <label>Name: <input name=\"name\"></label>\
         <label>Response: <input name=\"response\"></label>\
         <button type=\"submit\">Add</button>\
         </form></body></html>",
        escape_html(&guild_name),
        peaks.max_active_users,
        peaks.max_members,
        leaderboard_rows,
        escape_html(settings.effective_prefix()),
        command_rows,
    ))
    .into_response()
}

#[derive(Deserialize)]
struct GuildSettingsForm {
    prefix: String,
}

async fn update_guild(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(guild_id): Path<u64>,
    Form(form): Form<GuildSettingsForm>,
) -> Response {
    if session_from(&headers, &state).is_none() {
        return Redirect::to("/login").into_response();
    }

    let prefix = form.prefix.trim();
    if prefix.is_empty() || prefix.len() > 5 {
        return (StatusCode::BAD_REQUEST, "Prefix must be 1 to 5 characters").into_response();
    }

    if let Err(e) = state.settings.set_prefix(guild_id, prefix).await {
        tracing::error!("Failed to save prefix: {e}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Redirect::to(&format!("/guild/{guild_id}")).into_response()
}

#[derive(Deserialize)]
struct CustomCommandForm {
    name: String,
    response: String,
}

async fn add_custom_command(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(guild_id): Path<u64>,
    Form(form): Form<CustomCommandForm>,
) -> Response {
    if session_from(&headers, &state).is_none() {
        return Redirect::to("/login").into_response();
    }

    match state
        .custom_commands
        .add(guild_id, &form.name, &form.response)
        .await
    {
        Ok(()) => Redirect::to(&format!("/guild/{guild_id}")).into_response(),
        Err(CustomCommandError::InvalidName) => {
            (StatusCode::BAD_REQUEST, "Command names must be alphanumeric").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to save custom command: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Deserialize)]
struct RemoveCommandForm {
    name: String,
}

async fn remove_custom_command(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(guild_id): Path<u64>,
    Form(form): Form<RemoveCommandForm>,
) -> Response {
    if session_from(&headers, &state).is_none() {
        return Redirect::to("/login").into_response();
    }

    if let Err(e) = state.custom_commands.remove(guild_id, &form.name).await {
        tracing::error!("Failed to remove custom command: {e}");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Redirect::to(&format!("/guild/{guild_id}")).into_response()
}

// ============================================================================
// JSON API
// ============================================================================

async fn api_guilds(State(state): State<WebState>, headers: HeaderMap) -> Response {
    if session_from(&headers, &state).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let guilds: Vec<serde_json::Value> = state
        .cache
        .guilds()
        .iter()
        .filter_map(|guild_id| {
            state.cache.guild(*guild_id).map(|g| {
                json!({
                    "id": guild_id.get().to_string(),
                    "name": g.name,
                    "member_count": g.member_count,
                })
            })
        })
        .collect();

    Json(json!({ "guilds": guilds })).into_response()
}

async fn api_guild(
    State(state): State<WebState>,
    headers: HeaderMap,
    Path(guild_id): Path<u64>,
) -> Response {
    if session_from(&headers, &state).is_none() {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let peaks = state.activity.peaks(guild_id).await.unwrap_or_default();
    let leaderboard = state
        .leveling
        .leaderboard(guild_id, 10)
        .await
        .unwrap_or_default();
    let top_bumpers = state
        .bumps
        .top_bumpers_since(guild_id, Utc::now() - Duration::days(30), 10)
        .await
        .unwrap_or_default();
    let top_channels = state
        .activity
        .top_channels(guild_id, Utc::now() - Duration::days(7), 5)
        .await
        .unwrap_or_default();

    Json(json!({
        "id": guild_id.to_string(),
        "peaks": {
            "max_active_users": peaks.max_active_users,
            "max_members": peaks.max_members,
        },
        "leaderboard": leaderboard
            .iter()
            .map(|m| json!({
                "user_id": m.user_id.to_string(),
                "username": m.username,
                "level": m.level,
                "messages": m.counter,
            }))
            .collect::<Vec<_>>(),
        "top_bumpers": top_bumpers
            .iter()
            .map(|t| json!({
                "user_id": t.user_id.to_string(),
                "bumps": t.count,
            }))
            .collect::<Vec<_>>(),
        "top_channels": top_channels
            .iter()
            .map(|c| json!({
                "channel_id": c.channel_id.to_string(),
                "messages": c.messages,
            }))
            .collect::<Vec<_>>(),
    }))
    .into_response()
}
