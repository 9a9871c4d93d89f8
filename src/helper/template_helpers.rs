use crate::helper::notification_helpers;
use crate::helper::video_embed;
use crate::models::settings::{Language, Theme, UserSettings};
use crate::models::AuthSession;
use actix_session::Session;
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tera::{Context, Tera};

#[derive(Serialize)]
struct Choice {
    value: &'static str,
    label: &'static str,
}

/// Loads the templates and registers the filters they use.
pub fn build_tera(glob: &str) -> Result<Tera, tera::Error> {
    let mut tera = Tera::new(glob)?;
    register_filters(&mut tera);
    Ok(tera)
}

pub fn register_filters(tera: &mut Tera) {
    tera.register_filter("time_ago", time_ago_filter);
    tera.register_filter("money", money_filter);
    tera.register_filter("embed_blocks", embed_blocks_filter);
}

/// "just now", "5 minutes ago", ... then a plain date after a week.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    let plural = |n: i64, unit: &str| {
        if n == 1 { format!("1 {} ago", unit) } else { format!("{} {}s ago", n, unit) }
    };
    match seconds {
        0..=59 => "just now".to_string(),
        60..=3_599 => plural(seconds / 60, "minute"),
        3_600..=86_399 => plural(seconds / 3_600, "hour"),
        86_400..=604_799 => plural(seconds / 86_400, "day"),
        _ => then.format("%b %-d, %Y").to_string(),
    }
}

fn time_ago_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = value.as_str().ok_or_else(|| tera::Error::msg("time_ago expects a timestamp string"))?;
    let then = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| tera::Error::msg(format!("time_ago: {}", e)))?
        .with_timezone(&Utc);
    Ok(Value::String(time_ago(then, Utc::now())))
}

fn money_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let amount = value.as_f64().ok_or_else(|| tera::Error::msg("money expects a number"))?;
    Ok(Value::String(format!("${:.2}", amount)))
}

/// Splits post or product text into text and video blocks for the embed partial.
fn embed_blocks_filter(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
    let text = value.as_str().unwrap_or("");
    serde_json::to_value(video_embed::content_blocks(text)).map_err(tera::Error::from)
}

/// Context shared by every page: settings for the `<html>` element, the
/// signed-in user and any pending toasts.
pub fn page_context(session: &Session, settings: &UserSettings, user: Option<&AuthSession>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("lang", settings.language.code());
    ctx.insert("theme", settings.theme.as_str());
    ctx.insert("theme_class", settings.theme.root_class());
    ctx.insert(
        "languages",
        &Language::ALL.iter().map(|l| Choice { value: l.code(), label: l.label() }).collect::<Vec<_>>(),
    );
    ctx.insert(
        "themes",
        &Theme::ALL.iter().map(|t| Choice { value: t.as_str(), label: t.label() }).collect::<Vec<_>>(),
    );
    if let Some(user) = user {
        ctx.insert("current_user_id", &user.user_id);
        ctx.insert("current_user_email", &user.email);
    }
    ctx.insert("notifications", &notification_helpers::take_notifications(session));
    ctx
}

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered),
        Err(e) => {
            log::error!("Template error in '{}': {:?}", template, e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}
