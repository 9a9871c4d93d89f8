use crate::helper::notification_helpers::{self, error_redirect, redirect};
use crate::helper::template_helpers;
use crate::middleware::{AuthenticatedUser, CurrentSettings};
use crate::models::db_operations::messages_db_operations;
use crate::models::forms::{MessageForm, StartConversationForm};
use crate::models::{ConversationView, Message, Notification};
use crate::AppState;
use actix_session::Session;
use actix_web::{web, Responder};
use serde::Deserialize;
use tera::Tera;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ConversationQuery {
    conversation: Option<Uuid>,
}

pub fn config_messages(cfg: &mut web::ServiceConfig) {
    cfg.route("/messages", web::get().to(show_messages))
        .route("/messages/start", web::post().to(start_conversation_action))
        .route("/messages/{id}/send", web::post().to(send_message_action));
}

fn conversation_url(id: Uuid) -> String {
    format!("/messages?conversation={}", id)
}

/// Conversation list, plus the selected thread when `?conversation=` is given.
async fn show_messages(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    query: web::Query<ConversationQuery>,
) -> impl Responder {
    let me = user.id();
    let conversations = match messages_db_operations::fetch_conversations(&state.baas, user.token(), me).await {
        Ok(conversations) => conversations,
        Err(e) => {
            log::error!("Failed to load conversations of {}: {}", me, e);
            notification_helpers::flash(&session, Notification::error("Error loading conversations", e.to_string()));
            Vec::new()
        }
    };

    let mut selected: Option<(&ConversationView, Vec<Message>)> = None;
    if let Some(selected_id) = query.conversation {
        let Some(view) = conversations.iter().find(|v| v.conversation.id == selected_id) else {
            return error_redirect(&session, "Conversation not found", "This conversation is not available.", "/messages");
        };
        let other = view.conversation.other_participant(me);
        let thread = match messages_db_operations::fetch_thread(&state.baas, user.token(), me, other).await {
            Ok(thread) => thread,
            Err(e) => {
                log::error!("Failed to load thread {}: {}", selected_id, e);
                notification_helpers::flash(&session, Notification::error("Error loading messages", e.to_string()));
                Vec::new()
            }
        };
        selected = Some((view, thread));
    }

    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    if let Some((view, thread)) = &selected {
        ctx.insert("selected", view);
        ctx.insert("thread", thread);
    }
    ctx.insert("conversations", &conversations);
    template_helpers::render(&tera, "messages/index.html", &ctx)
}

async fn start_conversation_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<StartConversationForm>,
) -> impl Responder {
    if form.user_id == user.id() {
        return error_redirect(&session, "Error starting conversation", "You cannot message yourself.", "/people");
    }
    match messages_db_operations::find_or_create_conversation(&state.baas, user.token(), user.id(), form.user_id).await {
        Ok(conversation) => redirect(&conversation_url(conversation.id)),
        Err(e) => {
            log::error!("Failed to open conversation {} -> {}: {}", user.id(), form.user_id, e);
            error_redirect(&session, "Error starting conversation", e.to_string(), &format!("/people/{}", form.user_id))
        }
    }
}

async fn send_message_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<MessageForm>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    let back = conversation_url(conversation_id);
    let content = form.content.trim();
    if content.is_empty() {
        return redirect(&back);
    }

    let conversation = match messages_db_operations::fetch_conversation(&state.baas, user.token(), conversation_id, user.id()).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => return error_redirect(&session, "Conversation not found", "This conversation is not available.", "/messages"),
        Err(e) => {
            log::error!("Failed to load conversation {}: {}", conversation_id, e);
            return error_redirect(&session, "Error sending message", e.to_string(), &back);
        }
    };

    match messages_db_operations::send_message(&state.baas, user.token(), &conversation, user.id(), content).await {
        Ok(message) => {
            log::debug!("Message {} sent in {}", message.id, conversation_id);
            redirect(&format!("{}#msg-{}", back, message.id))
        }
        Err(e) => {
            log::error!("Failed to send message in {}: {}", conversation_id, e);
            error_redirect(&session, "Error sending message", e.to_string(), &back)
        }
    }
}
