use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::{messages_db_operations, posts_db_operations};
use crate::models::{AuthSession, Conversation, Message, PostCard};
use crate::realtime::channel::ChangeFilter;
use crate::realtime::connection::RealtimeSocket;
use crate::realtime::feed_state::{FeedState, MessageLog};
use actix_web::web;
use actix_web_lab::sse;
use std::time::Duration;
use tera::{Context, Tera};
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

fn render_fragment(tera: &Tera, template: &str, ctx: &Context) -> Option<String> {
    match tera.render(template, ctx) {
        Ok(html) => Some(html),
        Err(e) => {
            log::error!("Template error in '{}': {:?}", template, e);
            None
        }
    }
}

/// Keeps one browser's feed current: every change on `posts` starts a refetch,
/// and only the newest finished refetch is pushed as a `feed` event.
pub async fn run_feed_bridge(
    client: BaasClient,
    tera: web::Data<Tera>,
    viewer: Option<AuthSession>,
    sender: mpsc::Sender<sse::Event>,
) {
    let token = viewer.as_ref().map(|a| a.access_token.clone());
    let viewer_id = viewer.as_ref().map(|a| a.user_id);

    let mut socket = match RealtimeSocket::open(&client, "posts", &ChangeFilter::all("posts"), token.as_deref()).await {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("Feed subscription unavailable: {}", e);
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<(u64, Result<Vec<PostCard>, BaasError>)>();
    let mut feed = FeedState::default();
    let mut keep_alive = interval(KEEP_ALIVE);
    keep_alive.reset();

    loop {
        tokio::select! {
            change = socket.next_change() => match change {
                Ok(change) => {
                    let version = feed.begin();
                    log::debug!("posts {:?}; refetching feed as version {}", change.event_type, version);
                    let (client, token, tx) = (client.clone(), token.clone(), tx.clone());
                    actix_web::rt::spawn(async move {
                        let result = posts_db_operations::fetch_feed(&client, token.as_deref(), viewer_id).await;
                        // The receiver only goes away when the bridge has ended.
                        let _ = tx.send((version, result));
                    });
                }
                Err(e) => {
                    log::info!("Feed subscription ended: {}", e);
                    break;
                }
            },
            Some((version, result)) = rx.recv() => {
                if !feed.accept(version) {
                    log::debug!("Discarding stale feed version {}", version);
                    continue;
                }
                let cards = match result {
                    Ok(cards) => cards,
                    Err(e) => {
                        log::error!("Failed to refetch feed: {}", e);
                        continue;
                    }
                };
                let mut ctx = Context::new();
                ctx.insert("cards", &cards);
                ctx.insert("current_user_id", &viewer_id);
                if let Some(html) = render_fragment(&tera, "posts/_feed.html", &ctx) {
                    if sender.send(sse::Data::new(html).event("feed").into()).await.is_err() {
                        break;
                    }
                }
            }
            _ = keep_alive.tick() => {
                if sender.send(sse::Event::Comment("keep-alive".into())).await.is_err() {
                    break;
                }
            }
        }
    }

    socket.close().await;
}

/// Only messages the other participant sent to me belong in this thread.
pub fn should_forward(message: &Message, me: Uuid, other: Uuid) -> bool {
    message.sender_id == other && message.receiver_id == me
}

/// Pushes new messages from the other participant as `message` events.
pub async fn run_message_bridge(
    client: BaasClient,
    tera: web::Data<Tera>,
    auth: AuthSession,
    conversation: Conversation,
    sender: mpsc::Sender<sse::Event>,
) {
    let me = auth.user_id;
    let other = conversation.other_participant(me);

    let known = messages_db_operations::fetch_thread(&client, &auth.access_token, me, other)
        .await
        .unwrap_or_else(|e| {
            log::warn!("Could not preload thread {}: {}", conversation.id, e);
            Vec::new()
        });
    let mut delivered = MessageLog::with_known(known.into_iter().map(|m| m.id));

    let filter = ChangeFilter::inserts("messages", format!("receiver_id=eq.{}", me));
    let channel_name = format!("messages:{}", conversation.id);
    let mut socket = match RealtimeSocket::open(&client, &channel_name, &filter, Some(&auth.access_token)).await {
        Ok(socket) => socket,
        Err(e) => {
            log::warn!("Message subscription unavailable: {}", e);
            return;
        }
    };

    let mut keep_alive = interval(KEEP_ALIVE);
    keep_alive.reset();

    loop {
        tokio::select! {
            change = socket.next_change() => {
                let change = match change {
                    Ok(change) => change,
                    Err(e) => {
                        log::info!("Message subscription ended: {}", e);
                        break;
                    }
                };
                let Some(message) = change.record_as::<Message>() else {
                    log::warn!("Ignoring message row with unexpected shape");
                    continue;
                };
                if !should_forward(&message, me, other) || !delivered.admit(message.id) {
                    continue;
                }
                let mut ctx = Context::new();
                ctx.insert("message", &message);
                ctx.insert("current_user_id", &me);
                if let Some(html) = render_fragment(&tera, "messages/_message.html", &ctx) {
                    if sender.send(sse::Data::new(html).event("message").id(message.id.to_string()).into()).await.is_err() {
                        break;
                    }
                }
            }
            _ = keep_alive.tick() => {
                if sender.send(sse::Event::Comment("keep-alive".into())).await.is_err() {
                    break;
                }
            }
        }
    }

    socket.close().await;
}
