use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::profiles_db_operations;
use crate::models::db_operations::query::first_row;
use crate::models::{AuthorSummary, Conversation, ConversationView, Message};
use chrono::Utc;
use futures_util::future::try_join_all;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn pair_filter(a: Uuid, b: Uuid) -> String {
    format!(
        "and(user1_id.eq.{a},user2_id.eq.{b}),and(user1_id.eq.{b},user2_id.eq.{a})",
        a = a,
        b = b
    )
}

fn thread_filter(a: Uuid, b: Uuid) -> String {
    format!(
        "and(sender_id.eq.{a},receiver_id.eq.{b}),and(sender_id.eq.{b},receiver_id.eq.{a})",
        a = a,
        b = b
    )
}

/// Returns the conversation between the two users, creating it on first contact.
pub async fn find_or_create_conversation(
    client: &BaasClient,
    token: &str,
    me: Uuid,
    other: Uuid,
) -> Result<Conversation, BaasError> {
    let existing: Option<Conversation> = client
        .table("conversations", Some(token))
        .select("*")
        .or(&pair_filter(me, other))
        .fetch_optional()
        .await?;
    if let Some(conversation) = existing {
        return Ok(conversation);
    }

    log::info!("Starting a new conversation between {} and {}", me, other);
    let rows: Vec<Conversation> = client
        .table("conversations", Some(token))
        .insert(&json!({ "user1_id": me, "user2_id": other }))
        .await?;
    first_row(rows)
}

/// The conversation, provided `me` takes part in it.
pub async fn fetch_conversation(
    client: &BaasClient,
    token: &str,
    conversation_id: Uuid,
    me: Uuid,
) -> Result<Option<Conversation>, BaasError> {
    let conversation: Option<Conversation> = client
        .table("conversations", Some(token))
        .select("*")
        .eq("id", conversation_id)
        .fetch_optional()
        .await?;
    Ok(conversation.filter(|c| c.includes(me)))
}

pub async fn fetch_last_message(
    client: &BaasClient,
    token: &str,
    a: Uuid,
    b: Uuid,
) -> Result<Option<Message>, BaasError> {
    client
        .table("messages", Some(token))
        .select("*")
        .or(&thread_filter(a, b))
        .order("created_at", false)
        .fetch_optional()
        .await
}

/// The user's conversations, most recently active first.
pub async fn fetch_conversations(
    client: &BaasClient,
    token: &str,
    me: Uuid,
) -> Result<Vec<ConversationView>, BaasError> {
    let conversations: Vec<Conversation> = client
        .table("conversations", Some(token))
        .select("*")
        .or(&format!("user1_id.eq.{0},user2_id.eq.{0}", me))
        .order("last_message_at", false)
        .fetch()
        .await?;

    let others: Vec<Uuid> = conversations.iter().map(|c| c.other_participant(me)).collect();
    let profiles = profiles_db_operations::fetch_author_map(client, Some(token), &others).await?;
    let last_messages = try_join_all(
        others.iter().map(|other| fetch_last_message(client, token, me, *other)),
    )
    .await?;

    Ok(assemble_views(conversations, &profiles, last_messages, me))
}

pub fn assemble_views(
    conversations: Vec<Conversation>,
    profiles: &HashMap<Uuid, AuthorSummary>,
    last_messages: Vec<Option<Message>>,
    me: Uuid,
) -> Vec<ConversationView> {
    conversations
        .into_iter()
        .zip(last_messages)
        .map(|(conversation, last_message)| {
            let other = conversation.other_participant(me);
            ConversationView {
                other_user: profiles.get(&other).cloned().unwrap_or_else(|| AuthorSummary {
                    id: Some(other),
                    ..Default::default()
                }),
                conversation,
                last_message,
            }
        })
        .collect()
}

/// Messages exchanged between the two users, oldest first.
pub async fn fetch_thread(
    client: &BaasClient,
    token: &str,
    me: Uuid,
    other: Uuid,
) -> Result<Vec<Message>, BaasError> {
    client
        .table("messages", Some(token))
        .select("*")
        .or(&thread_filter(me, other))
        .order("created_at", true)
        .fetch()
        .await
}

/// Stores the message and marks the conversation as active now.
pub async fn send_message(
    client: &BaasClient,
    token: &str,
    conversation: &Conversation,
    me: Uuid,
    content: &str,
) -> Result<Message, BaasError> {
    let rows: Vec<Message> = client
        .table("messages", Some(token))
        .insert(&json!({
            "sender_id": me,
            "receiver_id": conversation.other_participant(me),
            "content": content.trim(),
        }))
        .await?;
    let message = first_row(rows)?;

    client
        .table("conversations", Some(token))
        .eq("id", conversation.id)
        .update(&json!({ "last_message_at": Utc::now().to_rfc3339() }))
        .await?;

    Ok(message)
}
