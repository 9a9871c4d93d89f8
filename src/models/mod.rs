use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Profiles ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub posts_count: Option<i64>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref()
            .or(self.username.as_deref())
            .unwrap_or("Anonymous")
    }
}

/// The author fields embedded next to posts, products and conversations.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AuthorSummary {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthorSummary {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref()
            .filter(|s| !s.is_empty())
            .or(self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Anonymous User")
    }

    pub fn initial(&self) -> String {
        self.display_name()
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_else(|| "U".to_string())
    }
}

impl From<&Profile> for AuthorSummary {
    fn from(profile: &Profile) -> Self {
        Self {
            id: Some(profile.id),
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

// --- Posts ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub profiles: Option<AuthorSummary>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PostLike {
    pub post_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PostComment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub profiles: Option<AuthorSummary>,
}

/// A post together with what the feed shows about it.
#[derive(Debug, Serialize, Clone)]
pub struct PostCard {
    pub post: Post,
    pub author: AuthorSummary,
    pub like_count: usize,
    pub liked_by_me: bool,
    pub comment_count: usize,
}

// --- Products ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    pub order_index: i32,
}

/// The product columns embedded in cart and wishlist rows.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductSummary {
    pub id: Uuid,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ProductListing {
    pub product: Product,
    pub seller: AuthorSummary,
}

// --- Cart & wishlist ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CartItem {
    pub id: Uuid,
    pub quantity: i32,
    pub product: ProductSummary,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WishlistItem {
    pub id: Uuid,
    pub product: ProductSummary,
}

// --- Messaging ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// The participant that is not `me`.
    pub fn other_participant(&self, me: Uuid) -> Uuid {
        if self.user1_id == me { self.user2_id } else { self.user1_id }
    }

    pub fn includes(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub other_user: AuthorSummary,
    pub last_message: Option<Message>,
}

// --- Settings ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserSettingsRow {
    pub user_id: Uuid,
    pub language: Option<String>,
    pub theme: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Auth payloads ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
}

/// Token grant returned by sign-in and refresh.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AuthUser,
}

/// What the session cookie remembers about a signed-in user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds.
    pub expires_at: i64,
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl AuthSession {
    pub const REFRESH_MARGIN_SECS: i64 = 60;

    pub fn from_grant(grant: TokenGrant, now: i64) -> Self {
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: now + grant.expires_in,
            user_id: grant.user.id,
            email: grant.user.email,
        }
    }

    pub fn needs_refresh(&self, now: i64) -> bool {
        self.expires_at - now <= Self::REFRESH_MARGIN_SECS
    }
}

// --- Toasts ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into(), r#type: "success".to_string() }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into(), r#type: "error".to_string() }
    }
}

/// Aggregates like rows per post.
pub fn count_by_post<'a>(post_ids: impl Iterator<Item = &'a Uuid>) -> std::collections::HashMap<Uuid, usize> {
    let mut counts = std::collections::HashMap::new();
    for id in post_ids {
        *counts.entry(*id).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostIdRow {
    pub post_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdRow {
    pub id: Uuid,
}

pub mod forms;
pub mod settings;
pub mod db_operations;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn post_row_with_embedded_author() {
        let row = json!({
            "id": "7f1c5a5e-2a9b-4b6e-9a53-0c4f3f3d8a11",
            "user_id": "0b5b2c1e-7b5e-4f0c-8f4b-8f9a1d2c3e4f",
            "title": "Hand-thrown bowls",
            "content": "Fresh from the kiln",
            "image_url": null,
            "created_at": "2024-05-01T10:00:00+00:00",
            "profiles": { "username": "potter", "full_name": null, "avatar_url": null }
        });
        let post: Post = serde_json::from_value(row).unwrap();
        assert_eq!(post.title, "Hand-thrown bowls");
        assert_eq!(post.profiles.unwrap().display_name(), "potter");
    }

    #[test]
    fn post_row_without_content_defaults_to_empty() {
        let row = json!({
            "id": "7f1c5a5e-2a9b-4b6e-9a53-0c4f3f3d8a11",
            "user_id": "0b5b2c1e-7b5e-4f0c-8f4b-8f9a1d2c3e4f",
            "title": "t",
            "image_url": null,
            "created_at": "2024-05-01T10:00:00Z"
        });
        let post: Post = serde_json::from_value(row).unwrap();
        assert!(post.content.is_empty());
        assert!(post.profiles.is_none());
    }

    #[test]
    fn malformed_row_is_rejected_at_the_boundary() {
        let row = json!({ "id": "not-a-uuid", "title": 3 });
        assert!(serde_json::from_value::<Post>(row).is_err());
    }

    #[test]
    fn author_display_name_falls_back() {
        let empty = AuthorSummary::default();
        assert_eq!(empty.display_name(), "Anonymous User");
        assert_eq!(empty.initial(), "A");
        let named = AuthorSummary { full_name: Some("mira weaver".into()), ..Default::default() };
        assert_eq!(named.display_name(), "mira weaver");
        assert_eq!(named.initial(), "M");
    }

    #[test]
    fn other_participant_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = Conversation { id: Uuid::new_v4(), user1_id: a, user2_id: b, last_message_at: None };
        assert_eq!(conv.other_participant(a), b);
        assert_eq!(conv.other_participant(b), a);
        assert!(conv.includes(a));
        assert!(!conv.includes(Uuid::new_v4()));
    }

    #[test]
    fn cart_line_total_multiplies_quantity() {
        let item = CartItem {
            id: Uuid::new_v4(),
            quantity: 3,
            product: ProductSummary {
                id: Uuid::new_v4(),
                title: "Scarf".into(),
                price: 12.5,
                image_url: None,
                description: None,
            },
        };
        assert!((item.line_total() - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn session_refreshes_inside_the_margin() {
        let grant = TokenGrant {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: 3600,
            user: AuthUser { id: Uuid::new_v4(), email: Some("maker@example.com".into()) },
        };
        let session = AuthSession::from_grant(grant, 1_000);
        assert_eq!(session.expires_at, 4_600);
        assert!(!session.needs_refresh(1_000));
        assert!(!session.needs_refresh(4_539));
        assert!(session.needs_refresh(4_540));
        assert!(session.needs_refresh(5_000));
    }

    #[test]
    fn counts_group_by_post() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = vec![a, b, a];
        let counts = count_by_post(ids.iter());
        assert_eq!(counts.get(&a), Some(&2));
        assert_eq!(counts.get(&b), Some(&1));
    }
}
