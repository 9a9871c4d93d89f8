use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::profiles_db_operations;
use crate::models::db_operations::query::first_row;
use crate::models::forms::NewPost;
use crate::models::{count_by_post, AuthorSummary, Post, PostCard, PostComment, PostIdRow, PostLike};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

const POST_WITH_AUTHOR: &str = "*,profiles!posts_user_id_fkey(username,full_name,avatar_url)";

/// Joins posts with their like and comment rows into feed cards.
pub fn build_cards(
    posts: Vec<Post>,
    likes: &[PostLike],
    comment_post_ids: &[Uuid],
    viewer: Option<Uuid>,
) -> Vec<PostCard> {
    let like_counts = count_by_post(likes.iter().map(|l| &l.post_id));
    let comment_counts = count_by_post(comment_post_ids.iter());
    let liked: HashSet<Uuid> = match viewer {
        Some(me) => likes.iter().filter(|l| l.user_id == me).map(|l| l.post_id).collect(),
        None => HashSet::new(),
    };

    posts
        .into_iter()
        .map(|post| {
            let author = post.profiles.clone().unwrap_or_default();
            PostCard {
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                liked_by_me: liked.contains(&post.id),
                author,
                post,
            }
        })
        .collect()
}

async fn decorate(
    client: &BaasClient,
    token: Option<&str>,
    posts: Vec<Post>,
    viewer: Option<Uuid>,
) -> Result<Vec<PostCard>, BaasError> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = posts.iter().map(|p| p.id).collect();

    let likes: Vec<PostLike> = client
        .table("post_likes", token)
        .select("post_id,user_id")
        .in_list("post_id", &ids)
        .fetch()
        .await?;

    let comments: Vec<PostIdRow> = client
        .table("post_comments", token)
        .select("post_id")
        .in_list("post_id", &ids)
        .fetch()
        .await?;
    let comment_post_ids: Vec<Uuid> = comments.into_iter().map(|c| c.post_id).collect();

    Ok(build_cards(posts, &likes, &comment_post_ids, viewer))
}

/// Newest posts first, each with author, like and comment counts.
pub async fn fetch_feed(
    client: &BaasClient,
    token: Option<&str>,
    viewer: Option<Uuid>,
) -> Result<Vec<PostCard>, BaasError> {
    let posts: Vec<Post> = client
        .table("posts", token)
        .select(POST_WITH_AUTHOR)
        .order("created_at", false)
        .fetch()
        .await?;
    decorate(client, token, posts, viewer).await
}

pub async fn fetch_post(
    client: &BaasClient,
    token: Option<&str>,
    post_id: Uuid,
) -> Result<Option<Post>, BaasError> {
    client
        .table("posts", token)
        .select(POST_WITH_AUTHOR)
        .eq("id", post_id)
        .fetch_optional()
        .await
}

pub async fn fetch_post_card(
    client: &BaasClient,
    token: Option<&str>,
    post_id: Uuid,
    viewer: Option<Uuid>,
) -> Result<Option<PostCard>, BaasError> {
    let Some(post) = fetch_post(client, token, post_id).await? else {
        return Ok(None);
    };
    Ok(decorate(client, token, vec![post], viewer).await?.into_iter().next())
}

pub async fn fetch_user_posts(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
) -> Result<Vec<PostCard>, BaasError> {
    let posts: Vec<Post> = client
        .table("posts", Some(token))
        .select(POST_WITH_AUTHOR)
        .eq("user_id", user_id)
        .order("created_at", false)
        .fetch()
        .await?;
    decorate(client, Some(token), posts, Some(user_id)).await
}

pub async fn create_post(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    post: &NewPost,
) -> Result<Post, BaasError> {
    let rows: Vec<Post> = client
        .table("posts", Some(token))
        .insert(&json!({
            "title": post.title,
            "content": post.content,
            "image_url": post.image_url,
            "user_id": user_id,
        }))
        .await?;
    first_row(rows)
}

/// Only the author's own row matches the filter.
pub async fn update_post(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    post_id: Uuid,
    post: &NewPost,
) -> Result<(), BaasError> {
    client
        .table("posts", Some(token))
        .eq("id", post_id)
        .eq("user_id", user_id)
        .update(post)
        .await
}

pub async fn delete_post(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    post_id: Uuid,
) -> Result<(), BaasError> {
    client
        .table("posts", Some(token))
        .eq("id", post_id)
        .eq("user_id", user_id)
        .delete()
        .await
}

/// Likes the post, or removes the like if there already is one.
/// Returns whether the post is liked afterwards.
pub async fn toggle_like(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    post_id: Uuid,
) -> Result<bool, BaasError> {
    let existing: Option<PostLike> = client
        .table("post_likes", Some(token))
        .select("post_id,user_id")
        .eq("post_id", post_id)
        .eq("user_id", user_id)
        .fetch_optional()
        .await?;

    if existing.is_some() {
        client
            .table("post_likes", Some(token))
            .eq("post_id", post_id)
            .eq("user_id", user_id)
            .delete()
            .await?;
        Ok(false)
    } else {
        client
            .table("post_likes", Some(token))
            .insert_only(&json!({ "post_id": post_id, "user_id": user_id }))
            .await?;
        Ok(true)
    }
}

/// Comments oldest first with their authors attached.
pub async fn fetch_comments(
    client: &BaasClient,
    token: Option<&str>,
    post_id: Uuid,
) -> Result<Vec<PostComment>, BaasError> {
    let mut comments: Vec<PostComment> = client
        .table("post_comments", token)
        .select("*")
        .eq("post_id", post_id)
        .order("created_at", true)
        .fetch()
        .await?;

    let author_ids: Vec<Uuid> = comments.iter().map(|c| c.user_id).collect();
    let authors: HashMap<Uuid, AuthorSummary> =
        profiles_db_operations::fetch_author_map(client, token, &author_ids).await?;
    for comment in comments.iter_mut() {
        comment.profiles = authors.get(&comment.user_id).cloned();
    }
    Ok(comments)
}

pub async fn add_comment(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    post_id: Uuid,
    content: &str,
) -> Result<(), BaasError> {
    client
        .table("post_comments", Some(token))
        .insert_only(&json!({ "post_id": post_id, "user_id": user_id, "content": content.trim() }))
        .await
}

/// Deletes the user's own comment and returns the post it belonged to.
pub async fn delete_comment(
    client: &BaasClient,
    token: &str,
    user_id: Uuid,
    comment_id: Uuid,
) -> Result<Option<Uuid>, BaasError> {
    let comment: Option<PostComment> = client
        .table("post_comments", Some(token))
        .select("*")
        .eq("id", comment_id)
        .eq("user_id", user_id)
        .fetch_optional()
        .await?;

    let Some(comment) = comment else {
        return Ok(None);
    };
    client
        .table("post_comments", Some(token))
        .eq("id", comment_id)
        .eq("user_id", user_id)
        .delete()
        .await?;
    Ok(Some(comment.post_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn post(id: Uuid, author: Option<AuthorSummary>) -> Post {
        Post {
            id,
            user_id: Uuid::new_v4(),
            title: "Indigo dyeing".into(),
            content: "Three dips".into(),
            image_url: None,
            created_at: Utc::now(),
            profiles: author,
        }
    }

    #[test]
    fn cards_count_likes_and_comments_per_post() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let likes = vec![
            PostLike { post_id: a, user_id: me },
            PostLike { post_id: a, user_id: other },
            PostLike { post_id: b, user_id: other },
        ];
        let comments = vec![b, b, b];

        let cards = build_cards(vec![post(a, None), post(b, None)], &likes, &comments, Some(me));
        assert_eq!(cards.len(), 2);
        assert_eq!((cards[0].like_count, cards[0].comment_count, cards[0].liked_by_me), (2, 0, true));
        assert_eq!((cards[1].like_count, cards[1].comment_count, cards[1].liked_by_me), (1, 3, false));
    }

    #[test]
    fn anonymous_viewer_likes_nothing_and_missing_author_defaults() {
        let a = Uuid::new_v4();
        let likes = vec![PostLike { post_id: a, user_id: Uuid::new_v4() }];
        let cards = build_cards(vec![post(a, None)], &likes, &[], None);
        assert!(!cards[0].liked_by_me);
        assert_eq!(cards[0].author.display_name(), "Anonymous User");
    }

    #[test]
    fn embedded_author_is_used_for_the_card() {
        let author = AuthorSummary { username: Some("weaver".into()), ..Default::default() };
        let cards = build_cards(vec![post(Uuid::new_v4(), Some(author))], &[], &[], None);
        assert_eq!(cards[0].author.display_name(), "weaver");
    }
}
