use crate::config::Config;
use crate::helper::form_helpers::read_multipart;
use crate::helper::notification_helpers::{self, error_redirect, local_target, redirect, success_redirect};
use crate::helper::upload_helpers::{self, UploadRules};
use crate::helper::template_helpers;
use crate::middleware::{AuthenticatedUser, CurrentSettings, MaybeUser};
use crate::models::db_operations::posts_db_operations;
use crate::models::forms::{CommentForm, NewPost, PostEditForm};
use crate::models::Notification;
use crate::AppState;
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, Responder};
use serde::Deserialize;
use tera::Tera;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ReturnForm {
    return_to: Option<String>,
}

pub fn config_posts(cfg: &mut web::ServiceConfig) {
    cfg.route("/create-post", web::get().to(show_create_post))
        .route("/create-post", web::post().to(create_post_action))
        .route("/my-posts", web::get().to(show_my_posts))
        .route("/posts/{id}", web::get().to(show_post))
        .route("/posts/{id}/edit", web::get().to(show_edit_post))
        .route("/posts/{id}/edit", web::post().to(update_post_action))
        .route("/posts/{id}/delete", web::post().to(delete_post_action))
        .route("/posts/{id}/like", web::post().to(toggle_like_action))
        .route("/posts/{id}/comments", web::post().to(add_comment_action))
        .route("/comments/{id}/delete", web::post().to(delete_comment_action));
}

async fn show_create_post(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> impl Responder {
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("max_upload_size_mb", &config.max_upload_size_mb);
    ctx.insert("allowed_mime_types", &config.allowed_mime_types);
    template_helpers::render(&tera, "posts/create.html", &ctx)
}

/// Multipart so the image can arrive as a file; a file wins over a typed URL.
async fn create_post_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let form = match read_multipart(payload, &UploadRules::from_config(&config)).await {
        Ok(form) => form,
        Err(e) => return error_redirect(&session, "Upload failed", e.to_string(), "/create-post"),
    };

    let mut post = match NewPost::validate(form.text("title"), form.text("content"), form.optional_text("image_url")) {
        Ok(post) => post,
        Err(e) => return error_redirect(&session, "Error creating post", e.to_string(), "/create-post"),
    };

    if let Some(file) = form.into_files("image").into_iter().next() {
        match upload_helpers::store_file(&state.baas, user.token(), user.id(), file).await {
            Ok(url) => post.image_url = Some(url),
            Err(e) => {
                log::error!("Post image upload for {} failed: {}", user.id(), e);
                return error_redirect(&session, "Upload failed", e.to_string(), "/create-post");
            }
        }
    }

    match posts_db_operations::create_post(&state.baas, user.token(), user.id(), &post).await {
        Ok(created) => {
            log::info!("User {} published post {}", user.id(), created.id);
            success_redirect(&session, "Post created!", "Your post has been published successfully.", "/")
        }
        Err(e) => {
            log::error!("Failed to create post for {}: {}", user.id(), e);
            error_redirect(&session, "Error creating post", e.to_string(), "/create-post")
        }
    }
}

async fn show_my_posts(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let cards = match posts_db_operations::fetch_user_posts(&state.baas, user.token(), user.id()).await {
        Ok(cards) => cards,
        Err(e) => {
            log::error!("Failed to load posts of {}: {}", user.id(), e);
            notification_helpers::flash(&session, Notification::error("Error loading posts", e.to_string()));
            Vec::new()
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("cards", &cards);
    template_helpers::render(&tera, "posts/my_posts.html", &ctx)
}

async fn show_post(
    path: web::Path<Uuid>,
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let post_id = path.into_inner();
    let card = match posts_db_operations::fetch_post_card(&state.baas, user.token(), post_id, user.id()).await {
        Ok(Some(card)) => card,
        Ok(None) => return error_redirect(&session, "Post not found", "This post no longer exists.", "/"),
        Err(e) => {
            log::error!("Failed to load post {}: {}", post_id, e);
            return error_redirect(&session, "Error loading post", e.to_string(), "/");
        }
    };
    let comments = posts_db_operations::fetch_comments(&state.baas, user.token(), post_id)
        .await
        .unwrap_or_else(|e| {
            log::error!("Failed to load comments of {}: {}", post_id, e);
            notification_helpers::flash(&session, Notification::error("Error loading comments", e.to_string()));
            Vec::new()
        });

    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("card", &card);
    ctx.insert("comments", &comments);
    ctx.insert("is_owner", &(user.id() == Some(card.post.user_id)));
    template_helpers::render(&tera, "posts/detail.html", &ctx)
}

async fn show_edit_post(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let post_id = path.into_inner();
    match posts_db_operations::fetch_post(&state.baas, Some(user.token()), post_id).await {
        Ok(Some(post)) if post.user_id == user.id() => {
            let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
            ctx.insert("post", &post);
            template_helpers::render(&tera, "posts/edit.html", &ctx)
        }
        Ok(_) => error_redirect(&session, "Post not found", "You can only edit your own posts.", "/my-posts"),
        Err(e) => {
            log::error!("Failed to load post {} for editing: {}", post_id, e);
            error_redirect(&session, "Error loading post", e.to_string(), "/my-posts")
        }
    }
}

async fn update_post_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<PostEditForm>,
) -> impl Responder {
    let post_id = path.into_inner();
    let edit_url = format!("/posts/{}/edit", post_id);
    let post = match NewPost::validate(&form.title, &form.content, form.image_url.as_deref()) {
        Ok(post) => post,
        Err(e) => return error_redirect(&session, "Error updating post", e.to_string(), &edit_url),
    };
    match posts_db_operations::update_post(&state.baas, user.token(), user.id(), post_id, &post).await {
        Ok(()) => success_redirect(&session, "Post updated", "Your changes have been saved.", &format!("/posts/{}", post_id)),
        Err(e) => {
            log::error!("Failed to update post {}: {}", post_id, e);
            error_redirect(&session, "Error updating post", e.to_string(), &edit_url)
        }
    }
}

async fn delete_post_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
) -> impl Responder {
    let post_id = path.into_inner();
    match posts_db_operations::delete_post(&state.baas, user.token(), user.id(), post_id).await {
        Ok(()) => {
            log::info!("User {} deleted post {}", user.id(), post_id);
            success_redirect(&session, "Post deleted", "Your post has been removed.", "/my-posts")
        }
        Err(e) => {
            log::error!("Failed to delete post {}: {}", post_id, e);
            error_redirect(&session, "Error deleting post", e.to_string(), "/my-posts")
        }
    }
}

async fn toggle_like_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ReturnForm>,
) -> impl Responder {
    let post_id = path.into_inner();
    let back = local_target(form.return_to.as_deref(), &format!("/posts/{}", post_id));
    match posts_db_operations::toggle_like(&state.baas, user.token(), user.id(), post_id).await {
        Ok(liked) => {
            log::debug!("User {} {} post {}", user.id(), if liked { "liked" } else { "unliked" }, post_id);
            redirect(&back)
        }
        Err(e) => {
            log::error!("Failed to toggle like on {}: {}", post_id, e);
            error_redirect(&session, "Error", e.to_string(), &back)
        }
    }
}

async fn add_comment_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<CommentForm>,
) -> impl Responder {
    let post_id = path.into_inner();
    let back = format!("/posts/{}#comments", post_id);
    let content = form.content.trim();
    if content.is_empty() {
        return error_redirect(&session, "Error adding comment", "Please write a comment first.", &back);
    }
    match posts_db_operations::add_comment(&state.baas, user.token(), user.id(), post_id, content).await {
        Ok(()) => redirect(&back),
        Err(e) => {
            log::error!("Failed to comment on {}: {}", post_id, e);
            error_redirect(&session, "Error adding comment", e.to_string(), &back)
        }
    }
}

async fn delete_comment_action(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
) -> impl Responder {
    let comment_id = path.into_inner();
    match posts_db_operations::delete_comment(&state.baas, user.token(), user.id(), comment_id).await {
        Ok(Some(post_id)) => redirect(&format!("/posts/{}#comments", post_id)),
        Ok(None) => error_redirect(&session, "Comment not found", "You can only delete your own comments.", "/"),
        Err(e) => {
            log::error!("Failed to delete comment {}: {}", comment_id, e);
            error_redirect(&session, "Error deleting comment", e.to_string(), "/")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::header::LOCATION, http::StatusCode, test as actix_test, App};

    #[actix_web::test]
    async fn creating_a_post_requires_sign_in() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(Tera::default()))
                .app_data(web::Data::new(crate::config::tests::sample_config()))
                .configure(config_posts),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/create-post").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(LOCATION).unwrap(), "/auth");
    }
}
