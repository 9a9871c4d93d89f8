use crate::helper::{notification_helpers, template_helpers, video_embed};
use crate::middleware::{CurrentSettings, MaybeUser};
use crate::models::db_operations::posts_db_operations;
use crate::models::{Notification, PostCard};
use crate::routes::ApiResponse;
use crate::AppState;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use tera::Tera;

#[derive(Deserialize)]
pub struct EmbedPreviewQuery {
    #[serde(default)]
    text: String,
}

/// The detected video links alongside the placeholder form of the text.
#[derive(Serialize, Debug)]
pub struct EmbedPreview {
    pub has_videos: bool,
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub processed: video_embed::ProcessedText,
}

impl EmbedPreview {
    fn of(text: &str) -> Self {
        let processed = video_embed::replace_video_urls(text);
        Self { has_videos: processed.has_videos(), urls: video_embed::find_video_urls(text), processed }
    }
}

pub fn config_pages(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(show_feed))
        .route("/about", web::get().to(show_about));
}

pub fn config_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .route("/embed/preview", web::get().to(embed_preview))
            .route("/embed/preview", web::post().to(embed_preview_json))
            .route("/posts", web::get().to(get_feed)),
    );
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok("active"))
}

async fn show_feed(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let cards = match posts_db_operations::fetch_feed(&state.baas, user.token(), user.id()).await {
        Ok(cards) => cards,
        Err(e) => {
            log::error!("Failed to load feed: {}", e);
            notification_helpers::flash(&session, Notification::error("Error loading posts", e.to_string()));
            Vec::new()
        }
    };

    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("cards", &cards);
    template_helpers::render(&tera, "posts/feed.html", &ctx)
}

async fn show_about(user: MaybeUser, settings: CurrentSettings, session: Session, tera: web::Data<Tera>) -> impl Responder {
    let ctx = template_helpers::page_context(&session, &settings.0, user.session());
    template_helpers::render(&tera, "about.html", &ctx)
}

async fn get_feed(user: MaybeUser, state: web::Data<AppState>) -> impl Responder {
    match posts_db_operations::fetch_feed(&state.baas, user.token(), user.id()).await {
        Ok(cards) => HttpResponse::Ok().json(ApiResponse::ok(cards)),
        Err(e) => {
            log::error!("Failed to load feed for API: {}", e);
            HttpResponse::BadGateway().json(ApiResponse::<Vec<PostCard>>::err(e.to_string()))
        }
    }
}

/// What the create-post page shows while the author types.
async fn embed_preview(query: web::Query<EmbedPreviewQuery>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok(EmbedPreview::of(&query.text)))
}

async fn embed_preview_json(body: web::Json<EmbedPreviewQuery>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::ok(EmbedPreview::of(&body.text)))
}

/// Fallback for every unmatched path.
pub async fn not_found(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
) -> HttpResponse {
    let ctx = template_helpers::page_context(&session, &settings.0, user.session());
    let mut response = template_helpers::render(&tera, "not_found.html", &ctx);
    if response.status().is_success() {
        *response.status_mut() = actix_web::http::StatusCode::NOT_FOUND;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::template_helpers::register_filters;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use serde_json::Value;

    fn test_tera() -> Tera {
        let mut tera = Tera::default();
        register_filters(&mut tera);
        tera.add_raw_templates(vec![
            ("about.html", "<html lang=\"{{ lang }}\" data-theme=\"{{ theme }}\">About Artisan Stories</html>"),
            ("not_found.html", "<h1>Page not found</h1>"),
        ])
        .unwrap();
        tera
    }

    #[actix_web::test]
    async fn about_page_carries_device_settings() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_tera()))
                .configure(config_pages),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/about")
            .cookie(actix_web::cookie::Cookie::new("user-settings", r#"{"language":"fr","theme":"dark"}"#))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = actix_test::read_body(resp).await;
        let html = std::str::from_utf8(&body).unwrap();
        assert!(html.contains("lang=\"fr\""));
        assert!(html.contains("data-theme=\"dark\""));
    }

    #[actix_web::test]
    async fn unknown_paths_render_the_not_found_page() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(test_tera()))
                .configure(config_pages)
                .default_service(web::to(not_found)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/no/such/page").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = actix_test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("Page not found"));
    }

    #[actix_web::test]
    async fn embed_preview_reports_videos() {
        let app = actix_test::init_service(App::new().configure(config_api)).await;

        let req = actix_test::TestRequest::get()
            .uri("/api/embed/preview?text=Check%20https%3A%2F%2Fyoutu.be%2FdQw4w9WgXcQ%20now")
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["videos"][0]["platform"], "youtube");
        assert_eq!(body["data"]["videos"][0]["video_id"], "dQw4w9WgXcQ");
        assert_eq!(body["data"]["has_videos"], true);
        assert_eq!(body["data"]["urls"], serde_json::json!(["https://youtu.be/dQw4w9WgXcQ"]));

        let req = actix_test::TestRequest::post()
            .uri("/api/embed/preview")
            .set_json(serde_json::json!({ "text": "no links here" }))
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["data"]["text"], "no links here");
        assert_eq!(body["data"]["videos"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["has_videos"], false);
        assert!(body["data"]["urls"].as_array().unwrap().is_empty());
    }
}
