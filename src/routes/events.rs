use crate::middleware::{AuthenticatedUser, MaybeUser};
use crate::models::db_operations::messages_db_operations;
use crate::realtime::bridge;
use crate::routes::ApiResponse;
use crate::AppState;
use actix_web::{web, Either, HttpResponse, Responder};
use actix_web_lab::sse;
use std::time::Duration;
use tera::Tera;
use tokio::sync::mpsc;
use uuid::Uuid;

const EVENT_BUFFER: usize = 16;
const RETRY_AFTER: Duration = Duration::from_secs(5);

pub fn config_events(cfg: &mut web::ServiceConfig) {
    cfg.route("/events/posts", web::get().to(feed_events))
        .route("/messages/{id}/events", web::get().to(message_events));
}

/// An event-stream response fed by the returned sender. The stream ends once
/// every sender is dropped.
fn event_stream() -> (mpsc::Sender<sse::Event>, impl Responder) {
    let (sender, receiver) = mpsc::channel::<sse::Event>(EVENT_BUFFER);
    let stream = sse::Sse::from_infallible_receiver(receiver).with_retry_duration(RETRY_AFTER);
    (sender, stream)
}

/// Streams re-rendered feed fragments while the browser stays connected.
async fn feed_events(
    user: MaybeUser,
    state: web::Data<AppState>,
    tera: web::Data<Tera>,
) -> impl Responder {
    let (sender, stream) = event_stream();
    actix_web::rt::spawn(bridge::run_feed_bridge(state.baas.clone(), tera, user.0, sender));
    stream
}

async fn message_events(
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    tera: web::Data<Tera>,
) -> Either<HttpResponse, impl Responder> {
    let conversation_id = path.into_inner();
    let conversation = match messages_db_operations::fetch_conversation(&state.baas, user.token(), conversation_id, user.id()).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => {
            return Either::Left(HttpResponse::NotFound().json(ApiResponse::<()>::err("Conversation not found.")));
        }
        Err(e) => {
            log::error!("Failed to load conversation {} for events: {}", conversation_id, e);
            return Either::Left(HttpResponse::BadGateway().json(ApiResponse::<()>::err(e.to_string())));
        }
    };

    let (sender, stream) = event_stream();
    actix_web::rt::spawn(bridge::run_message_bridge(
        state.baas.clone(),
        tera,
        user.0,
        conversation,
        sender,
    ));
    Either::Right(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::baas_client::BaasClient;
    use actix_web::{http::header, http::StatusCode, test as actix_test, App};

    #[actix_web::test]
    async fn message_events_require_sign_in() {
        let app = actix_test::init_service(App::new().configure(config_events)).await;
        let req = actix_test::TestRequest::get()
            .uri(&format!("/messages/{}/events", Uuid::new_v4()))
            .insert_header((header::ACCEPT, "application/json"))
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn feed_events_open_an_event_stream_for_guests() {
        let state = AppState { baas: BaasClient::new("http://127.0.0.1:9", "anon").unwrap() };
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(Tera::default()))
                .configure(config_events),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/events/posts").to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"), "got {}", content_type);
    }

    #[actix_web::test]
    async fn queued_events_reach_the_stream_body() {
        let (sender, stream) = event_stream();
        sender.send(sse::Data::new("<li>hi</li>").event("feed").into()).await.unwrap();
        drop(sender);

        let req = actix_test::TestRequest::default().to_http_request();
        let resp = stream.respond_to(&req).map_into_boxed_body();
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("retry: 5000"));
        assert!(body.contains("event: feed"));
        assert!(body.contains("data: <li>hi</li>"));
    }
}
