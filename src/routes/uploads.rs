use crate::config::Config;
use crate::helper::form_helpers::read_multipart;
use crate::helper::upload_helpers::{self, UploadError, UploadRules};
use crate::middleware::AuthenticatedUser;
use crate::routes::ApiResponse;
use crate::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct UploadedUrls {
    pub urls: Vec<String>,
}

pub fn config_uploads(cfg: &mut web::ServiceConfig) {
    cfg.route("/upload", web::post().to(upload_action));
}

/// Stores every file sent under `file` or `files` and answers with their public URLs.
async fn upload_action(
    user: AuthenticatedUser,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    payload: Multipart,
) -> HttpResponse {
    let rules = UploadRules::from_config(&config);
    let form = match read_multipart(payload, &rules).await {
        Ok(form) => form,
        Err(e) => return rejected(e),
    };

    let files: Vec<_> = form
        .into_all_files()
        .into_iter()
        .filter(|f| f.field_name == "file" || f.field_name == "files")
        .collect();
    if files.is_empty() {
        return rejected(UploadError::NoFile);
    }

    match upload_helpers::store_files(&state.baas, user.token(), user.id(), files).await {
        Ok(urls) => {
            log::info!("User {} uploaded {} file(s)", user.id(), urls.len());
            HttpResponse::Ok().json(ApiResponse::ok(UploadedUrls { urls }))
        }
        Err(e) => {
            log::error!("Upload for {} failed: {}", user.id(), e);
            rejected(e)
        }
    }
}

fn rejected(error: UploadError) -> HttpResponse {
    match error {
        UploadError::Storage(_) => HttpResponse::BadGateway().json(ApiResponse::<()>::err(error.to_string())),
        _ => HttpResponse::BadRequest().json(ApiResponse::<()>::err(error.to_string())),
    }
}
