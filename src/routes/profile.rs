use crate::config::Config;
use crate::helper::notification_helpers::{self, error_redirect, success_redirect};
use crate::helper::{settings_helpers, template_helpers};
use crate::middleware::{AuthenticatedUser, CurrentSettings, MaybeUser};
use crate::models::db_operations::profiles_db_operations;
use crate::models::forms::{ProfileUpdate, SearchQuery, SettingsForm};
use crate::models::settings::{Language, Theme, UserSettings};
use crate::models::Notification;
use crate::AppState;
use actix_session::Session;
use actix_web::{web, Responder};
use tera::Tera;
use uuid::Uuid;

pub fn config_profile(cfg: &mut web::ServiceConfig) {
    cfg.route("/profile", web::get().to(show_profile))
        .route("/profile", web::post().to(update_profile_action))
        .route("/settings", web::get().to(show_settings))
        .route("/settings", web::post().to(save_settings_action))
        .route("/people", web::get().to(show_people))
        .route("/people/{id}", web::get().to(show_person));
}

async fn show_profile(
    user: AuthenticatedUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let profile = match profiles_db_operations::fetch_profile(&state.baas, Some(user.token()), user.id()).await {
        Ok(profile) => profile,
        Err(e) => {
            log::error!("Failed to load profile of {}: {}", user.id(), e);
            notification_helpers::flash(&session, Notification::error("Error loading profile", e.to_string()));
            None
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, Some(user.session()));
    ctx.insert("profile", &profile);
    template_helpers::render(&tera, "profile/profile.html", &ctx)
}

async fn update_profile_action(
    user: AuthenticatedUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<ProfileUpdate>,
) -> impl Responder {
    match profiles_db_operations::update_profile(&state.baas, user.token(), user.id(), &form).await {
        Ok(()) => success_redirect(&session, "Profile updated", "Your profile has been successfully updated.", "/profile"),
        Err(e) => {
            log::error!("Failed to update profile of {}: {}", user.id(), e);
            error_redirect(&session, "Error updating profile", e.to_string(), "/profile")
        }
    }
}

async fn show_settings(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
) -> impl Responder {
    let ctx = template_helpers::page_context(&session, &settings.0, user.session());
    template_helpers::render(&tera, "profile/settings.html", &ctx)
}

/// The cookie is written whatever happens remotely, so this device keeps the
/// new choice even when the account copy could not be updated.
async fn save_settings_action(
    user: MaybeUser,
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<SettingsForm>,
) -> impl Responder {
    let (Ok(language), Ok(theme)) = (form.language.parse::<Language>(), form.theme.parse::<Theme>()) else {
        return error_redirect(&session, "Error saving settings", "Unknown language or theme.", "/settings");
    };
    let settings = UserSettings { language, theme };

    let mut response = match settings_helpers::save_remote(&state.baas, user.session(), &settings).await {
        Ok(()) => success_redirect(
            &session,
            "Settings saved",
            "Your preferences have been updated successfully.",
            "/settings",
        ),
        Err(e) => {
            log::error!("Failed to store settings remotely: {}", e);
            error_redirect(&session, "Error saving settings", e.to_string(), "/settings")
        }
    };
    settings_helpers::attach(&mut response, &settings, config.use_secure_cookies);
    response
}

async fn show_people(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let term = query.q.as_deref().unwrap_or("").trim().to_string();
    let people = match profiles_db_operations::search_profiles(&state.baas, user.token(), &term).await {
        Ok(people) => people,
        Err(e) => {
            log::error!("People search for '{}' failed: {}", term, e);
            notification_helpers::flash(&session, Notification::error("Error searching profiles", e.to_string()));
            Vec::new()
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("q", &term);
    ctx.insert("people", &people);
    template_helpers::render(&tera, "profile/people.html", &ctx)
}

async fn show_person(
    path: web::Path<Uuid>,
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
) -> impl Responder {
    let person_id = path.into_inner();
    let profile = match profiles_db_operations::fetch_profile(&state.baas, user.token(), person_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return error_redirect(&session, "Profile not found", "This person could not be found.", "/people"),
        Err(e) => {
            log::error!("Failed to load profile {}: {}", person_id, e);
            return error_redirect(&session, "Error loading profile", e.to_string(), "/people");
        }
    };
    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("is_self", &(user.id() == Some(profile.id)));
    ctx.insert("profile", &profile);
    template_helpers::render(&tera, "profile/person.html", &ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::baas_client::BaasClient;
    use crate::models::settings::SETTINGS_COOKIE;
    use actix_web::{http::StatusCode, test as actix_test, App};

    #[actix_web::test]
    async fn saving_settings_as_a_guest_sets_the_cookie() {
        let state = AppState { baas: BaasClient::new("http://127.0.0.1:9", "anon").unwrap() };
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(crate::config::tests::sample_config()))
                .app_data(web::Data::new(Tera::default()))
                .configure(config_profile),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/settings")
            .set_form([("language", "es"), ("theme", "dark")])
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);

        let cookie = resp.response().cookies().find(|c| c.name() == SETTINGS_COOKIE).unwrap();
        let stored = UserSettings::from_cookie_value(cookie.value());
        assert_eq!(stored, UserSettings { language: Language::Es, theme: Theme::Dark });
    }

    #[actix_web::test]
    async fn unknown_theme_is_rejected_without_a_cookie() {
        let state = AppState { baas: BaasClient::new("http://127.0.0.1:9", "anon").unwrap() };
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(crate::config::tests::sample_config()))
                .configure(config_profile),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/settings")
            .set_form([("language", "en"), ("theme", "neon")])
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert!(resp.response().cookies().all(|c| c.name() != SETTINGS_COOKIE));
    }
}
