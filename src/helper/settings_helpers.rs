use crate::models::db_operations::baas_client::{BaasClient, BaasError};
use crate::models::db_operations::settings_db_operations;
use crate::models::settings::{UserSettings, SETTINGS_COOKIE};
use crate::models::AuthSession;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse};

/// Settings stored on this device, or the defaults.
pub fn read_local(req: &HttpRequest) -> UserSettings {
    req.cookie(SETTINGS_COOKIE)
        .map(|c| UserSettings::from_cookie_value(c.value()))
        .unwrap_or_default()
}

pub fn settings_cookie(settings: &UserSettings, secure: bool) -> Cookie<'static> {
    Cookie::build(SETTINGS_COOKIE, settings.to_cookie_value())
        .path("/")
        .max_age(CookieDuration::days(365))
        .same_site(SameSite::Lax)
        .http_only(true)
        .secure(secure)
        .finish()
}

/// Sets the settings cookie on an already built response.
pub fn attach(response: &mut HttpResponse, settings: &UserSettings, secure: bool) {
    if let Err(e) = response.add_cookie(&settings_cookie(settings, secure)) {
        log::error!("Failed to set settings cookie: {}", e);
    }
}

/// The remote row for a freshly signed-in user. `None` when the user has never
/// saved settings or the lookup failed; the local value stays in effect then.
pub async fn load_remote(client: &BaasClient, auth: &AuthSession) -> Option<UserSettings> {
    match settings_db_operations::fetch_settings_row(client, &auth.access_token, auth.user_id).await {
        Ok(row) => row.as_ref().map(UserSettings::from_row),
        Err(e) => {
            log::warn!("Could not load settings for {}: {}", auth.user_id, e);
            None
        }
    }
}

/// Remote half of saving settings. The caller writes the cookie regardless of
/// the outcome, so the device keeps the new value even if this fails.
pub async fn save_remote(
    client: &BaasClient,
    auth: Option<&AuthSession>,
    settings: &UserSettings,
) -> Result<(), BaasError> {
    match auth {
        Some(auth) => settings_db_operations::upsert_settings(client, &auth.access_token, auth.user_id, settings).await,
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{Language, Theme};
    use actix_web::test::TestRequest;

    #[test]
    fn missing_or_bad_cookie_reads_as_defaults() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(read_local(&req), UserSettings::default());

        let req = TestRequest::default()
            .cookie(Cookie::new(SETTINGS_COOKIE, "%%%"))
            .to_http_request();
        assert_eq!(read_local(&req), UserSettings::default());
    }

    #[test]
    fn cookie_written_is_cookie_read() {
        let settings = UserSettings { language: Language::Fr, theme: Theme::Light };
        let cookie = settings_cookie(&settings, false);
        assert_eq!(cookie.path(), Some("/"));

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(read_local(&req), settings);
    }

    #[test]
    fn attach_adds_the_cookie_header() {
        let mut response = HttpResponse::SeeOther().finish();
        attach(&mut response, &UserSettings { language: Language::De, theme: Theme::Dark }, true);
        let cookie = response.cookies().find(|c| c.name() == SETTINGS_COOKIE).unwrap();
        assert_eq!(UserSettings::from_cookie_value(cookie.value()).language, Language::De);
        assert_eq!(cookie.secure(), Some(true));
    }

    #[actix_web::test]
    async fn anonymous_save_skips_the_backend() {
        let client = BaasClient::new("http://127.0.0.1:9", "anon").unwrap();
        assert!(save_remote(&client, None, &UserSettings::default()).await.is_ok());
    }
}
