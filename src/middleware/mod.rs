use actix_web::{
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::InternalError,
    http::header::{ACCEPT, LOCATION},
    web, Error, FromRequest, HttpRequest, HttpResponse,
};
use actix_session::{Session, SessionExt};
use chrono::Utc;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use serde_json::json;
use std::future::{ready, Ready as StdReady};
use std::rc::Rc;
use uuid::Uuid;

use crate::helper::{notification_helpers, settings_helpers};
use crate::models::db_operations::auth_operations;
use crate::models::settings::UserSettings;
use crate::models::{AuthSession, Notification};
use crate::AppState;

pub const AUTH_SESSION_KEY: &str = "auth";

pub fn current_session(session: &Session) -> Option<AuthSession> {
    session.get::<AuthSession>(AUTH_SESSION_KEY).unwrap_or(None)
}

pub fn store_session(session: &Session, auth: &AuthSession) -> Result<(), Error> {
    session.renew();
    session
        .insert(AUTH_SESSION_KEY, auth)
        .map_err(actix_web::error::ErrorInternalServerError)
}

pub fn clear_session(session: &Session) {
    session.remove(AUTH_SESSION_KEY);
}

/// A signed-in user. Page requests without a session are sent to `/auth`,
/// JSON callers get a 401.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub AuthSession);

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }

    pub fn token(&self) -> &str {
        &self.0.access_token
    }

    pub fn session(&self) -> &AuthSession {
        &self.0
    }
}

fn wants_json(req: &HttpRequest) -> bool {
    let path = req.path();
    path.starts_with("/api/")
        || path == "/upload"
        || path.ends_with("/events")
        || req
            .headers()
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains("application/json"))
}

fn not_signed_in(req: &HttpRequest) -> Error {
    if wants_json(req) {
        let body = HttpResponse::Unauthorized().json(json!({
            "success": false,
            "data": null,
            "error": "Not signed in."
        }));
        return InternalError::from_response("Not signed in.", body).into();
    }
    notification_helpers::flash(
        &req.get_session(),
        Notification::error("Please sign in", "You need to be signed in to continue."),
    );
    let redirect = HttpResponse::SeeOther().append_header((LOCATION, "/auth")).finish();
    InternalError::from_response("Not signed in.", redirect).into()
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match current_session(&req.get_session()) {
            Some(auth) => ready(Ok(AuthenticatedUser(auth))),
            None => ready(Err(not_signed_in(req))),
        }
    }
}

/// The signed-in user if there is one.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthSession>);

impl MaybeUser {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|a| a.user_id)
    }

    pub fn token(&self) -> Option<&str> {
        self.0.as_ref().map(|a| a.access_token.as_str())
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.0.as_ref()
    }
}

impl FromRequest for MaybeUser {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(MaybeUser(current_session(&req.get_session()))))
    }
}

/// Language and theme of this device.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSettings(pub UserSettings);

impl FromRequest for CurrentSettings {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(Ok(CurrentSettings(settings_helpers::read_local(req))))
    }
}

/// Refreshes the stored access token when it is about to expire, before any
/// handler runs. A refresh the auth service rejects ends the session.
pub struct SessionRefresh;

impl<S, B> Transform<S, ServiceRequest> for SessionRefresh
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionRefreshMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionRefreshMiddleware { service: Rc::new(service) })
    }
}

pub struct SessionRefreshMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionRefreshMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let session = req.get_session();
            let now = Utc::now().timestamp();

            if let Some(auth) = current_session(&session).filter(|a| a.needs_refresh(now)) {
                match req.app_data::<web::Data<AppState>>() {
                    Some(state) => match auth_operations::refresh(&state.baas, &auth.refresh_token).await {
                        Ok(grant) => {
                            let refreshed = AuthSession::from_grant(grant, now);
                            if let Err(e) = session.insert(AUTH_SESSION_KEY, &refreshed) {
                                log::error!("Failed to store refreshed session: {}", e);
                            }
                            log::debug!("Refreshed session for {}", refreshed.user_id);
                        }
                        Err(e) => {
                            log::warn!("Session refresh for {} failed, signing out: {}", auth.user_id, e);
                            clear_session(&session);
                        }
                    },
                    None => log::error!("AppState missing; cannot refresh session."),
                }
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn sample_session() -> AuthSession {
        AuthSession {
            access_token: "token".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now().timestamp() + 3600,
            user_id: Uuid::new_v4(),
            email: Some("maker@example.com".into()),
        }
    }

    #[actix_web::test]
    async fn authenticated_user_reads_the_session() {
        let req = TestRequest::default().to_http_request();
        let auth = sample_session();
        store_session(&req.get_session(), &auth).unwrap();

        let user = AuthenticatedUser::extract(&req).await.unwrap();
        assert_eq!(user.id(), auth.user_id);
        assert_eq!(user.token(), "token");
    }

    #[actix_web::test]
    async fn pages_redirect_to_sign_in() {
        let req = TestRequest::with_uri("/cart").to_http_request();
        let err = AuthenticatedUser::extract(&req).await.unwrap_err();
        let response = err.error_response();
        assert_eq!(response.status(), actix_web::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/auth");
    }

    #[actix_web::test]
    async fn json_callers_get_unauthorized() {
        let req = TestRequest::with_uri("/upload").to_http_request();
        let err = AuthenticatedUser::extract(&req).await.unwrap_err();
        assert_eq!(err.error_response().status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn maybe_user_is_empty_when_signed_out() {
        let req = TestRequest::default().to_http_request();
        let user = MaybeUser::extract(&req).await.unwrap();
        assert!(user.id().is_none());

        clear_session(&req.get_session());
        assert!(current_session(&req.get_session()).is_none());
    }
}
