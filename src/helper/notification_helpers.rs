use crate::models::Notification;
use actix_session::Session;
use actix_web::http::header::LOCATION;
use actix_web::HttpResponse;

const NOTIFICATIONS_KEY: &str = "notifications";

/// Queues a toast for the next rendered page.
pub fn flash(session: &Session, notification: Notification) {
    let mut pending = session
        .get::<Vec<Notification>>(NOTIFICATIONS_KEY)
        .unwrap_or(None)
        .unwrap_or_default();
    pending.push(notification);
    if let Err(e) = session.insert(NOTIFICATIONS_KEY, pending) {
        log::error!("Failed to store notification in session: {}", e);
    }
}

/// Pending toasts, removed from the session.
pub fn take_notifications(session: &Session) -> Vec<Notification> {
    session
        .remove_as::<Vec<Notification>>(NOTIFICATIONS_KEY)
        .and_then(Result::ok)
        .unwrap_or_default()
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::SeeOther().append_header((LOCATION, location)).finish()
}

/// `candidate` when it is a path on this site, otherwise `fallback`.
pub fn local_target(candidate: Option<&str>, fallback: &str) -> String {
    match candidate.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path.to_string(),
        _ => fallback.to_string(),
    }
}

pub fn success_redirect(session: &Session, title: &str, message: &str, location: &str) -> HttpResponse {
    flash(session, Notification::success(title, message));
    redirect(location)
}

/// Error toast carrying the failure message verbatim.
pub fn error_redirect(session: &Session, title: &str, message: impl Into<String>, location: &str) -> HttpResponse {
    flash(session, Notification::error(title, message));
    redirect(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_session::SessionExt;
    use actix_web::test::TestRequest;

    #[test]
    fn flashed_notifications_are_taken_once() {
        let req = TestRequest::default().to_http_request();
        let session = req.get_session();

        flash(&session, Notification::success("Saved", "All good"));
        flash(&session, Notification::error("Oops", "Nope"));

        let taken = take_notifications(&session);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].r#type, "success");
        assert_eq!(taken[1].message, "Nope");
        assert!(take_notifications(&session).is_empty());
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert_eq!(local_target(Some("/posts/1"), "/"), "/posts/1");
        assert_eq!(local_target(Some("//evil.example"), "/"), "/");
        assert_eq!(local_target(Some("https://evil.example"), "/store"), "/store");
        assert_eq!(local_target(Some("/\\evil.example"), "/"), "/");
        assert_eq!(local_target(None, "/cart"), "/cart");
    }

    #[test]
    fn redirects_use_see_other() {
        let response = redirect("/store");
        assert_eq!(response.status(), actix_web::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/store");
    }
}
