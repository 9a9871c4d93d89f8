use crate::config::Config;
use crate::helper::notification_helpers::{error_redirect, redirect, success_redirect};
use crate::helper::{settings_helpers, template_helpers};
use crate::middleware::{clear_session, store_session, CurrentSettings, MaybeUser};
use crate::models::db_operations::auth_operations;
use crate::models::forms::{validate_password, EmailForm, NewPasswordForm, SignInForm, SignUpForm};
use crate::models::AuthSession;
use crate::AppState;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use tera::Tera;

/// Parameters a confirmation or recovery link carries once the page script has
/// moved them out of the URL fragment.
#[derive(Deserialize, Default)]
pub struct LinkQuery {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
}

impl LinkQuery {
    fn tokens(&self) -> Option<(&str, &str)> {
        let access = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some((access, self.refresh_token.as_deref().unwrap_or("")))
    }

    fn has_error(&self) -> bool {
        self.error.is_some() || self.error_code.is_some() || self.error_description.is_some()
    }

    fn error_location(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in [
            ("error", &self.error),
            ("error_code", &self.error_code),
            ("error_description", &self.error_description),
        ] {
            if let Some(value) = value {
                serializer.append_pair(key, value);
            }
        }
        format!("/auth-error?{}", serializer.finish())
    }
}

#[derive(Deserialize)]
pub struct AuthPageQuery {
    mode: Option<String>,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth", web::get().to(show_auth_page))
        .route("/auth/sign-in", web::post().to(handle_sign_in))
        .route("/auth/sign-up", web::post().to(handle_sign_up))
        .route("/auth/sign-out", web::post().to(handle_sign_out))
        .route("/auth/confirm", web::get().to(confirm_email))
        .route("/auth-error", web::get().to(show_auth_error))
        .route("/forgot-password", web::get().to(show_forgot_password))
        .route("/forgot-password", web::post().to(handle_forgot_password))
        .route("/reset-password", web::get().to(show_reset_password))
        .route("/reset-password", web::post().to(handle_reset_password));
}

/// Friendly text for the error codes the auth service puts on failed links.
pub fn auth_error_message(error_code: Option<&str>, error_description: Option<&str>) -> String {
    let known = match error_code {
        Some("otp_expired") => Some("Your password reset or confirmation link has expired. Please request a new one."),
        Some("invalid_otp") => Some("The link you used is invalid. Please request a new one."),
        Some("access_denied") => Some("Access denied. Please try again or contact support."),
        _ => None,
    };
    match (known, error_description.filter(|d| !d.is_empty())) {
        (Some(message), _) => message.to_string(),
        (None, Some(description)) => description.replace('+', " "),
        (None, None) => "An unknown authentication error occurred.".to_string(),
    }
}

async fn show_auth_page(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    query: web::Query<AuthPageQuery>,
) -> impl Responder {
    if user.0.is_some() {
        return redirect("/");
    }
    let mut ctx = template_helpers::page_context(&session, &settings.0, None);
    ctx.insert("mode", if query.mode.as_deref() == Some("signup") { "signup" } else { "signin" });
    template_helpers::render(&tera, "auth/auth.html", &ctx)
}

/// Stores the session, then lets the remote settings row replace the device
/// settings when the user has one.
async fn begin_session(
    session: &Session,
    state: &AppState,
    config: &Config,
    auth: AuthSession,
    mut response: HttpResponse,
) -> HttpResponse {
    if let Err(e) = store_session(session, &auth) {
        log::error!("Failed to store session for {}: {}", auth.user_id, e);
        return error_redirect(session, "Login failed", "Could not start your session. Please try again.", "/auth");
    }
    if let Some(remote) = settings_helpers::load_remote(&state.baas, &auth).await {
        settings_helpers::attach(&mut response, &remote, config.use_secure_cookies);
    }
    response
}

async fn handle_sign_in(
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<SignInForm>,
) -> impl Responder {
    let form = form.into_inner();
    match auth_operations::sign_in_with_password(&state.baas, &form.email, &form.password).await {
        Ok(grant) => {
            let auth = AuthSession::from_grant(grant, Utc::now().timestamp());
            log::info!("User {} signed in", auth.user_id);
            let response = success_redirect(&session, "Welcome back!", "You've been logged in successfully.", "/");
            begin_session(&session, &state, &config, auth, response).await
        }
        Err(e) => {
            log::warn!("Sign-in failed for '{}': {}", form.email.trim(), e);
            error_redirect(&session, "Login failed", e.to_string(), "/auth")
        }
    }
}

async fn handle_sign_up(
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<SignUpForm>,
) -> impl Responder {
    let form = form.into_inner();
    if let Err(e) = form.validate() {
        return error_redirect(&session, "Sign up failed", e.to_string(), "/auth?mode=signup");
    }

    let redirect_to = config.redirect_url("/auth/confirm");
    match auth_operations::sign_up(&state.baas, &form.email, &form.password, &form.full_name, &form.username, &redirect_to).await {
        Ok(Some(grant)) => {
            // Projects without e-mail confirmation hand out a session right away.
            let auth = AuthSession::from_grant(grant, Utc::now().timestamp());
            log::info!("User {} signed up", auth.user_id);
            let response = success_redirect(&session, "Account created!", "Welcome to Artisan Stories.", "/");
            begin_session(&session, &state, &config, auth, response).await
        }
        Ok(None) => success_redirect(
            &session,
            "Account created!",
            "Please check your email to verify your account.",
            "/auth",
        ),
        Err(e) => {
            log::warn!("Sign-up failed for '{}': {}", form.email.trim(), e);
            error_redirect(&session, "Sign up failed", e.to_string(), "/auth?mode=signup")
        }
    }
}

async fn handle_sign_out(user: MaybeUser, session: Session, state: web::Data<AppState>) -> impl Responder {
    if let Some(token) = user.token() {
        // The local session ends regardless of what the auth service says.
        if let Err(e) = auth_operations::sign_out(&state.baas, token).await {
            log::warn!("Remote sign-out failed: {}", e);
        }
    }
    clear_session(&session);
    redirect("/auth")
}

async fn confirm_email(
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    query: web::Query<LinkQuery>,
) -> impl Responder {
    if query.has_error() {
        return redirect(&query.error_location());
    }
    let Some((access, refresh)) = query.tokens() else {
        // The tokens are still in the fragment; the page script reloads with them.
        let ctx = template_helpers::page_context(&session, &settings.0, None);
        return template_helpers::render(&tera, "auth/confirm.html", &ctx);
    };

    match auth_operations::establish_from_link(&state.baas, access, refresh, query.expires_in, Utc::now().timestamp()).await {
        Ok(auth) => {
            log::info!("User {} confirmed their e-mail", auth.user_id);
            let response = success_redirect(&session, "Email confirmed!", "Your account has been activated successfully.", "/");
            begin_session(&session, &state, &config, auth, response).await
        }
        Err(e) => {
            log::warn!("E-mail confirmation failed: {}", e);
            error_redirect(&session, "Confirmation failed", e.to_string(), "/auth")
        }
    }
}

async fn show_auth_error(
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    query: web::Query<LinkQuery>,
) -> impl Responder {
    let mut ctx = template_helpers::page_context(&session, &settings.0, None);
    ctx.insert(
        "error_message",
        &auth_error_message(query.error_code.as_deref(), query.error_description.as_deref()),
    );
    ctx.insert("error_detail", query.error.as_deref().unwrap_or(""));
    template_helpers::render(&tera, "auth/error.html", &ctx)
}

async fn show_forgot_password(settings: CurrentSettings, session: Session, tera: web::Data<Tera>) -> impl Responder {
    let ctx = template_helpers::page_context(&session, &settings.0, None);
    template_helpers::render(&tera, "auth/forgot_password.html", &ctx)
}

async fn handle_forgot_password(
    session: Session,
    state: web::Data<AppState>,
    config: web::Data<Config>,
    form: web::Form<EmailForm>,
) -> impl Responder {
    let email = form.email.trim();
    if email.is_empty() {
        return error_redirect(&session, "Error", "Please enter your email address.", "/forgot-password");
    }
    let redirect_to = config.redirect_url("/reset-password");
    match auth_operations::request_password_reset(&state.baas, email, &redirect_to).await {
        Ok(()) => success_redirect(
            &session,
            "Email sent!",
            "Check your email for password reset instructions.",
            "/forgot-password",
        ),
        Err(e) => {
            log::warn!("Password reset request failed: {}", e);
            error_redirect(&session, "Error", e.to_string(), "/forgot-password")
        }
    }
}

async fn show_reset_password(
    user: MaybeUser,
    settings: CurrentSettings,
    session: Session,
    tera: web::Data<Tera>,
    state: web::Data<AppState>,
    query: web::Query<LinkQuery>,
) -> impl Responder {
    if query.has_error() {
        return redirect(&query.error_location());
    }
    if let Some((access, refresh)) = query.tokens() {
        return match auth_operations::establish_from_link(&state.baas, access, refresh, query.expires_in, Utc::now().timestamp()).await {
            Ok(auth) => match store_session(&session, &auth) {
                // Reload without the tokens in the address bar.
                Ok(()) => redirect("/reset-password"),
                Err(e) => {
                    log::error!("Failed to store recovery session: {}", e);
                    error_redirect(&session, "Error", "Could not start your session. Please try again.", "/forgot-password")
                }
            },
            Err(e) => {
                log::warn!("Recovery link rejected: {}", e);
                error_redirect(&session, "Error", e.to_string(), "/forgot-password")
            }
        };
    }

    let mut ctx = template_helpers::page_context(&session, &settings.0, user.session());
    ctx.insert("has_session", &user.0.is_some());
    template_helpers::render(&tera, "auth/reset_password.html", &ctx)
}

async fn handle_reset_password(
    user: MaybeUser,
    session: Session,
    state: web::Data<AppState>,
    form: web::Form<NewPasswordForm>,
) -> impl Responder {
    let form = form.into_inner();
    if let Err(e) = validate_password(&form.password, &form.confirm_password) {
        return error_redirect(&session, "Invalid password", e.to_string(), "/reset-password");
    }

    let auth = match user.0 {
        Some(auth) => auth,
        None => {
            let access = form.access_token.as_deref().unwrap_or("");
            let refresh = form.refresh_token.as_deref().unwrap_or("");
            match auth_operations::establish_from_link(&state.baas, access, refresh, None, Utc::now().timestamp()).await {
                Ok(auth) => auth,
                Err(e) => {
                    log::warn!("Password reset without a usable session: {}", e);
                    return error_redirect(
                        &session,
                        "Error",
                        "Your reset link is invalid or has expired. Please request a new one.",
                        "/forgot-password",
                    );
                }
            }
        }
    };

    match auth_operations::update_password(&state.baas, &auth.access_token, &form.password).await {
        Ok(()) => {
            if let Err(e) = store_session(&session, &auth) {
                log::error!("Failed to store session after password reset: {}", e);
            }
            success_redirect(&session, "Password updated!", "Your password has been successfully reset.", "/")
        }
        Err(e) => {
            log::warn!("Password update for {} failed: {}", auth.user_id, e);
            error_redirect(&session, "Error", e.to_string(), "/reset-password")
        }
    }
}
