use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use artisan_stories::{
    config::Config,
    helper::template_helpers,
    middleware::SessionRefresh,
    models::db_operations::baas_client::BaasClient,
    routes::{auth, events, messages, posts, profile, public, store, uploads},
    AppState,
};
use clap::Parser;
use std::convert::TryFrom;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "artisan_server", author, version, about = "Starts the Artisan Stories web server.")]
struct Cli {
    /// Path to a .env file. Defaults to `.env` in the working directory when present.
    #[arg(long, value_name = "FILE")]
    env_file: Option<PathBuf>,
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::ACCEPT,
            actix_web::http::header::CONTENT_TYPE,
        ])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(cli.env_file.as_deref())
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = template_helpers::build_tera("templates/**/*.html")
        .expect("FATAL: Template initialization failed.");

    let baas = BaasClient::from_config(&config)
        .expect("FATAL: Failed to build the backend HTTP client.");
    let app_state = web::Data::new(AppState { baas });

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Artisan Stories starting at http://{} (backend {})", server_address, config.baas_url);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(SessionRefresh)
            .wrap(build_cors(&config.allowed_origins))
            .wrap(session_mw)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("Referrer-Policy", "strict-origin-when-cross-origin")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(tera.clone()))
            .app_data(app_state.clone())
            .configure(public::config_api)
            .configure(uploads::config_uploads)
            .service(actix_files::Files::new("/static", "./static"))
            .configure(public::config_pages)
            .configure(auth::config_auth)
            .configure(posts::config_posts)
            .configure(store::config_store)
            .configure(store::config_cart)
            .configure(profile::config_profile)
            .configure(events::config_events)
            .configure(messages::config_messages)
            .default_service(web::to(public::not_found))
    })
    .bind(server_address)?
    .run()
    .await
}
