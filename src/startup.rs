use actix_files as fs;
use actix_multipart::form::{tempfile::TempFileConfig, MultipartFormConfig};
use actix_web::dev::Server;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::media_client::MediaClient;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    change_password, get_current_user, health_check, login, logout, refresh_access_token,
    register, update_account, update_avatar, update_cover_image,
};
use crate::security::{RateLimiterManager, SecurityHeaders};

/// Register and the image routes carry at most two files plus a few text fields
const MULTIPART_FIELDS_OVERHEAD: usize = 64 * 1024;

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    std::fs::create_dir_all(&settings.application.upload_dir)?;

    let media_client = MediaClient::from_settings(&settings.media)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    let connection = web::Data::new(connection);
    let jwt_config = settings.jwt.clone();
    let jwt_config_data = web::Data::new(settings.jwt.clone());
    let app_settings = web::Data::new(settings.application.clone());
    let media_client = web::Data::new(media_client);
    let rate_limiter = web::Data::new(RateLimiterManager::new(
        settings.security.login_attempts_per_minute,
    ));
    let upload_dir = settings.application.upload_dir.clone();
    let max_upload_bytes = settings.application.max_upload_bytes;

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::Invalid(err.to_string())).into()
        });
        let multipart_config = MultipartFormConfig::default()
            .total_limit(max_upload_bytes * 2 + MULTIPART_FIELDS_OVERHEAD)
            .error_handler(|err, _req| {
                AppError::Validation(ValidationError::Invalid(err.to_string())).into()
            });
        let temp_file_config = TempFileConfig::default().directory(&upload_dir);

        let security_headers = SecurityHeaders::get_headers()
            .into_iter()
            .fold(DefaultHeaders::new(), |headers, header| headers.add(header));

        App::new()
            // Global middleware
            .wrap(security_headers)
            .wrap(Logger::default())      // Standard access log
            .wrap(LoggerMiddleware)       // Request ids + timing

            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(app_settings.clone())
            .app_data(media_client.clone())
            .app_data(rate_limiter.clone())
            .app_data(json_config)
            .app_data(multipart_config)
            .app_data(temp_file_config)

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    // Public routes
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh-token", web::post().to(refresh_access_token))

                    // Protected routes (require JWT authentication)
                    .service(
                        web::scope("")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route("/logout", web::post().to(logout))
                            .route("/change-password", web::post().to(change_password))
                            .route("/current-user", web::get().to(get_current_user))
                            .route("/update-account", web::patch().to(update_account))
                            .route("/avatar", web::patch().to(update_avatar))
                            .route("/cover-image", web::patch().to(update_cover_image))
                    )
            )

            // Static file serving (must be last to not override API routes)
            .service(fs::Files::new("/", "./public").index_file("index.html"))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
