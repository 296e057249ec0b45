use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;

mod clients;
mod config;
mod error;
mod handlers;
mod models;
mod routes;
mod streaming;
mod utils;
mod validation;

use crate::clients::anthropic_client::AnthropicClient;
use crate::config::AppSettings;
use crate::routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load application settings
    let app_settings = match AppSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    // One long-lived upstream client, shared by all requests
    let anthropic_client = match AnthropicClient::new(&app_settings) {
        Ok(client) => {
            log::info!("Anthropic client initialized successfully");
            web::Data::new(client)
        }
        Err(e) => {
            log::error!("Failed to initialize Anthropic client: {}", e);
            log::error!("Cannot start server without a working upstream client");
            std::process::exit(1);
        }
    };

    let host = &app_settings.server.host;
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let listener = TcpListener::bind(format!("{}:{}", host, port))?;

    HttpServer::new(move || {
        let app_settings = app_settings.clone();

        // Configure CORS using actix-cors
        let mut cors = Cors::default();
        if app_settings.server.cors_origins.contains(&"*".to_string()) {
            cors = cors.allow_any_origin();
        } else {
            for origin in &app_settings.server.cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header();

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(app_settings.clone()))
            .app_data(anthropic_client.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .run()
    .await
}
