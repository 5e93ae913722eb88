// Copyright © 2025 the MailStash authors
// Licensed under the MIT License

use crate::modules::common::log::Tracing;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::handler::error_handler;
use crate::modules::error::MailStashResult;
use crate::modules::{settings::cli::SETTINGS, utils::shutdown::shutdown_signal};

use super::error::ApiErrorResponse;
use crate::raise_error;
use api::create_openapi_service;
use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Cors};
use poem::{EndpointExt, Route, Server};
use std::time::Duration;

pub mod api;
pub mod response;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

const DESCRIPTION: &str = r#"
    MailStash aggregates electronic mail from multiple upstream mailbox providers
    into a single indexed, searchable local store.

    - Continuously mirrors folders and messages over IMAP or Microsoft Graph.
    - Maintains a full-text search index over the mirrored corpus.
    - Exposes everything through a uniform authenticated REST API.
"#;

pub async fn start_http_server() -> MailStashResult<()> {
    let listener = TcpListener::bind((
        SETTINGS
            .mailstash_bind_ip
            .clone()
            .unwrap_or("0.0.0.0".into()),
        SETTINGS.mailstash_http_port as u16,
    ));

    let api_service = create_openapi_service()
        .description(DESCRIPTION)
        .summary("Multi-provider mailbox mirror with full-text search");

    let swagger = api_service.swagger_ui();
    let spec_json = api_service.spec_endpoint();

    let open_api_route = Route::new()
        .nest_no_strip("/api/v1", api_service)
        .with(Tracing);

    let mut cors_origins = SETTINGS.mailstash_cors_origins.clone();
    if cors_origins.is_empty() {
        cors_origins = ["*".to_string()].into_iter().collect();
    }

    let cors = Cors::new()
        .allow_origins(cors_origins)
        .allow_credentials(true)
        .allow_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS", "HEAD"])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .max_age(SETTINGS.mailstash_cors_max_age);

    let route = Route::new()
        .nest("/api-docs/swagger", swagger)
        .nest("/api-docs/spec.json", spec_json)
        .nest_no_strip("/api/v1", open_api_route)
        .with(cors)
        .with(CatchPanic::new());

    let server = Server::new(listener)
        .name("MailStash API Service")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            route.catch_all_error(error_handler),
            shutdown_signal(),
            Some(Duration::from_secs(5)),
        );
    println!(
        "MailStash API Service is now running on port {}.",
        SETTINGS.mailstash_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}
