use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use clap::Parser;
use postsmith::agent::TurnOrchestrator;
use postsmith::api::middleware::ApiKeyAuth;
use postsmith::cli::{commands::{Cli, Commands}, run_cli};
use postsmith::config::AppConfig;
use postsmith::db;
use std::sync::Arc;
use tracing::{error, info};

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve) {
        run_cli(cli.command, cli.config).await;
        return Ok(());
    }

    info!("Starting Postsmith Content Server...");

    let config = match AppConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match db::get_connection(&config.database) {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let orchestrator = match TurnOrchestrator::from_config(&config, db_pool.clone()) {
        Some(o) => Arc::new(o),
        None => {
            error!("Failed to initialize LLM provider from config.yaml mapping");
            std::process::exit(1);
        }
    };

    let host = config.server.host.clone();
    let port = config.server.port;

    info!("Server listening on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(orchestrator.clone()))
            .route("/health", web::get().to(health))
            .wrap(ApiKeyAuth)
            .configure(postsmith::api::routes::configure)
    })
    .bind((host, port))?
    .run()
    .await
}
