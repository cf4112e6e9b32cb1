// src/main.rs
use actix_web::{App, HttpServer, middleware, web};
use anyhow::Context;
use log::info;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod errors;
mod handlers;
mod models;
mod services;

use crate::config::Config;
use crate::services::analysis_client::build_analyzer;
use crate::services::{Analyzer, ImageProcessor, ItemStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionStore>,
    items: Arc<ItemStore>,
    analyzer: Arc<dyn Analyzer>,
    image_processor: Arc<ImageProcessor>,
    notification: Duration,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    info!("Starting consign-guard service...");

    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize services
    let analyzer = build_analyzer(&config.classifier).context("Failed to build classifier client")?;
    info!(
        "Classifier at {} using {:?} protocol",
        config.classifier.base_url,
        analyzer.protocol()
    );

    let items = if config.seed_demo_items {
        ItemStore::with_demo_items()
    } else {
        ItemStore::new()
    };

    let app_state = AppState {
        sessions: Arc::new(SessionStore::new()),
        items: Arc::new(items),
        analyzer,
        image_processor: Arc::new(ImageProcessor::new(config.max_image_dimension)),
        notification: config.notification,
    };

    info!("Starting HTTP server on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(handlers::routes)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("Failed to bind {}", config.bind_addr))?
    .run()
    .await
    .context("HTTP server error")
}
