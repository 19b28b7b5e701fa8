use std::io;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use mongodb::Client;
use tracing_subscriber::EnvFilter;

use crate::{settings::Settings, store::Store};

mod balance;
mod debts;
mod error;
mod exchange;
mod routes;
mod schemas;
mod settings;
mod split;
mod store;

fn init_tracing(level: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("splitsmart={level},actix_web={level}"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = Settings::new().map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid configuration (is MONGODB_URI set?): {err}"),
        )
    })?;
    init_tracing(&settings.log_level);
    tracing::debug!("Using the following URI: {}", settings.mongodb_uri);

    let client = Client::with_uri_str(&settings.mongodb_uri)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    tracing::info!(database = %settings.database, "connected to MongoDB");

    let store = Store::new(&client, &settings.database);
    store
        .ensure_indexes()
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    let policy = settings.settlement_policy();
    if policy == balance::SettlementPolicy::IncludeUnconfirmed {
        tracing::info!("unconfirmed settlements count towards balances");
    }

    tracing::info!(bind = %settings.bind, port = settings.port, "starting server");
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(policy))
            .configure(routes::configure)
    })
    .bind((settings.bind.as_str(), settings.port))?
    .run()
    .await
}
