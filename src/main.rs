use std::time::Duration;

use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

#[macro_use]
extern crate diesel;

mod errors;
mod handlers;
mod models;
mod schema;
mod sweeper;
mod utils;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let port = std::env::var("PORT").unwrap_or("3000".to_string());
    let database_url = std::env::var("DATABASE_URL").expect("env DATABASE_URL");
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .build(manager)
        .expect("failed to create a pg pool");

    let mut connection = pool.get().expect("failed to get a connection for migrations");
    connection
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");
    drop(connection);

    let interval = std::env::var("CLEANUP_INTERVAL")
        .unwrap_or("300".to_string())
        .parse::<u64>()
        .expect("CLEANUP_INTERVAL must be a positive integer");
    let sweeper = sweeper::Sweeper::start(pool.clone(), Duration::from_secs(interval));

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(60)
        .finish()
        .expect("invalid rate limiter configuration");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Governor::new(&governor_conf))
            .wrap(Logger::default())
            .route("/", web::get().to(handlers::index))
            .service(
                web::scope("/api")
                    .route(
                        "/check-password",
                        web::post().to(handlers::memo::check_password),
                    )
                    .route("/memo", web::post().to(handlers::memo::new))
                    .route("/memo/{password}", web::get().to(handlers::memo::get))
                    .route("/memo/{password}", web::put().to(handlers::memo::update))
                    .route("/memo/{password}", web::delete().to(handlers::memo::del)),
            )
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await;

    sweeper.stop();
    server
}
