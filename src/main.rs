use actix_web::{middleware::Logger, web::Data, App, HttpServer};
use log::{error, info};

use ideawheel_server::{config::Config, db::Database, modules, request_scope::RequestScope};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    if config.debug {
        info!("Debug mode enabled");
    }
    let bind_addr = config.bind_addr;

    // database
    let db = match Database::connect(&config.database_path).await {
        Ok(db) => {
            info!("Opened database at {}", config.database_path);
            db
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db.init().await {
        error!("Failed to apply schema: {}", e);
        std::process::exit(1);
    }

    let config = Data::new(config);
    let db: Data<Database> = Data::new(db);

    HttpServer::new(move || {
        App::new()
            // the logger is registered last so it wraps the request scope
            .wrap(RequestScope)
            .wrap(Logger::new("%{r}a %r -> %s in %Dms").log_target("http"))
            .app_data(Data::clone(&config))
            .app_data(Data::clone(&db))
            .configure(modules::configure_all)
    })
    .workers(2)
    .bind(bind_addr)?
    .run()
    .await
}
