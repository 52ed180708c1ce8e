use threadsmith::{logger, server, Config, Pipeline};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init()?;
    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let config = Config::from_env()?;
    let host = config.host.clone();
    let port = config.bind_port();

    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &host, port);
    logger::log_config_info(&config);

    if let Some(missing) = config.missing_text_credentials() {
        log::warn!("⚠️  {} is not set, text tasks will fail until it is", missing);
    }

    let pipeline = Pipeline::from_config(config).await?;
    server::run(pipeline, &host, port).await?;

    Ok(())
}
