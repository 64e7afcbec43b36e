use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use cnn_classifier::config::manager::ConfigurationManager;
use cnn_classifier::config::server::ServerConfig;
use cnn_classifier::pipeline::runtime::DefaultLoader;
use cnn_classifier::pipeline::PredictionPipeline;
use cnn_classifier::routes::{configure_routes, cors, AppState};
use cnn_classifier::training::TrainingService;
use cnn_classifier::utils::common::create_directories;
use std::env;
use std::io;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", context, err);
    io::Error::other(format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let server_config =
        ServerConfig::from_env().map_err(|e| startup_error("Invalid server configuration", e))?;

    // The pipeline YAML is optional for serving; without it the environment
    // and built-in defaults decide the model path and input size.
    let training_config = if server_config.config_file.exists() && server_config.params_file.exists() {
        let manager = ConfigurationManager::new(&server_config.config_file, &server_config.params_file)
            .map_err(|e| startup_error("Failed to read pipeline configuration", e))?;
        Some(
            manager
                .get_training_config()
                .map_err(|e| startup_error("Invalid training configuration", e))?,
        )
    } else {
        log::warn!(
            "Pipeline configuration {} / {} not found, using defaults",
            server_config.config_file.display(),
            server_config.params_file.display()
        );
        None
    };

    let (model_path, input_size) = server_config.resolve_model(training_config.as_ref());
    if !model_path.exists() {
        log::warn!(
            "Model artifact {} does not exist yet; /predict fails until training has run",
            model_path.display()
        );
    }

    create_directories(&[&server_config.upload_dir])
        .map_err(|e| startup_error("Failed to create upload directory", e))?;

    let training = TrainingService::new(&server_config.train_command)
        .map_err(|e| startup_error("Invalid TRAIN_COMMAND", e))?;

    log::info!("Model: {} (input {}x{})", model_path.display(), input_size.0, input_size.1);
    log::info!("Uploads: {}", server_config.upload_dir.display());
    log::info!("Training command: {}", training.command_line());

    let state = web::Data::new(AppState {
        pipeline: PredictionPipeline::new(model_path, input_size, Box::new(DefaultLoader::default())),
        training,
        upload_dir: server_config.upload_dir.clone(),
        template_dir: server_config.template_dir.clone(),
    });
    let static_dir = server_config.static_dir.clone();

    log::warn!("CORS allows any origin, method and header; restrict it before exposing the service");
    let bind_address = server_config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(cors())
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
