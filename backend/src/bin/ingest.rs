//! Data ingestion stage: downloads the dataset archive named in
//! `config/config.yaml` and unpacks it for the training process.

use cnn_classifier::components::data_ingestion::DataIngestion;
use cnn_classifier::config::manager::ConfigurationManager;
use cnn_classifier::config::server::ServerConfig;
use std::process::ExitCode;

const STAGE_NAME: &str = "Data Ingestion stage";

#[actix_web::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    log::info!(">>>>>> stage {} started <<<<<<", STAGE_NAME);
    match run().await {
        Ok(()) => {
            log::info!(">>>>>> stage {} completed <<<<<<", STAGE_NAME);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{} failed: {}", STAGE_NAME, e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let server_config = ServerConfig::from_env()?;
    let manager = ConfigurationManager::new(&server_config.config_file, &server_config.params_file)?;
    let ingestion = DataIngestion::new(manager.get_data_ingestion_config()?);
    ingestion.download_file().await?;
    ingestion.extract_zip_file()?;
    Ok(())
}
