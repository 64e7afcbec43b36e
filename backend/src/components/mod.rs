pub mod data_ingestion;
