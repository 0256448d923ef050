pub mod export_service;
pub mod inference_client;
pub mod intake_service;
pub mod results_service;
pub mod session;
