pub mod backend_types;
pub mod detection_types;
pub mod request_types;
pub mod results_types;
pub mod view_types;
