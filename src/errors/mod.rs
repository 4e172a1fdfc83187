pub mod auth_error;
pub mod pipeline_error;
