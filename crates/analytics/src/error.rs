use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Performance calculation failed: {0}")]
    Calculation(String),
}
