use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid sector: {0}")]
    InvalidSector(String),

    #[error("Invalid entity class: {0}")]
    InvalidEntityClass(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
