use thiserror::Error;

/// Everything that can go wrong between loading the catalog and writing the
/// PDF. None of these end the clerk session.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("Catalog unavailable: {0}")]
    DataUnavailable(String),

    #[error("No '{column}' price for \"{item}\"")]
    ConfigurationMismatch { item: String, column: String },

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Amount {0} is too large to spell out")]
    RenderOverflow(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InvoiceError>;
