#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Generic {0}")]
    Generic(String),

    #[error("Invalid input {path}: {reason}")]
    InvalidInput { path: String, reason: String },

    #[error("Missing position: pass --x/--y or --nx/--ny")]
    MissingPosition,

    #[error("Document has no rows to match against")]
    NoRows,
}
