#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid vector: {0}")]
	InvalidVector(String),
	#[error("Not found: {0}")]
	NotFound(String),
}
