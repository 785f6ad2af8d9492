pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read catalog file at {path:?}.")]
	ReadCatalog { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse catalog: {source}")]
	ParseCatalog { source: serde_json::Error },
	#[error("{message}")]
	Validation { message: String },
}
