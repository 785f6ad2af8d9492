pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid pattern for {label}: {source}")]
	InvalidPattern { label: String, source: regex::Error },
}
