pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Repository error: {message}")]
	Repository { message: String },
	#[error("Cache error: {message}")]
	Cache { message: String },
	#[error("Config error: {message}")]
	Config { message: String },
}
impl Error {
	/// Caller-facing text. Repository failures mean "retry later", never "rephrase".
	pub fn user_message(&self) -> &'static str {
		match self {
			Self::InvalidRequest { .. } => "The request options are invalid. Fix them and try again.",
			Self::Repository { .. } | Self::Cache { .. } | Self::Config { .. } =>
				"We could not evaluate your request right now. Please retry later.",
		}
	}
}

impl From<steer_domain::Error> for Error {
	fn from(err: steer_domain::Error) -> Self {
		Self::Config { message: err.to_string() }
	}
}
