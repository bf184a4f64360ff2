use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Content source error: {0}")]
    Source(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl AppError {
    pub fn kind(&self) -> &str {
        match self {
            AppError::Http(_) => "http",
            AppError::Json(_) => "json",
            AppError::Audio(_) => "audio",
            AppError::Decode(_) => "decode",
            AppError::Source(_) => "source",
            AppError::Config(_) => "config",
            AppError::NotFound(_) => "not_found",
            AppError::Io(_) => "io",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_kind_and_message() {
        let err = AppError::Decode("no supported audio track".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "decode");
        assert_eq!(json["message"], "Decode error: no supported audio track");
    }
}
