use serde::Deserialize;
use thiserror::Error;

/// SQLSTATE codes that mean "try again, nothing was committed".
const TRANSIENT_SQLSTATES: &[&str] = &["40001", "40P01", "55P03", "57014", "53300"];

/// SQLSTATE codes that reject the write because of current state.
const CONFLICT_SQLSTATES: &[&str] = &["23505", "23P01", "PT409"];

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("Transient database failure: {0}")]
    Transient(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, code: Option<String>, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl DatabaseError {
    /// Classify a non-success PostgREST response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<PostgrestError> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|e| e.code.clone());
        let message = parsed
            .as_ref()
            .map(|e| match (&e.message, &e.details) {
                (Some(m), Some(d)) => format!("{} ({})", m, d),
                (Some(m), None) => m.clone(),
                (None, Some(d)) => d.clone(),
                (None, None) => body.to_string(),
            })
            .unwrap_or_else(|| body.to_string());

        if let Some(code) = code.as_deref() {
            if TRANSIENT_SQLSTATES.contains(&code) {
                return DatabaseError::Transient(message);
            }
            if CONFLICT_SQLSTATES.contains(&code) {
                return DatabaseError::Conflict { code: code.to_string(), message };
            }
            if code == "PT404" {
                return DatabaseError::NotFound(message);
            }
        }

        match status {
            401 | 403 => DatabaseError::Auth(message),
            404 => DatabaseError::NotFound(message),
            409 => DatabaseError::Conflict {
                code: code.unwrap_or_else(|| "409".to_string()),
                message,
            },
            408 | 429 | 502 | 503 | 504 => DatabaseError::Transient(message),
            _ => DatabaseError::Api { status, code, message },
        }
    }

    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            DatabaseError::Conflict { code, .. } => Some(code.as_str()),
            DatabaseError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Transient(_))
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatabaseError::Decode(err.to_string())
        } else {
            // timeouts, refused connections and dropped bodies can all be retried
            DatabaseError::Transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Decode(err.to_string())
    }
}
