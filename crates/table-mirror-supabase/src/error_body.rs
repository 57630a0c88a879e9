use serde::Deserialize;

/// Error body returned by PostgREST for non-2xx responses.
/// `{"code": "42P01", "message": "...", "details": null, "hint": null}`
#[derive(Debug, Deserialize)]
pub struct PostgrestError {
    pub code: Option<String>,
    pub message: String,
    pub details: Option<String>,
    pub hint: Option<String>,
}

/// Longest raw body echoed into an error message.
const MAX_RAW_BODY: usize = 512;

impl PostgrestError {
    /// Summarize an error response body for logging. Falls back to the raw
    /// (truncated) body when it isn't a PostgREST error object.
    pub fn describe(body: &str) -> String {
        match serde_json::from_str::<PostgrestError>(body) {
            Ok(err) => {
                let mut text = err.message;
                if let Some(code) = err.code {
                    text.push_str(&format!(" ({code})"));
                }
                if let Some(hint) = err.hint {
                    text.push_str(&format!("; hint: {hint}"));
                }
                text
            }
            Err(_) => {
                let trimmed = body.trim();
                match trimmed.char_indices().nth(MAX_RAW_BODY) {
                    Some((cut, _)) => format!("{}...", &trimmed[..cut]),
                    None => trimmed.to_owned(),
                }
            }
        }
    }
}
