use serde::{Deserialize, Serialize};

/// Body of the one POST the client makes per exchange. Placeholder tokens
/// travel literally inside `steps`; the content map never leaves the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateRequest {
    pub steps: String,
}

/// Optional JSON body of a non-success response.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorDetail {
    /// The message surfaced to the user: the server detail when present,
    /// else a generic one.
    pub fn message(&self) -> String {
        self.detail
            .clone()
            .unwrap_or_else(|| "An unknown error occurred.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_serializes_steps() {
        let req = GenerateRequest {
            steps: "Look [[code1]]".to_string(),
        };
        let json = serde_json::to_string(&req).expect("serialize");
        assert_eq!(json, r#"{"steps":"Look [[code1]]"}"#);
    }

    #[test]
    fn test_error_detail_present() {
        let detail: ErrorDetail =
            serde_json::from_str(r#"{"detail":"API key missing"}"#).expect("deser");
        assert_eq!(detail.message(), "API key missing");
    }

    #[test]
    fn test_error_detail_absent_falls_back() {
        let detail: ErrorDetail = serde_json::from_str("{}").expect("deser");
        assert_eq!(detail.message(), "An unknown error occurred.");
    }

    #[test]
    fn test_error_detail_default() {
        assert_eq!(ErrorDetail::default().message(), "An unknown error occurred.");
    }
}
