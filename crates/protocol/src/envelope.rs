use serde::{Deserialize, Serialize};

/// Errors raised when unwrapping an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnvelopeError {
    /// The backend answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The backend answered `success: true` without the expected payload.
    #[error("response carried no {0}")]
    MissingData(&'static str),
}

/// Envelope wrapping every backend response.
///
/// Older endpoints report failures under `error` instead of `message`;
/// both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Creates a successful envelope around `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Creates a failed envelope with a reason.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Unwraps the envelope, keeping an absent payload as `None`.
    pub fn into_result(self) -> Result<Option<T>, EnvelopeError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(EnvelopeError::Rejected(
                self.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "request rejected by server".into()),
            ))
        }
    }

    /// Unwraps the envelope and requires a payload.
    ///
    /// `what` names the payload in the error message.
    pub fn into_data(self, what: &'static str) -> Result<T, EnvelopeError> {
        self.into_result()?.ok_or(EnvelopeError::MissingData(what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_data() {
        let json = r#"{"success":true,"data":{"etag":"abc"}}"#;
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        let data = resp.into_data("etag").unwrap();
        assert_eq!(data["etag"], "abc");
    }

    #[test]
    fn failure_uses_message() {
        let json = r#"{"success":false,"message":"quota exceeded"}"#;
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err, EnvelopeError::Rejected("quota exceeded".into()));
    }

    #[test]
    fn failure_accepts_error_alias() {
        let json = r#"{"success":false,"error":"part rejected"}"#;
        let resp: ApiResponse<serde_json::Value> = serde_json::from_str(json).unwrap();
        assert_eq!(
            resp.into_result().unwrap_err().to_string(),
            "part rejected"
        );
    }

    #[test]
    fn failure_without_reason_has_fallback() {
        let resp: ApiResponse<()> = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert_eq!(
            resp.into_result().unwrap_err().to_string(),
            "request rejected by server"
        );
    }

    #[test]
    fn success_without_data() {
        let resp: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(resp.clone().into_result().unwrap().is_none());
        assert_eq!(
            resp.into_data("listing").unwrap_err(),
            EnvelopeError::MissingData("listing")
        );
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Receipt {
        etag: String,
    }

    fn parse<T: serde::de::DeserializeOwned>(body: &str) -> ApiResponse<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn generic_payload_needs_no_default() {
        let resp: ApiResponse<Receipt> = parse(r#"{"success":true,"data":{"etag":"e1"}}"#);
        assert_eq!(resp.data, Some(Receipt { etag: "e1".into() }));

        let resp: ApiResponse<Receipt> = parse(r#"{"success":true}"#);
        assert!(resp.data.is_none());
    }

    #[test]
    fn ok_skips_empty_fields() {
        let json = serde_json::to_string(&ApiResponse::ok(1)).unwrap();
        assert_eq!(json, r#"{"success":true,"data":1}"#);
    }
}
