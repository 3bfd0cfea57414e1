use std::str::FromStr as _;

use serde::Deserialize;

/// An error response from the API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The response body carried an application-level error code. This takes
    /// precedence over the HTTP status, since the API sometimes reports
    /// errors with a 200.
    ErrorResponse {
        /// The HTTP status on the overall response.
        status: http::StatusCode,
        /// The error code from the API.
        kind: ApiErrorKind,
        /// A longer description of the error encountered.
        message: Option<String>,
    },
    /// The response did not contain an error code, but the HTTP status
    /// indicated failure.
    Status(http::StatusCode),
    /// The HTTP status indicated success, but the body was empty or not
    /// JSON.
    EmptyResponse(http::StatusCode),
    /// The body was JSON, but not of the expected shape.
    InvalidResponse {
        /// The HTTP status on the overall response.
        status: http::StatusCode,
        /// What failed to decode, and where.
        message: String,
    },
}

impl ApiError {
    /// The HTTP status of the response that produced this error.
    pub fn status(&self) -> http::StatusCode {
        match self {
            ApiError::ErrorResponse { status, .. }
            | ApiError::Status(status)
            | ApiError::EmptyResponse(status)
            | ApiError::InvalidResponse { status, .. } => *status,
        }
    }

    /// The application-level error code, if the API sent one.
    pub fn kind(&self) -> Option<&ApiErrorKind> {
        match self {
            ApiError::ErrorResponse { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::ErrorResponse { kind, message, .. } => {
                write!(f, "{kind}")?;
                if let Some(message) = &message {
                    write!(f, ": {message}")?;
                }
            }
            ApiError::Status(status) => {
                write!(f, "Request failed with status: {status}")?;
            }
            ApiError::EmptyResponse(status) => {
                write!(f, "Empty response from server ({status})")?;
            }
            ApiError::InvalidResponse { status, message } => {
                write!(f, "Invalid response ({status}): {message}")?;
            }
        }

        Ok(())
    }
}

/// Indicates that the error code was unrecognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid error kind: {0}")]
pub struct InvalidErrorKind(String);

macro_rules! api_error_kinds {
    ($($code:literal => $variant:ident),* $(,)?) => {
        /// An error code from the API.
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum ApiErrorKind {
            $(
                #[doc = $code]
                $variant,
            )*
            /// An unknown error code.
            Unknown(String),
        }

        impl std::fmt::Display for ApiErrorKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $(ApiErrorKind::$variant => $code,)*
                    ApiErrorKind::Unknown(kind) => kind,
                })
            }
        }

        impl std::str::FromStr for ApiErrorKind {
            type Err = InvalidErrorKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($code => ApiErrorKind::$variant,)*
                    _ => return Err(InvalidErrorKind(s.to_string())),
                })
            }
        }
    };
}

api_error_kinds! {
    "InternalServerError" => InternalServerError,
    "InvalidApiKeyError" => InvalidApiKey,
    "InvalidBatchError" => InvalidBatch,
    "InvalidEventError" => InvalidEvent,
    "InvalidKeenNamespacePropertyError" => InvalidKeenNamespaceProperty,
    "InvalidPropertyNameError" => InvalidPropertyName,
    "ListsOfNonPrimitivesNotAllowedError" => ListsOfNonPrimitivesNotAllowed,
    "NamespaceTypeError" => NamespaceType,
    "ResourceNotFoundError" => ResourceNotFound,
}

/// The error payload embedded in a response body.
#[derive(Debug, Deserialize)]
pub(crate) struct RawApiError {
    error_code: String,
    #[serde(default)]
    message: Option<String>,
}

impl ApiError {
    pub(crate) fn from_raw(status: http::StatusCode, raw: RawApiError) -> Self {
        let kind = ApiErrorKind::from_str(&raw.error_code)
            .unwrap_or(ApiErrorKind::Unknown(raw.error_code));

        ApiError::ErrorResponse {
            status,
            kind,
            message: raw.message,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_and_unknown_kinds() {
        let raw = RawApiError {
            error_code: "ResourceNotFoundError".to_owned(),
            message: Some("Dataset not found".to_owned()),
        };
        let err = ApiError::from_raw(http::StatusCode::NOT_FOUND, raw);
        assert_eq!(err.kind(), Some(&ApiErrorKind::ResourceNotFound));
        assert_eq!(err.to_string(), "ResourceNotFoundError: Dataset not found");

        let raw = RawApiError {
            error_code: "SomethingNewError".to_owned(),
            message: None,
        };
        let err = ApiError::from_raw(http::StatusCode::OK, raw);
        assert_eq!(
            err.kind(),
            Some(&ApiErrorKind::Unknown("SomethingNewError".to_owned()))
        );
        assert_eq!(err.status(), http::StatusCode::OK);
        assert_eq!(err.to_string(), "SomethingNewError");
    }

    #[test]
    fn status_errors_have_no_kind() {
        let err = ApiError::Status(http::StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), None);
        assert_eq!(err.to_string(), "Request failed with status: 502 Bad Gateway");
    }
}
