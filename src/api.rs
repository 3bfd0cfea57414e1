use std::io::{Cursor, Read};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{Error, KeyKind, ProjectSettings, ValidationError, transport::HttpClient};

pub mod access_key;
pub mod dataset;
mod error;
mod paginate;
mod resource;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::*;
pub use paginate::*;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawApiResponse {
    Error(RawApiError),
    Data(serde_json::Value),
}

/// Implemented by types that can be sent as requests to the Keen API.
pub trait ApiRequest: Sized {
    /// The corresponding response type.
    type Response: ApiResponse;

    /// The path of the request, relative to the API root.
    fn path(&self, project_id: &str) -> String;

    /// The method to use.
    fn method(&self) -> http::Method {
        http::Method::GET
    }

    /// The serializable request body.
    fn body(&self) -> Option<impl Serialize> {
        None::<&()>
    }

    /// The serializable query string.
    fn query(&self) -> Option<impl Serialize> {
        None::<&()>
    }

    /// The key that authorizes the request.
    fn required_key(&self) -> KeyKind {
        KeyKind::Master
    }

    /// Check the request arguments before anything is built or sent.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// The path and query string, relative to the API root.
    fn relative_url(&self, project_id: &str) -> Result<String, serde_qs::Error> {
        let mut url = self.path(project_id);
        if let Some(query) = self.query() {
            let qs = serde_qs::to_string(&query)?;
            if !qs.is_empty() {
                url.push('?');
                url.push_str(&qs);
            }
        }

        Ok(url)
    }

    /// Check the credentials and arguments, send the request with `client`,
    /// and read the response.
    fn execute(
        self,
        client: &impl HttpClient,
        settings: &ProjectSettings,
    ) -> Result<Self::Response, Error> {
        let auth_key = settings.require_key(self.required_key())?;
        self.validate()?;

        let method = self.method();
        let url = self.relative_url(settings.require_project_id()?)?;
        let body = self.body().map(|b| serde_json::to_string(&b)).transpose()?;

        debug!(%method, url = %url, "sending request");
        let resp = client.send(method, &url, auth_key, body)?;

        Ok(Self::Response::from_response(resp.map(Cursor::new))?)
    }
}

/// Implemented by types that can be read as responses from the Keen API.
pub trait ApiResponse: Sized {
    /// Read the response from an [http::Response] object.
    fn from_response(resp: http::Response<impl Read>) -> Result<Self, ApiError> {
        let (parts, body) = resp.into_parts();
        Self::from_response_parts(parts, body)
    }

    /// Read the response from pre-parsed parts.
    fn from_response_parts(parts: http::response::Parts, body: impl Read)
    -> Result<Self, ApiError>;
}

/// A private trait for types that deserialize directly from a response body.
pub(crate) trait DataResponse: DeserializeOwned {}

impl DataResponse for serde_json::Value {}

impl<T: DataResponse> ApiResponse for T {
    fn from_response_parts(
        parts: http::response::Parts,
        body: impl Read,
    ) -> Result<Self, ApiError> {
        let value = classify(&parts, body)?;
        decode(parts.status, value)
    }
}

// For API methods that answer with 204 and no body.
impl ApiResponse for () {
    fn from_response_parts(
        parts: http::response::Parts,
        body: impl Read,
    ) -> Result<Self, ApiError> {
        if parts.status == http::StatusCode::NO_CONTENT {
            return Ok(());
        }

        check_api_error(&parts, body)?;
        Err(ApiError::Status(parts.status))
    }
}

/// Parse the body, returning an error if it carries an API error code.
/// Parse failures are not errors here; the body may legitimately be empty
/// on a failed response.
fn check_api_error(
    parts: &http::response::Parts,
    body: impl Read,
) -> Result<Option<serde_json::Value>, ApiError> {
    match serde_json::from_reader(body) {
        Ok(RawApiResponse::Error(raw)) => Err(ApiError::from_raw(parts.status, raw)),
        Ok(RawApiResponse::Data(serde_json::Value::Null)) | Err(_) => Ok(None),
        Ok(RawApiResponse::Data(value)) => Ok(Some(value)),
    }
}

/// Classify a response: an embedded error code wins over the status, a
/// failed status wins over an unusable body.
pub(crate) fn classify(
    parts: &http::response::Parts,
    body: impl Read,
) -> Result<serde_json::Value, ApiError> {
    let value = check_api_error(parts, body)?;

    if !parts.status.is_success() {
        return Err(ApiError::Status(parts.status));
    }

    value.ok_or(ApiError::EmptyResponse(parts.status))
}

fn decode<T: DeserializeOwned>(
    status: http::StatusCode,
    value: serde_json::Value,
) -> Result<T, ApiError> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        tracing::error!("Failed to decode API response: {e}");
        ApiError::InvalidResponse {
            status,
            message: e.to_string(),
        }
    })
}

/// Deserialize `null` as the default value, for fields the API sends as
/// explicit nulls.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
