//! Test utilities for exercising services without a network.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use url::Url;

use crate::{
    ProjectSettings,
    transport::{HttpClient, HttpClientProvider, TransportError},
};

/// Settings for a fake project with only a master key.
pub(crate) fn test_settings() -> ProjectSettings {
    ProjectSettings::new("proj").with_master_key("master")
}

/// A request as seen by the mock transport.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub(crate) method: http::Method,
    pub(crate) url: String,
    pub(crate) auth_key: String,
    pub(crate) body: Option<String>,
}

#[derive(Debug)]
enum Canned {
    Response(http::StatusCode, String),
    Failure(String),
}

#[derive(Debug, Default)]
struct State {
    base_urls: Vec<String>,
    requests: Vec<Recorded>,
    responses: VecDeque<Canned>,
}

/// A provider and client in one, which answers requests from a queue of
/// canned responses and records everything it is asked to send. Clones share
/// state.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a raw body.
    pub(crate) fn respond(&self, status: u16, body: impl Into<String>) {
        let status = http::StatusCode::from_u16(status).unwrap();
        self.push(Canned::Response(status, body.into()));
    }

    /// Queue a response with a JSON body.
    pub(crate) fn respond_json(&self, status: u16, body: serde_json::Value) {
        self.respond(status, body.to_string());
    }

    /// Queue a transport failure.
    pub(crate) fn fail(&self, message: &str) {
        self.push(Canned::Failure(message.to_owned()));
    }

    fn push(&self, canned: Canned) {
        self.state.lock().unwrap().responses.push_back(canned);
    }

    /// Every request sent so far.
    pub(crate) fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Every base URL a client was requested for.
    pub(crate) fn base_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().base_urls.clone()
    }
}

impl HttpClientProvider for MockTransport {
    type Client = MockTransport;

    fn get_for_url(&self, base_url: &Url) -> MockTransport {
        self.state
            .lock()
            .unwrap()
            .base_urls
            .push(base_url.to_string());
        self.clone()
    }
}

impl HttpClient for MockTransport {
    fn send(
        &self,
        method: http::Method,
        relative_url: &str,
        auth_key: &str,
        body: Option<String>,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            method: method.clone(),
            url: relative_url.to_owned(),
            auth_key: auth_key.to_owned(),
            body,
        });

        match state.responses.pop_front() {
            Some(Canned::Response(status, body)) => Ok(http::Response::builder()
                .status(status)
                .body(body.into_bytes())?),
            Some(Canned::Failure(message)) => Err(io::Error::other(message).into()),
            None => panic!("unexpected request: {method} {relative_url}"),
        }
    }
}

#[cfg(feature = "_integration-tests")]
fn live_settings() -> &'static ProjectSettings {
    use std::sync::OnceLock;

    static SETTINGS: OnceLock<ProjectSettings> = OnceLock::new();
    SETTINGS.get_or_init(|| {
        ProjectSettings::from_default_env()
            .expect("Failed to load test settings. Did you forget to set KEEN_PROJECT_ID?")
    })
}

/// A dataset service against the project configured in the environment.
#[cfg(feature = "_integration-tests")]
pub(crate) fn live_datasets() -> crate::Datasets {
    let provider = crate::transport::UreqClientProvider::with_timeout(Some(
        std::time::Duration::from_secs(30),
    ));
    crate::Datasets::new(live_settings(), &provider).expect("Failed to create dataset service")
}

/// An access key service against the project configured in the environment.
#[cfg(feature = "_integration-tests")]
pub(crate) fn live_access_keys() -> crate::AccessKeys {
    let provider = crate::transport::UreqClientProvider::new();
    crate::AccessKeys::new(live_settings(), &provider).expect("Failed to create access key service")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn convenience_methods_use_matching_verbs() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        for _ in 0..4 {
            transport.respond(204, "");
        }

        transport.get("a", "k")?;
        transport.post("b", "k", "{}".to_owned())?;
        transport.put("c", "k", "[]".to_owned())?;
        transport.delete("d", "k")?;

        let sent: Vec<_> = transport
            .requests()
            .into_iter()
            .map(|r| (r.method, r.url, r.body))
            .collect();
        assert_eq!(
            sent,
            [
                (http::Method::GET, "a".to_owned(), None),
                (http::Method::POST, "b".to_owned(), Some("{}".to_owned())),
                (http::Method::PUT, "c".to_owned(), Some("[]".to_owned())),
                (http::Method::DELETE, "d".to_owned(), None),
            ]
        );

        Ok(())
    }
}
