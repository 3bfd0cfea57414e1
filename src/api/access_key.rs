//! API operations concerning scoped access keys.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    Error, ProjectSettings, ValidationError,
    api::{
        ApiRequest,
        dataset::QueryFilter,
        resource::{self, ACCESS_KEYS},
    },
    transport::{HttpClient, HttpClientProvider, UreqClient},
};

/// Something an access key may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Record events.
    Writes,
    /// Run ad-hoc queries.
    Queries,
    /// Run saved queries.
    SavedQueries,
    /// Read cached queries.
    CachedQueries,
    /// Read cached datasets.
    Datasets,
    /// Inspect collection schemas.
    Schema,
}

/// Options restricting event writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WritesOptions {
    /// Properties merged into every event written with the key.
    pub autofill: serde_json::Map<String, serde_json::Value>,
}

/// Options restricting ad-hoc queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueriesOptions {
    /// Filters appended to every query run with the key.
    pub filters: Vec<QueryFilter>,
}

/// Options restricting saved queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedQueriesOptions {
    /// Saved queries the key may run.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed: BTreeSet<String>,
    /// Saved queries the key may not run.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked: BTreeSet<String>,
    /// Filters appended to every saved query run with the key.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<QueryFilter>,
}

/// Options restricting cached queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedQueriesOptions {
    /// Cached queries the key may read.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed: BTreeSet<String>,
    /// Cached queries the key may not read.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub blocked: BTreeSet<String>,
}

/// The index values a key may read from one dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllowedDatasetIndexes {
    /// Allowed values, keyed by index property.
    pub index_by: BTreeMap<String, Vec<serde_json::Value>>,
}

/// Options restricting cached datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetsOptions {
    /// The dataset operations the key may perform, e.g. `read` or `list`.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub operations: BTreeSet<String>,
    /// The datasets the key may read, and which index values.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub allowed: BTreeMap<String, AllowedDatasetIndexes>,
}

/// Per-permission options for a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyOptions {
    /// Restrictions on writes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writes: Option<WritesOptions>,
    /// Restrictions on ad-hoc queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<QueriesOptions>,
    /// Restrictions on saved queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_queries: Option<SavedQueriesOptions>,
    /// Restrictions on cached queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_queries: Option<CachedQueriesOptions>,
    /// Restrictions on cached datasets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasets: Option<DatasetsOptions>,
}

/// A new access key to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKey {
    /// A name for the key.
    pub name: String,
    /// Whether the key can be used.
    pub is_active: bool,
    /// What the key is allowed to do.
    pub permitted: BTreeSet<Permission>,
    /// Further restrictions per permission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<AccessKeyOptions>,
}

impl AccessKey {
    /// An active key with no permissions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_active: true,
            permitted: BTreeSet::new(),
            options: None,
        }
    }

    /// Grant a permission.
    pub fn permit(mut self, permission: Permission) -> Self {
        self.permitted.insert(permission);
        self
    }

    /// Set the per-permission options.
    pub fn options(mut self, options: AccessKeyOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Create the key in a disabled state.
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Create a new access key.
#[derive(Debug, Clone)]
pub struct CreateAccessKey<'a> {
    /// The key to create.
    pub key: &'a AccessKey,
}

impl ApiRequest for CreateAccessKey<'_> {
    type Response = serde_json::Value;

    fn method(&self) -> http::Method {
        http::Method::POST
    }

    fn path(&self, project_id: &str) -> String {
        resource::resource_path(project_id, ACCESS_KEYS)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(self.key)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.key.name.trim().is_empty() {
            return Err(ValidationError::MissingAccessKeyName);
        }

        Ok(())
    }
}

/// The access key API for a single project. Requires the project's master
/// key.
#[derive(Debug, Clone)]
pub struct AccessKeys<C = UreqClient> {
    client: C,
    settings: ProjectSettings,
}

impl<C: HttpClient> AccessKeys<C> {
    /// Create the service. Fails if the settings don't carry a usable base
    /// URL and project id.
    pub fn new<P>(settings: &ProjectSettings, provider: &P) -> Result<Self, Error>
    where
        P: HttpClientProvider<Client = C>,
    {
        let base_url = settings.base_url()?;
        settings.require_project_id()?;

        Ok(Self {
            client: provider.get_for_url(&base_url),
            settings: settings.clone(),
        })
    }

    /// Create a key, returning the server's description of it (including the
    /// generated key itself).
    pub fn create_access_key(&self, key: &AccessKey) -> Result<serde_json::Value, Error> {
        CreateAccessKey { key }.execute(&self.client, &self.settings)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::{
        ApiError, ApiErrorKind, ConfigError, KeyKind,
        api::testutil::{MockTransport, test_settings},
    };

    fn service(transport: &MockTransport) -> AccessKeys<MockTransport> {
        AccessKeys::new(&test_settings(), transport).unwrap()
    }

    #[test]
    fn service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccessKeys<UreqClient>>();
        assert_send_sync::<AccessKeys<MockTransport>>();
    }

    fn scoped_key() -> AccessKey {
        let mut index_by = BTreeMap::new();
        index_by.insert("customer.id".to_owned(), vec![json!("cust_1")]);

        AccessKey::new("dashboard")
            .permit(Permission::Datasets)
            .permit(Permission::Queries)
            .options(AccessKeyOptions {
                queries: Some(QueriesOptions {
                    filters: vec![QueryFilter::new("customer.id", "eq", "cust_1")],
                }),
                datasets: Some(DatasetsOptions {
                    operations: ["read".to_owned()].into(),
                    allowed: [(
                        "purchases_by_customer".to_owned(),
                        AllowedDatasetIndexes { index_by },
                    )]
                    .into(),
                }),
                ..Default::default()
            })
    }

    #[test_log::test]
    fn create_access_key() -> anyhow::Result<()> {
        let transport = MockTransport::new();
        transport.respond_json(
            201,
            json!({"key": "generated", "name": "dashboard", "is_active": true}),
        );

        let created = service(&transport).create_access_key(&scoped_key())?;
        assert_eq!(created["key"], "generated");

        let [req]: [_; 1] = transport.requests().try_into().unwrap();
        assert_eq!(req.method, http::Method::POST);
        assert_eq!(req.url, "proj/access_keys");
        assert_eq!(req.auth_key, "master");

        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap_or(""))?;
        assert_eq!(
            body,
            json!({
                "name": "dashboard",
                "is_active": true,
                "permitted": ["queries", "datasets"],
                "options": {
                    "queries": {
                        "filters": [{
                            "property_name": "customer.id",
                            "operator": "eq",
                            "property_value": "cust_1"
                        }]
                    },
                    "datasets": {
                        "operations": ["read"],
                        "allowed": {
                            "purchases_by_customer": {
                                "index_by": {"customer.id": ["cust_1"]}
                            }
                        }
                    }
                }
            })
        );

        Ok(())
    }

    #[test]
    fn requires_master_key() {
        let transport = MockTransport::new();
        let settings = ProjectSettings {
            master_key: None,
            ..test_settings().with_write_key("wk")
        };
        let keys = AccessKeys::new(&settings, &transport).unwrap();

        assert_matches!(
            keys.create_access_key(&scoped_key()),
            Err(Error::Config(ConfigError::MissingKey(KeyKind::Master)))
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn requires_well_formed_url() {
        let transport = MockTransport::new();
        let settings = test_settings().with_keen_url("//api.keen.io/3.0/projects/");

        assert_matches!(
            AccessKeys::new(&settings, &transport),
            Err(Error::Config(ConfigError::InvalidUrl { .. }))
        );
    }

    #[test]
    fn requires_name() {
        let transport = MockTransport::new();

        assert_matches!(
            service(&transport).create_access_key(&AccessKey::new(" ")),
            Err(Error::Validation(ValidationError::MissingAccessKeyName))
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn failed_status_is_reported() {
        let transport = MockTransport::new();
        transport.respond(500, "Internal Server Error");

        assert_matches!(
            service(&transport).create_access_key(&scoped_key()),
            Err(Error::Api(ApiError::Status(
                http::StatusCode::INTERNAL_SERVER_ERROR
            )))
        );
    }

    #[test]
    fn empty_success_is_reported() {
        let transport = MockTransport::new();
        transport.respond(200, "");

        assert_matches!(
            service(&transport).create_access_key(&scoped_key()),
            Err(Error::Api(ApiError::EmptyResponse(http::StatusCode::OK)))
        );
    }

    #[test]
    fn embedded_error_is_reported() {
        let transport = MockTransport::new();
        transport.respond_json(
            403,
            json!({"error_code": "InvalidApiKeyError", "message": "Master key required"}),
        );

        assert_matches!(
            service(&transport).create_access_key(&scoped_key()),
            Err(Error::Api(ApiError::ErrorResponse {
                kind: ApiErrorKind::InvalidApiKey,
                message: Some(_),
                ..
            }))
        );
    }
}

#[cfg(all(test, feature = "_integration-tests"))]
mod integration_test {
    use super::*;
    use crate::api::testutil::live_access_keys;

    #[test]
    fn create_inactive_key() -> anyhow::Result<()> {
        let keys = live_access_keys();
        let key = AccessKey::new("keen-rust integration test")
            .permit(Permission::Queries)
            .inactive();

        let created = keys.create_access_key(&key)?;
        assert_eq!(created["is_active"], false);

        Ok(())
    }
}
