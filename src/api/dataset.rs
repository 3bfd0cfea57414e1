//! API operations concerning cached datasets.
//!
//! A cached dataset is a query that the server keeps precomputed, indexed by
//! one or more properties, so that results can be fetched for any index value
//! and timeframe without re-running the analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Error, ProjectSettings, ValidationError,
    api::{
        ApiRequest, DataResponse, null_as_default,
        paginate::{CountedPage, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT, Named, paginate_by_name},
        resource::{self, DATASETS},
    },
    transport::{HttpClient, HttpClientProvider, UreqClient},
};

/// A filter applied to the events a query or key may see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// The event property to filter on.
    pub property_name: String,
    /// The comparison, e.g. `eq`, `gt`, `in` or `exists`.
    pub operator: String,
    /// The value to compare against.
    pub property_value: serde_json::Value,
}

impl QueryFilter {
    /// Create a new filter.
    pub fn new(
        property_name: impl Into<String>,
        operator: impl Into<String>,
        property_value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator: operator.into(),
            property_value: property_value.into(),
        }
    }
}

/// The query that a dataset keeps cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefinition {
    /// The project the query runs against. Filled in by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// The analysis, e.g. `count` or `sum`.
    #[serde(deserialize_with = "null_as_default")]
    pub analysis_type: String,
    /// The collection the events are read from.
    #[serde(deserialize_with = "null_as_default")]
    pub event_collection: String,
    /// The property the analysis is computed over, if the analysis needs one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_property: Option<String>,
    /// The percentile, for `percentile` analyses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
    /// The relative timeframe kept cached, e.g. `this_500_days`.
    #[serde(deserialize_with = "null_as_default")]
    pub timeframe: String,
    /// The timezone, either a name or an offset in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<serde_json::Value>,
    /// The interval results are bucketed by, e.g. `daily`.
    #[serde(deserialize_with = "null_as_default")]
    pub interval: String,
    /// Properties to group results by.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub group_by: Vec<String>,
    /// Filters applied before the analysis.
    #[serde(
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub filters: Vec<QueryFilter>,
}

/// A cached dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetDefinition {
    /// The unique name of the dataset.
    #[serde(deserialize_with = "null_as_default")]
    pub dataset_name: String,
    /// A human-readable name.
    #[serde(deserialize_with = "null_as_default")]
    pub display_name: String,
    /// The cached query.
    #[serde(deserialize_with = "null_as_default")]
    pub query: QueryDefinition,
    /// The properties results can be fetched by.
    #[serde(deserialize_with = "null_as_default")]
    pub index_by: Vec<String>,
    /// The owning project. Filled in by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// The owning organization. Filled in by the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// When the server last scheduled a refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scheduled_date: Option<DateTime<Utc>>,
    /// The most recent interval with results available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_subtimeframe_available: Option<DateTime<Utc>>,
    /// How far the cached results lag behind incoming events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milliseconds_behind: Option<u64>,
}

impl DataResponse for DatasetDefinition {}

impl Named for DatasetDefinition {
    fn name(&self) -> &str {
        &self.dataset_name
    }
}

impl DatasetDefinition {
    /// Check that the definition has everything the server needs to create
    /// the dataset.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if is_blank(&self.dataset_name) {
            return Err(ValidationError::MissingDatasetName);
        }

        if is_blank(&self.display_name) {
            return Err(ValidationError::MissingDisplayName);
        }

        if self.index_by.iter().all(|p| is_blank(p)) {
            return Err(ValidationError::MissingIndexBy);
        }

        let query = &self.query;
        for (field, value) in [
            ("an analysis type", &query.analysis_type),
            ("an event collection", &query.event_collection),
            ("a timeframe", &query.timeframe),
            ("an interval", &query.interval),
        ] {
            if is_blank(value) {
                return Err(ValidationError::MissingQueryField(field));
            }
        }

        Ok(())
    }
}

/// One page of dataset definitions. `datasets` and `count` must both be
/// present; a page missing either is not mistaken for an empty project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDefinitionCollection {
    /// The definitions on this page, ordered by name.
    pub datasets: Vec<DatasetDefinition>,
    /// A link to the next page, if the server sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_url: Option<String>,
    /// The total number of definitions in the project.
    pub count: u64,
}

impl DataResponse for DatasetDefinitionCollection {}

impl DatasetDefinitionCollection {
    /// The cursor to request the following page with: the name of the last
    /// definition on this page.
    pub fn cursor(&self) -> Option<&str> {
        self.datasets.last().map(|d| d.dataset_name.as_str())
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn require_name(name: &str) -> Result<(), ValidationError> {
    if is_blank(name) {
        return Err(ValidationError::MissingDatasetName);
    }

    Ok(())
}

/// Fetch cached results for one index value over a timeframe.
#[derive(Debug, Clone)]
pub struct GetDatasetResults<'a> {
    /// The dataset to read.
    pub name: &'a str,
    /// The index value to fetch results for.
    pub index_by: &'a str,
    /// The timeframe to fetch, e.g. `this_7_days`.
    pub timeframe: &'a str,
}

#[derive(Serialize)]
struct GetDatasetResultsQuery<'a> {
    index_by: &'a str,
    timeframe: &'a str,
}

impl ApiRequest for GetDatasetResults<'_> {
    type Response = serde_json::Value;

    fn path(&self, project_id: &str) -> String {
        format!("{}/results", resource::dataset_path(project_id, self.name))
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(GetDatasetResultsQuery {
            index_by: self.index_by,
            timeframe: self.timeframe,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_name(self.name)?;

        if is_blank(self.index_by) {
            return Err(ValidationError::MissingIndexBy);
        }

        if is_blank(self.timeframe) {
            return Err(ValidationError::MissingTimeframe);
        }

        Ok(())
    }
}

/// Load a single dataset definition.
#[derive(Debug, Clone)]
pub struct GetDatasetDefinition<'a> {
    /// The name of the dataset.
    pub name: &'a str,
}

impl ApiRequest for GetDatasetDefinition<'_> {
    type Response = DatasetDefinition;

    fn path(&self, project_id: &str) -> String {
        resource::dataset_path(project_id, self.name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_name(self.name)
    }
}

/// List one page of dataset definitions, ordered by name.
#[derive(Debug, Clone)]
pub struct ListDatasetDefinitions<'a> {
    /// The page size, at most [`MAX_LIST_LIMIT`].
    pub limit: usize,
    /// Start after the dataset with this name.
    pub after_name: Option<&'a str>,
}

impl Default for ListDatasetDefinitions<'_> {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            after_name: None,
        }
    }
}

#[derive(Serialize)]
struct ListDatasetDefinitionsQuery<'a> {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    after_name: Option<&'a str>,
}

impl ApiRequest for ListDatasetDefinitions<'_> {
    type Response = DatasetDefinitionCollection;

    fn path(&self, project_id: &str) -> String {
        resource::resource_path(project_id, DATASETS)
    }

    fn query(&self) -> Option<impl Serialize> {
        Some(ListDatasetDefinitionsQuery {
            limit: self.limit,
            after_name: self.after_name.filter(|n| !is_blank(n)),
        })
    }
}

/// Delete a dataset.
#[derive(Debug, Clone)]
pub struct DeleteDataset<'a> {
    /// The name of the dataset to delete.
    pub name: &'a str,
}

impl ApiRequest for DeleteDataset<'_> {
    type Response = ();

    fn method(&self) -> http::Method {
        http::Method::DELETE
    }

    fn path(&self, project_id: &str) -> String {
        resource::dataset_path(project_id, self.name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_name(self.name)
    }
}

/// Create (or replace) a dataset.
#[derive(Debug, Clone)]
pub struct CreateDataset<'a> {
    /// The definition to create. Its name determines the dataset URL.
    pub definition: &'a DatasetDefinition,
}

impl ApiRequest for CreateDataset<'_> {
    type Response = DatasetDefinition;

    fn method(&self) -> http::Method {
        http::Method::PUT
    }

    fn path(&self, project_id: &str) -> String {
        resource::dataset_path(project_id, &self.definition.dataset_name)
    }

    fn body(&self) -> Option<impl Serialize> {
        Some(self.definition)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.definition.validate()
    }
}

/// The cached dataset API for a single project. Every operation requires the
/// project's master key.
#[derive(Debug, Clone)]
pub struct Datasets<C = UreqClient> {
    client: C,
    settings: ProjectSettings,
}

impl<C: HttpClient> Datasets<C> {
    /// Create the service. Fails if the settings don't carry a usable base
    /// URL and project id; keys are only checked when a call needs them.
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

    /// Fetch the cached results of a dataset for one index value over a
    /// timeframe.
    pub fn get_results(
        &self,
        dataset_name: &str,
        index_by: &str,
        timeframe: &str,
    ) -> Result<serde_json::Value, Error> {
        GetDatasetResults {
            name: dataset_name,
            index_by,
            timeframe,
        }
        .execute(&self.client, &self.settings)
    }

    /// Load a single dataset definition.
    pub fn get_definition(&self, dataset_name: &str) -> Result<DatasetDefinition, Error> {
        GetDatasetDefinition { name: dataset_name }.execute(&self.client, &self.settings)
    }

    /// Load one page of definitions, starting after `after_name` if given.
    pub fn list_definitions(
        &self,
        limit: usize,
        after_name: Option<&str>,
    ) -> Result<DatasetDefinitionCollection, Error> {
        ListDatasetDefinitions { limit, after_name }.execute(&self.client, &self.settings)
    }

    /// Load every definition in the project, in server order, following
    /// pages at the maximum page size. Fails rather than returning a partial
    /// list if the server delivers fewer definitions than it advertises.
    pub fn list_all_definitions(&self) -> Result<Vec<DatasetDefinition>, Error> {
        paginate_by_name(MAX_LIST_LIMIT, |limit, after_name| {
            let DatasetDefinitionCollection {
                datasets, count, ..
            } = self.list_definitions(limit, after_name)?;

            Ok(CountedPage {
                count,
                items: datasets,
            })
        })
    }

    /// Delete a dataset.
    pub fn delete_dataset(&self, dataset_name: &str) -> Result<(), Error> {
        DeleteDataset { name: dataset_name }.execute(&self.client, &self.settings)
    }

    /// Create a dataset, returning the definition as stored by the server.
    pub fn create_dataset(&self, definition: &DatasetDefinition) -> Result<DatasetDefinition, Error> {
        CreateDataset { definition }.execute(&self.client, &self.settings)
    }
}
