use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use reqwest::Method;
use serde_json::Value;

use crate::sync::UpdatedSince;
use crate::{BlockingOdaClient, ClientError};

#[pyclass(name = "OperationDefinition", get_all)]
pub struct PyOperationDefinition {
    pub operation_id: String,
    pub method: String,
    pub path_template: String,
    pub path_params: Vec<String>,
    pub query_params: Vec<String>,
    pub entity_set: Option<String>,
    pub navigation: Option<String>,
}

#[pyclass(name = "EntitySet", get_all)]
pub struct PyEntitySet {
    pub name: String,
    pub key: String,
    pub properties: Vec<String>,
    pub date_properties: Vec<String>,
    pub navigations: Vec<String>,
}

#[pyclass(name = "Client")]
pub struct PyClient {
    inner: Mutex<BlockingOdaClient>,
}

#[pymethods]
impl PyClient {
    #[new]
    #[pyo3(signature = (base_url=None, access_token=None))]
    fn new(base_url: Option<String>, access_token: Option<String>) -> PyResult<Self> {
        let client = match base_url {
            Some(url) => BlockingOdaClient::new(url).map_err(to_py_value_error)?,
            None => BlockingOdaClient::from_default_server().map_err(to_py_value_error)?,
        };
        let client = if let Some(value) = access_token {
            client.with_authorization_token(value)
        } else {
            client
        };

        Ok(Self {
            inner: Mutex::new(client),
        })
    }

    #[staticmethod]
    fn operations() -> Vec<PyOperationDefinition> {
        BlockingOdaClient::operations()
            .iter()
            .map(|op| PyOperationDefinition {
                operation_id: op.operation_id.to_owned(),
                method: op.method.to_owned(),
                path_template: op.path_template.to_owned(),
                path_params: op
                    .path_params
                    .iter()
                    .map(|value| (*value).to_owned())
                    .collect(),
                query_params: op
                    .query_params
                    .iter()
                    .map(|param| param.as_str().to_owned())
                    .collect(),
                entity_set: op.entity_set.map(str::to_owned),
                navigation: op.navigation.map(str::to_owned),
            })
            .collect()
    }

    /// Entity sets in dependency order when `dependency_order` is set,
    /// otherwise in metadata order.
    #[staticmethod]
    #[pyo3(signature = (dependency_order=false))]
    fn entity_sets(dependency_order: bool) -> PyResult<Vec<PyEntitySet>> {
        let names: Vec<&str> = if dependency_order {
            crate::catalog::dependency_order()
        } else {
            BlockingOdaClient::entity_sets()
                .iter()
                .map(|set| set.name)
                .collect()
        };

        names
            .into_iter()
            .map(|name| {
                let set = crate::catalog::entity_set(name).map_err(to_py_value_error)?;
                Ok(PyEntitySet {
                    name: set.name.to_owned(),
                    key: set.key.to_owned(),
                    properties: set
                        .properties
                        .iter()
                        .map(|property| property.name.to_owned())
                        .collect(),
                    date_properties: set.date_properties().map(str::to_owned).collect(),
                    navigations: set
                        .navigations
                        .iter()
                        .map(|navigation| navigation.name.to_owned())
                        .collect(),
                })
            })
            .collect()
    }

    fn get(&self, path: String) -> PyResult<String> {
        self.request("GET".to_owned(), path, None, None)
    }

    #[pyo3(signature = (method, path, query_json=None, body_json=None))]
    fn request(
        &self,
        method: String,
        path: String,
        query_json: Option<String>,
        body_json: Option<String>,
    ) -> PyResult<String> {
        let parsed_method = Method::from_str(&method)
            .map_err(|e| PyValueError::new_err(format!("invalid HTTP method: {e}")))?;
        let query_pairs = parse_map_arg(query_json)?;
        let borrowed_query = borrow_pairs(&query_pairs);
        let body = parse_body_arg(body_json)?;

        let client = self
            .inner
            .lock()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let value = client
            .request_json_with_query(parsed_method, &path, &borrowed_query, body)
            .map_err(to_py_runtime_error)?;

        Ok(value.to_string())
    }

    #[pyo3(signature = (operation_id, path_params_json=None, query_json=None, body_json=None))]
    fn call_operation(
        &self,
        operation_id: String,
        path_params_json: Option<String>,
        query_json: Option<String>,
        body_json: Option<String>,
    ) -> PyResult<String> {
        let path_pairs = parse_map_arg(path_params_json)?;
        let borrowed_path = borrow_pairs(&path_pairs);
        let query_pairs = parse_map_arg(query_json)?;
        let borrowed_query = borrow_pairs(&query_pairs);
        let body = parse_body_arg(body_json)?;

        let client = self
            .inner
            .lock()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let value = client
            .call_operation(&operation_id, &borrowed_path, &borrowed_query, body)
            .map_err(to_py_call_error)?;

        Ok(value.to_string())
    }

    /// Returns every row of `entity_set` updated after `since` (RFC 3339)
    /// as a JSON array.
    #[pyo3(signature = (entity_set, since, batch_size=None, max_pages=None))]
    fn updated_since(
        &self,
        entity_set: String,
        since: String,
        batch_size: Option<u32>,
        max_pages: Option<usize>,
    ) -> PyResult<String> {
        let since: DateTime<Utc> = DateTime::parse_from_rfc3339(&since)
            .map_err(|e| PyValueError::new_err(format!("invalid timestamp '{since}': {e}")))?
            .with_timezone(&Utc);
        let mut pager = UpdatedSince::<Value>::new(&entity_set, since)
            .map_err(to_py_value_error)?
            .batch_size(batch_size.unwrap_or_default());

        let client = self
            .inner
            .lock()
            .map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        let mut rows = Vec::new();
        let mut pages = 0;
        while max_pages.is_none_or(|max| pages < max) {
            let Some(page) = pager
                .next_page_blocking(&client)
                .map_err(to_py_runtime_error)?
            else {
                break;
            };
            rows.extend(page);
            pages += 1;
        }

        Ok(Value::Array(rows).to_string())
    }
}

#[pymodule]
fn oda_client(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PyOperationDefinition>()?;
    module.add_class::<PyEntitySet>()?;
    module.add_class::<PyClient>()?;
    Ok(())
}

fn to_py_value_error(error: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(error.to_string())
}

fn to_py_runtime_error(error: impl std::fmt::Display) -> PyErr {
    PyRuntimeError::new_err(error.to_string())
}

// Lookup and argument failures are caller mistakes; the rest happened on the wire.
fn to_py_call_error(error: ClientError) -> PyErr {
    match error {
        ClientError::UnknownOperation(_)
        | ClientError::UnknownEntitySet(_)
        | ClientError::UnknownNavigation { .. }
        | ClientError::NavigationTarget { .. }
        | ClientError::NavigationCardinality { .. }
        | ClientError::MissingPathParameter { .. }
        | ClientError::UnsupportedQueryParameter { .. } => to_py_value_error(error),
        other => to_py_runtime_error(other),
    }
}

fn borrow_pairs(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

fn parse_body_arg(body_json: Option<String>) -> PyResult<Option<Value>> {
    body_json
        .map(|raw| serde_json::from_str(&raw).map_err(to_py_value_error))
        .transpose()
}

fn parse_map_arg(raw_json: Option<String>) -> PyResult<Vec<(String, String)>> {
    let Some(raw_json) = raw_json else {
        return Ok(Vec::new());
    };

    let value: Value = serde_json::from_str(&raw_json).map_err(to_py_value_error)?;
    let object = value
        .as_object()
        .ok_or_else(|| PyValueError::new_err("expected a JSON object"))?;

    Ok(object
        .iter()
        .map(|(key, value)| {
            let rendered = match value.as_str() {
                Some(as_str) => as_str.to_owned(),
                None => value.to_string(),
            };
            (key.to_owned(), rendered)
        })
        .collect())
}
