use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::catalog::{
    self, EntitySetDefinition, OperationDefinition, OperationKind, check_navigation, check_query,
    find_entity_operation, find_operation, parse_method, render_path,
};
use crate::model::{Collection, Entity};
use crate::query::QueryOptions;
use crate::transform::normalize_dates;
use crate::{ApiClient, BlockingApiClient, ClientError};

/// Async ODA client backed by the generated operation registry.
///
/// Operations can be addressed by operation id ([`Self::call_operation`]),
/// which returns JSON with normalized dates, or through the typed methods
/// ([`Self::list`], [`Self::get`], ...), which decode into the generated
/// entity types.
///
/// ```no_run
/// # async fn run() -> Result<(), oda_client::ClientError> {
/// use oda_client::{OdaClient, QueryOptions, model::Sag};
///
/// let client = OdaClient::from_default_server()?;
/// let page = client
///     .list::<Sag>(&QueryOptions::new().filter("periodeid eq 160").top(5))
///     .await?;
/// for sag in page.value {
///     println!("{:?} {:?}", sag.id, sag.titel);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct OdaClient {
    inner: ApiClient,
}

impl OdaClient {
    /// Creates a client with an explicit base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            inner: ApiClient::new(base_url)?,
        })
    }

    /// Creates a client for the service root declared in the metadata.
    pub fn from_default_server() -> Result<Self, ClientError> {
        Self::new(catalog::oda_default_server_url())
    }

    /// Returns a new client with a bearer token attached to all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_authorization_token(token);
        self
    }

    /// Returns a new client sending through a caller-configured `reqwest` client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.inner = self.inner.with_http_client(http);
        self
    }

    /// Returns all generated operations.
    pub fn operations() -> &'static [OperationDefinition] {
        catalog::operations()
    }

    /// Returns all entity sets in metadata order.
    pub fn entity_sets() -> &'static [EntitySetDefinition] {
        catalog::entity_sets()
    }

    /// Sends a request using a raw path and method.
    ///
    /// This bypasses operation lookup, the query allow-list and date
    /// normalization.
    pub async fn request_json_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.inner
            .request_json_with_query(method, path, query, body)
            .await
    }

    /// Calls an endpoint by operation id.
    ///
    /// `path_params` replaces `{id}` in the path template. Query names must
    /// be in the operation's allow-list. Date fields in the response are
    /// rewritten as UTC RFC 3339.
    pub async fn call_operation(
        &self,
        operation_id: &str,
        path_params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let operation = find_operation(operation_id)?;
        self.send(operation, path_params, query, body).await
    }

    /// Reads a page of an entity set.
    pub async fn list<E: Entity>(&self, query: &QueryOptions) -> Result<Collection<E>, ClientError> {
        self.list_in(E::ENTITY_SET, query).await
    }

    /// Reads a page of the named entity set into any deserializable row type,
    /// e.g. [`serde_json::Value`].
    pub async fn list_in<T: DeserializeOwned>(
        &self,
        entity_set: &str,
        query: &QueryOptions,
    ) -> Result<Collection<T>, ClientError> {
        let operation = find_entity_operation(entity_set, OperationKind::List, None)?;
        let value = self.send_keyed(operation, None, query, None).await?;
        decode(value)
    }

    /// Reads one entity by key. Only `$select` and `$expand` apply.
    pub async fn get<E: Entity>(&self, id: i64, query: &QueryOptions) -> Result<E, ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Get, None)?;
        let value = self.send_keyed(operation, Some(id), query, None).await?;
        decode(value)
    }

    /// Creates an entity and returns it as stored by the service.
    pub async fn create<E: Entity>(&self, body: &E::Create) -> Result<E, ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Create, None)?;
        let body = encode(body)?;
        let value = self
            .send_keyed(operation, None, &QueryOptions::default(), Some(body))
            .await?;
        decode(value)
    }

    /// Patches the populated fields of `body` onto an entity.
    pub async fn update<E: Entity>(&self, id: i64, body: &E::Update) -> Result<(), ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Update, None)?;
        let body = encode(body)?;
        self.send_keyed(operation, Some(id), &QueryOptions::default(), Some(body))
            .await?;
        Ok(())
    }

    pub async fn delete<E: Entity>(&self, id: i64) -> Result<(), ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Delete, None)?;
        self.send_keyed(operation, Some(id), &QueryOptions::default(), None)
            .await?;
        Ok(())
    }

    /// Reads the entities behind a to-many navigation property, e.g. the
    /// `SagAktør` rows of a `Sag`.
    pub async fn list_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        query: &QueryOptions,
    ) -> Result<Collection<R>, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::ListRelated, Some(navigation))?;
        let value = self.send_keyed(operation, Some(id), query, None).await?;
        decode(value)
    }

    /// Reads the entity behind a to-one navigation property. `None` when the
    /// foreign key is unset.
    pub async fn get_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        query: &QueryOptions,
    ) -> Result<Option<R>, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::GetRelated, Some(navigation))?;
        let value = self.send_keyed(operation, Some(id), query, None).await?;
        decode(value)
    }

    /// Creates an entity through a to-many navigation property.
    pub async fn create_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        body: &R::Create,
    ) -> Result<R, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::CreateRelated, Some(navigation))?;
        let body = encode(body)?;
        let value = self
            .send_keyed(operation, Some(id), &QueryOptions::default(), Some(body))
            .await?;
        decode(value)
    }

    /// Forwards `body` to `/$batch` unchanged and returns the raw response.
    pub async fn batch(&self, body: Value) -> Result<Value, ClientError> {
        self.call_operation(BATCH_OPERATION, &[], &[], Some(body))
            .await
    }

    async fn send_keyed(
        &self,
        operation: &OperationDefinition,
        id: Option<i64>,
        query: &QueryOptions,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let id = id.map(|id| id.to_string());
        let path_params = key_params(id.as_deref());
        let pairs = query.to_pairs();
        let query = borrow_pairs(&pairs);
        self.send(operation, &path_params, &query, body).await
    }

    async fn send(
        &self,
        operation: &OperationDefinition,
        path_params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let (method, path) = prepare(operation, path_params, query)?;
        let value = self
            .inner
            .request_json_with_query(method, &path, query, body)
            .await?;
        finish(operation, value)
    }
}

/// Blocking ODA client backed by the generated operation registry.
///
/// This is the synchronous counterpart of [`OdaClient`].
#[derive(Debug)]
pub struct BlockingOdaClient {
    inner: BlockingApiClient,
}

impl BlockingOdaClient {
    /// Creates a client with an explicit base URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            inner: BlockingApiClient::new(base_url)?,
        })
    }

    /// Creates a client for the service root declared in the metadata.
    pub fn from_default_server() -> Result<Self, ClientError> {
        Self::new(catalog::oda_default_server_url())
    }

    /// Returns a new client with a bearer token attached to all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.inner = self.inner.with_authorization_token(token);
        self
    }

    /// Returns a new client sending through a caller-configured `reqwest` client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::blocking::Client) -> Self {
        self.inner = self.inner.with_http_client(http);
        self
    }

    /// Returns all generated operations.
    pub fn operations() -> &'static [OperationDefinition] {
        catalog::operations()
    }

    /// Returns all entity sets in metadata order.
    pub fn entity_sets() -> &'static [EntitySetDefinition] {
        catalog::entity_sets()
    }

    /// Sends a request using a raw path and method.
    ///
    /// This bypasses operation lookup, the query allow-list and date
    /// normalization.
    pub fn request_json_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.inner.request_json_with_query(method, path, query, body)
    }

    /// Calls an endpoint by operation id.
    ///
    /// See [`OdaClient::call_operation`].
    pub fn call_operation(
        &self,
        operation_id: &str,
        path_params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let operation = find_operation(operation_id)?;
        self.send(operation, path_params, query, body)
    }

    pub fn list<E: Entity>(&self, query: &QueryOptions) -> Result<Collection<E>, ClientError> {
        self.list_in(E::ENTITY_SET, query)
    }

    pub fn list_in<T: DeserializeOwned>(
        &self,
        entity_set: &str,
        query: &QueryOptions,
    ) -> Result<Collection<T>, ClientError> {
        let operation = find_entity_operation(entity_set, OperationKind::List, None)?;
        decode(self.send_keyed(operation, None, query, None)?)
    }

    pub fn get<E: Entity>(&self, id: i64, query: &QueryOptions) -> Result<E, ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Get, None)?;
        decode(self.send_keyed(operation, Some(id), query, None)?)
    }

    pub fn create<E: Entity>(&self, body: &E::Create) -> Result<E, ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Create, None)?;
        let body = encode(body)?;
        decode(self.send_keyed(operation, None, &QueryOptions::default(), Some(body))?)
    }

    pub fn update<E: Entity>(&self, id: i64, body: &E::Update) -> Result<(), ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Update, None)?;
        let body = encode(body)?;
        self.send_keyed(operation, Some(id), &QueryOptions::default(), Some(body))?;
        Ok(())
    }

    pub fn delete<E: Entity>(&self, id: i64) -> Result<(), ClientError> {
        let operation = find_entity_operation(E::ENTITY_SET, OperationKind::Delete, None)?;
        self.send_keyed(operation, Some(id), &QueryOptions::default(), None)?;
        Ok(())
    }

    pub fn list_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        query: &QueryOptions,
    ) -> Result<Collection<R>, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::ListRelated, Some(navigation))?;
        decode(self.send_keyed(operation, Some(id), query, None)?)
    }

    pub fn get_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        query: &QueryOptions,
    ) -> Result<Option<R>, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::GetRelated, Some(navigation))?;
        decode(self.send_keyed(operation, Some(id), query, None)?)
    }

    pub fn create_related<E: Entity, R: Entity>(
        &self,
        id: i64,
        navigation: &str,
        body: &R::Create,
    ) -> Result<R, ClientError> {
        check_navigation(E::ENTITY_SET, navigation, R::ENTITY_SET)?;
        let operation =
            find_entity_operation(E::ENTITY_SET, OperationKind::CreateRelated, Some(navigation))?;
        let body = encode(body)?;
        decode(self.send_keyed(operation, Some(id), &QueryOptions::default(), Some(body))?)
    }

    pub fn batch(&self, body: Value) -> Result<Value, ClientError> {
        self.call_operation(BATCH_OPERATION, &[], &[], Some(body))
    }

    fn send_keyed(
        &self,
        operation: &OperationDefinition,
        id: Option<i64>,
        query: &QueryOptions,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let id = id.map(|id| id.to_string());
        let path_params = key_params(id.as_deref());
        let pairs = query.to_pairs();
        let query = borrow_pairs(&pairs);
        self.send(operation, &path_params, &query, body)
    }

    fn send(
        &self,
        operation: &OperationDefinition,
        path_params: &[(&str, &str)],
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let (method, path) = prepare(operation, path_params, query)?;
        let value = self
            .inner
            .request_json_with_query(method, &path, query, body)?;
        finish(operation, value)
    }
}

const BATCH_OPERATION: &str = "batchPost";

/// Validates the call against the operation and renders its path.
fn prepare(
    operation: &OperationDefinition,
    path_params: &[(&str, &str)],
    query: &[(&str, &str)],
) -> Result<(Method, String), ClientError> {
    check_query(operation, query)?;
    let path = render_path(operation, path_params)?;
    let method = parse_method(operation)?;
    Ok((method, path))
}

fn finish(operation: &OperationDefinition, mut value: Value) -> Result<Value, ClientError> {
    normalize_dates(&mut value, operation.response_dates)?;
    Ok(value)
}

fn key_params(id: Option<&str>) -> Vec<(&'static str, &str)> {
    id.map(|id| vec![("id", id)]).unwrap_or_default()
}

fn borrow_pairs<'a>(pairs: &'a [(&'static str, String)]) -> Vec<(&'a str, &'a str)> {
    pairs
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect()
}

fn encode<T: Serialize>(body: &T) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(body)?)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    Ok(serde_json::from_value(value)?)
}
