use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use crate::ClientError;
use crate::model::ODataError;

/// Generic async JSON REST client.
///
/// This client is transport-focused and knows nothing about entity sets.
/// For operation-id and typed calls generated from `metadata/oda.json`, use
/// [`crate::OdaClient`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: Url,
    authorization_token: Option<String>,
    http: reqwest::Client,
}

impl ApiClient {
    /// Creates a new client with the given base URL.
    ///
    /// The URL is normalized to include a trailing slash, so relative endpoint
    /// paths join correctly.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url.as_ref())?,
            authorization_token: None,
            http: reqwest::Client::new(),
        })
    }

    /// Returns a new client with a bearer token attached to all requests.
    #[must_use]
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.authorization_token = Some(token.into());
        self
    }

    /// Returns a new client sending through `http`, e.g. one configured with
    /// timeouts, proxies or default headers.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends a `GET` request and parses the response as JSON.
    pub async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        self.request_json(Method::GET, path, None).await
    }

    /// Sends a `GET` request with query parameters and parses the response as JSON.
    pub async fn get_json_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ClientError> {
        self.request_json_with_query(Method::GET, path, query, None)
            .await
    }

    /// Sends a `POST` request with a JSON body and parses the response as JSON.
    pub async fn post_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request_json(Method::POST, path, Some(body)).await
    }

    /// Sends a `PATCH` request with a JSON body and parses the response as JSON.
    pub async fn patch_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request_json(Method::PATCH, path, Some(body)).await
    }

    /// Sends a `DELETE` request and parses the response as JSON.
    pub async fn delete_json(&self, path: &str) -> Result<Value, ClientError> {
        self.request_json(Method::DELETE, path, None).await
    }

    /// Sends a request and parses the response as JSON.
    ///
    /// Use [`Self::request_json_with_query`] when query parameters are needed.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.request_json_with_query(method, path, &[], body).await
    }

    /// Sends a request with query parameters and parses the response as JSON.
    ///
    /// Returns [`Value::Null`] for successful responses with an empty body
    /// (`204 No Content` from `PATCH` and `DELETE`).
    pub async fn request_json_with_query(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let url = build_url(&self.base_url, path)?;
        tracing::debug!(%method, %url, ?query, "sending request");

        let mut request = self
            .http
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(token) = &self.authorization_token {
            request = request.bearer_auth(token);
        }

        if let Some(json_body) = body {
            request = request.json(&json_body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload = response.text().await?;

        decode_response(status, &payload)
    }
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, ClientError> {
    let parsed =
        Url::parse(base_url).map_err(|_| ClientError::InvalidBaseUrl(base_url.to_owned()))?;
    Ok(ensure_trailing_slash(parsed))
}

pub(crate) fn build_url(base_url: &Url, path: &str) -> Result<Url, ClientError> {
    let relative = path.trim_start_matches('/');
    base_url
        .join(relative)
        .map_err(|_| ClientError::InvalidPath(path.to_owned()))
}

/// Maps a status and raw body to JSON or the matching [`ClientError`].
pub(crate) fn decode_response(status: StatusCode, payload: &str) -> Result<Value, ClientError> {
    if !status.is_success() {
        tracing::warn!(%status, "request failed");
        return Err(match serde_json::from_str::<ODataError>(payload) {
            Ok(envelope) => ClientError::Service {
                status,
                detail: envelope.error,
            },
            Err(_) => ClientError::HttpStatus {
                status,
                body: payload.to_owned(),
            },
        });
    }

    tracing::debug!(%status, bytes = payload.len(), "received response");
    if payload.trim().is_empty() {
        Ok(Value::Null)
    } else {
        Ok(serde_json::from_str(payload)?)
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_owned();
        path.push('/');
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::{Value, json};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{ApiClient, build_url, decode_response, parse_base_url};
    use crate::ClientError;

    #[test]
    fn joins_paths_from_base_with_nested_prefix() {
        let base = parse_base_url("https://oda.ft.dk/api").expect("valid url");
        let resolved = build_url(&base, "/Sag(5)").expect("valid path");
        assert_eq!(resolved.as_str(), "https://oda.ft.dk/api/Sag(5)");
    }

    #[test]
    fn percent_encodes_danish_entity_sets() {
        let base = parse_base_url("https://oda.ft.dk/api/").expect("valid url");
        let resolved = build_url(&base, "/Aktør").expect("valid path");
        assert_eq!(resolved.as_str(), "https://oda.ft.dk/api/Akt%C3%B8r");
    }

    #[test]
    fn rejects_relative_base_url() {
        assert!(matches!(
            ApiClient::new("oda.ft.dk/api"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn decode_maps_error_envelope_to_service_error() {
        let body = r#"{"error":{"code":"400","message":{"lang":"en-US","value":"bad $filter"}}}"#;
        let error = decode_response(StatusCode::BAD_REQUEST, body).expect_err("non-success");
        match error {
            ClientError::Service { status, detail } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(detail.message.value, "bad $filter");
            }
            other => panic!("unexpected error: {other}"),
        }

        let error = decode_response(StatusCode::BAD_GATEWAY, "upstream down").expect_err("plain");
        assert!(matches!(error, ClientError::HttpStatus { ref body, .. } if body == "upstream down"));
    }

    #[test]
    fn decode_treats_empty_success_body_as_null() {
        assert_eq!(
            decode_response(StatusCode::NO_CONTENT, "").expect("empty"),
            Value::Null
        );
    }

    #[tokio::test]
    async fn sends_query_auth_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/Emneord"))
            .and(query_param("$select", "id"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({ "emneord": "skat" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api", server.uri()))
            .expect("valid url")
            .with_authorization_token("secret");
        let value = client
            .request_json_with_query(
                reqwest::Method::POST,
                "/Emneord",
                &[("$select", "id")],
                Some(json!({ "emneord": "skat" })),
            )
            .await
            .expect("request succeeds");

        assert_eq!(value, json!({ "id": 7 }));
    }
}
