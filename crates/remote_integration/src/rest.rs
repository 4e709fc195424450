use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{BlobObject, ListObjectsRequest, RemoveObjectsRequest, BLOB_LIST_LIMIT},
};
use tracing::debug;
use url::Url;

use crate::{BlobStore, TableBackend};

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

#[derive(Debug, Clone)]
pub struct RestBackendOptions {
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
    pub request_timeout: Duration,
}

/// HTTP client for the hosted project backend: a PostgREST-style table API
/// under `/rest/v1` and an object storage API under `/storage/v1`.
#[derive(Clone)]
pub struct RestBackend {
    http: Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

impl RestBackend {
    pub fn new(options: RestBackendOptions) -> Result<Self> {
        let base_url = Url::parse(options.base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid backend url '{}'", options.base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("backend url '{}' cannot carry a path", base_url));
        }
        if options.bucket.trim().is_empty() {
            return Err(anyhow!("storage bucket name must not be empty"));
        }
        let http = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            api_key: options.api_key,
            bucket: options.bucket,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }

    fn table_url(&self, table: &str) -> Url {
        self.endpoint(["rest", "v1", table])
    }

    fn object_url(&self, path: &str) -> Url {
        self.endpoint(
            ["storage", "v1", "object", self.bucket.as_str()]
                .into_iter()
                .chain(path.split('/').filter(|segment| !segment.is_empty())),
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn expect_rows(&self, request: RequestBuilder, what: &str) -> Result<Vec<Value>> {
        let response = checked(self.authorized(request).send().await?).await?;
        response
            .json::<Vec<Value>>()
            .await
            .with_context(|| format!("failed to decode {what} response"))
    }
}

/// Turns a non-success response into an [`ApiError`] carrying the service's message.
async fn checked(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_response(status.as_u16(), &body).into())
}

fn id_filter(id: &str) -> [(&'static str, String); 1] {
    [("id", format!("eq.{id}"))]
}

fn single_row(rows: Vec<Value>, table: &str, id: &str) -> Result<Value> {
    rows.into_iter().next().ok_or_else(|| {
        ApiError::new(
            ErrorCode::NotFound,
            format!("no row with id {id} in table {table}"),
        )
        .into()
    })
}

#[async_trait]
impl TableBackend for RestBackend {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>> {
        debug!(table, "select all rows");
        let request = self.http.get(self.table_url(table)).query(&[("select", "*")]);
        self.expect_rows(request, table).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        debug!(table, "insert row");
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);
        let rows = self.expect_rows(request, table).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("insert into {table} returned no row"))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        debug!(table, id, "update row");
        let request = self
            .http
            .patch(self.table_url(table))
            .query(&id_filter(id))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);
        let rows = self.expect_rows(request, table).await?;
        single_row(rows, table, id)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        debug!(table, id, "delete row");
        let request = self
            .http
            .delete(self.table_url(table))
            .query(&id_filter(id))
            .header("Prefer", RETURN_REPRESENTATION);
        let rows = self.expect_rows(request, table).await?;
        single_row(rows, table, id).map(|_| ())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        debug!(table, rows = rows.len(), "upsert rows");
        let request = self
            .http
            .post(self.table_url(table))
            .header("Prefer", MERGE_DUPLICATES)
            .json(&rows);
        self.expect_rows(request, table).await
    }
}

#[async_trait]
impl BlobStore for RestBackend {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobObject>> {
        debug!(bucket = %self.bucket, prefix, "list objects");
        let url = self.endpoint(["storage", "v1", "object", "list", self.bucket.as_str()]);
        let request = self.http.post(url).json(&ListObjectsRequest {
            prefix: prefix.to_string(),
            limit: BLOB_LIST_LIMIT,
            offset: 0,
        });
        let response = checked(self.authorized(request).send().await?).await?;
        let objects: Vec<BlobObject> = response
            .json()
            .await
            .context("failed to decode object listing")?;
        // Folder placeholders are listed like files.
        Ok(objects
            .into_iter()
            .filter(|object| !object.name.starts_with('.'))
            .collect())
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        debug!(bucket = %self.bucket, path, size = bytes.len(), "upload object");
        let request = self
            .http
            .post(self.object_url(path))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        checked(self.authorized(request).send().await?).await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.endpoint(
            ["storage", "v1", "object", "public", self.bucket.as_str()]
                .into_iter()
                .chain(path.split('/').filter(|segment| !segment.is_empty())),
        )
        .to_string()
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        debug!(bucket = %self.bucket, count = paths.len(), "remove objects");
        let url = self.endpoint(["storage", "v1", "object", self.bucket.as_str()]);
        let request = self.http.delete(url).json(&RemoveObjectsRequest {
            prefixes: paths.to_vec(),
        });
        checked(self.authorized(request).send().await?).await?;
        Ok(())
    }
}
