//! Shopify Admin GraphQL bulk operations

use super::{BulkExportApi, BulkJob};
use crate::error::ConnectorError;
use crate::http::{build_client, status_error};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tally_model::CommerceCredentials;
use tracing::debug;

const CURRENT_JOB_QUERY: &str = r#"
query {
  currentBulkOperation {
    id
    status
    errorCode
    url
  }
}
"#;

const JOB_QUERY: &str = r#"
query($id: ID!) {
  node(id: $id) {
    ... on BulkOperation {
      id
      status
      errorCode
      url
    }
  }
}
"#;

const CANCEL_MUTATION: &str = r#"
mutation($id: ID!) {
  bulkOperationCancel(id: $id) {
    bulkOperation { id status }
    userErrors { field message }
  }
}
"#;

const RUN_MUTATION: &str = r#"
mutation($query: String!) {
  bulkOperationRunQuery(query: $query) {
    bulkOperation { id status errorCode url }
    userErrors { field message }
  }
}
"#;

/// Bulk export API over Shopify Admin GraphQL
pub struct ShopifyBulkApi {
    client: reqwest::Client,
    api_version: String,
}

impl ShopifyBulkApi {
    /// Create the API client
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS or proxy misconfiguration)
    pub fn new(api_version: &str, timeout: Duration) -> Result<Self, ConnectorError> {
        Ok(Self {
            client: build_client("Shopify", timeout)?,
            api_version: api_version.to_string(),
        })
    }

    /// Build GraphQL endpoint URL for a store
    fn graphql_url(&self, store: &str) -> String {
        format!("https://{}/admin/api/{}/graphql.json", store, self.api_version)
    }

    /// Run a GraphQL document and decode its `data`
    async fn graphql<T: DeserializeOwned>(
        &self,
        credentials: &CommerceCredentials,
        document: &str,
        variables: Value,
    ) -> Result<T, ConnectorError> {
        let url = self.graphql_url(&credentials.shop_domain);
        let response = self
            .client
            .post(&url)
            .header("X-Shopify-Access-Token", &credentials.access_token)
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "graphql").await);
        }

        let body: GraphQlResponse<T> = response.json().await?;
        if let Some(errors) = body.errors
            && !errors.is_empty()
        {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            if errors
                .iter()
                .any(|e| e.extensions.as_ref().is_some_and(|x| x.code.as_deref() == Some("THROTTLED")))
            {
                return Err(ConnectorError::RateLimited {
                    retry_after_secs: 2,
                });
            }
            return Err(ConnectorError::InvalidResponse(message));
        }

        body.data
            .ok_or_else(|| ConnectorError::InvalidResponse("GraphQL response without data".into()))
    }
}

#[async_trait]
impl BulkExportApi for ShopifyBulkApi {
    async fn current_job(
        &self,
        credentials: &CommerceCredentials,
    ) -> Result<Option<BulkJob>, ConnectorError> {
        let data: CurrentJobData = self
            .graphql(credentials, CURRENT_JOB_QUERY, json!({}))
            .await?;
        Ok(data.current_bulk_operation)
    }

    async fn cancel_job(
        &self,
        credentials: &CommerceCredentials,
        job_id: &str,
    ) -> Result<(), ConnectorError> {
        let data: CancelData = self
            .graphql(credentials, CANCEL_MUTATION, json!({ "id": job_id }))
            .await?;
        check_user_errors(&data.bulk_operation_cancel.user_errors)?;
        debug!(connector = "commerce", job = job_id, "cancel requested");
        Ok(())
    }

    async fn start_job(
        &self,
        credentials: &CommerceCredentials,
        query: &str,
    ) -> Result<BulkJob, ConnectorError> {
        let data: RunData = self
            .graphql(credentials, RUN_MUTATION, json!({ "query": query }))
            .await?;
        check_user_errors(&data.bulk_operation_run_query.user_errors)?;
        data.bulk_operation_run_query.bulk_operation.ok_or_else(|| {
            ConnectorError::BulkJob("bulkOperationRunQuery returned no operation".into())
        })
    }

    async fn job(
        &self,
        credentials: &CommerceCredentials,
        job_id: &str,
    ) -> Result<BulkJob, ConnectorError> {
        let data: NodeData = self
            .graphql(credentials, JOB_QUERY, json!({ "id": job_id }))
            .await?;
        data.node
            .ok_or_else(|| ConnectorError::NotFound(format!("bulk operation {}", job_id)))
    }

    async fn download(&self, url: &str) -> Result<String, ConnectorError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(status_error(response, "bulk download").await);
        }
        Ok(response.text().await?)
    }
}

fn check_user_errors(errors: &[UserError]) -> Result<(), ConnectorError> {
    if errors.is_empty() {
        return Ok(());
    }
    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(ConnectorError::BulkJob(message))
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorExtensions {
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentJobData {
    current_bulk_operation: Option<BulkJob>,
}

#[derive(Debug, Deserialize)]
struct NodeData {
    node: Option<BulkJob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelData {
    bulk_operation_cancel: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunData {
    bulk_operation_run_query: MutationPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    bulk_operation: Option<BulkJob>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
struct UserError {
    message: String,
}
