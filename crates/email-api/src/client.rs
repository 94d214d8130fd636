//! HTTP client for the EmailSort backend.

use crate::error::{ApiError, ApiResult, UnsubscribeError};
use crate::types::{
    Category, DeleteEmailsRequest, EmailDetail, EmailSummary, LinkedAccount, NewCategory,
};
use auth_session::Session;
use tracing::{debug, error, warn};

/// Client for the EmailSort backend REST API.
///
/// Protected calls carry `Authorization: Bearer <access_token>` and
/// `X-Google-Token: <provider_token>`. Callers are expected to have run the
/// session through the token guard first; an absent delegated token is sent
/// as an empty header and rejected server-side.
#[derive(Clone)]
pub struct EmailApiClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl EmailApiClient {
    /// Create a new backend client.
    ///
    /// # Arguments
    /// * `api_url` - The backend base URL (e.g., `http://localhost:8000`)
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            http_client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Build the full URL for an endpoint path.
    fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Attach the protected-call headers.
    fn protected(
        &self,
        request: reqwest::RequestBuilder,
        session: &Session,
    ) -> reqwest::RequestBuilder {
        request
            .header(
                "Authorization",
                format!("Bearer {}", session.access_token),
            )
            .header(
                "X-Google-Token",
                session.provider_token.clone().unwrap_or_default(),
            )
            .header("Content-Type", "application/json")
    }

    /// Register the primary linked account (the per-sign-in onboarding side
    /// effect).
    pub async fn store_primary_account(&self, session: &Session) -> ApiResult<()> {
        let endpoint = "emails/store-primary-account";
        debug!(endpoint, "Storing primary account");

        let response = self
            .protected(self.http_client.post(self.endpoint_url(endpoint)), session)
            .send()
            .await?;

        ensure_success(response, endpoint).await?;
        Ok(())
    }

    /// Ask the backend to pull fresh source data from the mailbox.
    pub async fn trigger_collection(&self, session: &Session) -> ApiResult<()> {
        let endpoint = "emails/collection";
        debug!(endpoint, "Triggering email collection");

        let response = self
            .protected(self.http_client.post(self.endpoint_url(endpoint)), session)
            .send()
            .await?;

        ensure_success(response, endpoint).await?;
        Ok(())
    }

    /// Fetch the current categorized email snapshot.
    pub async fn fetch_emails(&self, session: &Session) -> ApiResult<Vec<EmailSummary>> {
        let endpoint = "emails";

        let response = self
            .protected(self.http_client.get(self.endpoint_url(endpoint)), session)
            .send()
            .await?;

        let response = ensure_success(response, endpoint).await?;
        Ok(response.json().await?)
    }

    /// Fetch one email's full detail.
    pub async fn fetch_email(
        &self,
        session: &Session,
        gmail_message_id: &str,
    ) -> ApiResult<EmailDetail> {
        let endpoint = format!("emails/{}", gmail_message_id);

        let response = self
            .protected(self.http_client.get(self.endpoint_url(&endpoint)), session)
            .send()
            .await?;

        let response = ensure_success(response, &endpoint).await?;
        Ok(response.json().await?)
    }

    /// Fetch the category list.
    pub async fn fetch_categories(&self, session: &Session) -> ApiResult<Vec<Category>> {
        let endpoint = "categories";

        let response = self
            .protected(self.http_client.get(self.endpoint_url(endpoint)), session)
            .send()
            .await?;

        let response = ensure_success(response, endpoint).await?;
        Ok(response.json().await?)
    }

    /// Create a new category.
    pub async fn create_category(
        &self,
        session: &Session,
        category: &NewCategory,
    ) -> ApiResult<Category> {
        let endpoint = "categories";
        debug!(endpoint, name = %category.name, "Creating category");

        let response = self
            .protected(self.http_client.post(self.endpoint_url(endpoint)), session)
            .json(category)
            .send()
            .await?;

        let response = ensure_success(response, endpoint).await?;
        Ok(response.json().await?)
    }

    /// Delete a batch of emails by Gmail message ID.
    pub async fn delete_emails(&self, session: &Session, gmail_message_ids: &[String]) -> ApiResult<()> {
        let endpoint = "emails/delete";
        debug!(endpoint, count = gmail_message_ids.len(), "Deleting emails");

        let response = self
            .protected(self.http_client.post(self.endpoint_url(endpoint)), session)
            .json(&DeleteEmailsRequest {
                gmail_message_ids: gmail_message_ids.to_vec(),
            })
            .send()
            .await?;

        ensure_success(response, endpoint).await?;
        Ok(())
    }

    /// Unsubscribe from the sender of a single email.
    pub async fn unsubscribe(&self, session: &Session, gmail_message_id: &str) -> ApiResult<()> {
        let endpoint = format!("emails/unsubscribe/{}", gmail_message_id);

        let response = self
            .protected(self.http_client.post(self.endpoint_url(&endpoint)), session)
            .send()
            .await?;

        ensure_success(response, &endpoint).await?;
        Ok(())
    }

    /// Unsubscribe from a set of emails, one item at a time.
    ///
    /// Items are processed sequentially and the loop stops at the first
    /// failure: a failure on item N leaves items before N already applied.
    /// Returns the number of items processed.
    pub async fn unsubscribe_all(
        &self,
        session: &Session,
        gmail_message_ids: &[String],
    ) -> Result<usize, UnsubscribeError> {
        let mut applied = 0;
        for gmail_message_id in gmail_message_ids {
            if let Err(source) = self.unsubscribe(session, gmail_message_id).await {
                warn!(
                    gmail_message_id = %gmail_message_id,
                    applied,
                    error = %source,
                    "Unsubscribe stopped at first failure"
                );
                return Err(UnsubscribeError { applied, source });
            }
            applied += 1;
        }
        Ok(applied)
    }

    /// List the mailbox accounts linked to the user.
    pub async fn linked_accounts(&self, session: &Session) -> ApiResult<Vec<LinkedAccount>> {
        let endpoint = "emails/accounts/linked";

        let response = self
            .protected(self.http_client.get(self.endpoint_url(endpoint)), session)
            .send()
            .await?;

        let response = ensure_success(response, endpoint).await?;
        Ok(response.json().await?)
    }

    /// URL the browser is sent to to start linking another mailbox account.
    ///
    /// The identity token travels as a query parameter because this is a
    /// top-level navigation, not an API call.
    pub fn gmail_link_url(&self, access_token: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("token", access_token)
            .finish();
        format!("{}?{}", self.endpoint_url("gmail/link"), query)
    }
}

/// Map a response to `Ok` on 2xx, `Unauthorized` on 401, and `Api` otherwise,
/// surfacing the backend's `detail` field when present.
async fn ensure_success(
    response: reqwest::Response,
    endpoint: &str,
) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        warn!(endpoint, "Backend rejected credentials");
        return Err(ApiError::Unauthorized {
            endpoint: endpoint.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or(body);

    error!(endpoint, status = %status, detail = %detail, "Backend call failed");

    Err(ApiError::Api {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        detail,
    })
}
