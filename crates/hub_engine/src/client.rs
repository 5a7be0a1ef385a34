use std::sync::Arc;
use std::time::Duration;

use hub_core::{Draft, DraftPatch, JobId, JobRequest, JobStatusReport};
use hub_logging::{hub_debug, hub_trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use crate::identity::IdentityProvider;
use crate::ApiError;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Root of the platform API, e.g. `https://hub.example.org/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Remote draft persistence.
#[async_trait::async_trait]
pub trait DraftApi: Send + Sync {
    /// `Ok(None)` when the draft does not exist remotely.
    async fn load_draft(&self, draft_id: &str) -> Result<Option<Draft>, ApiError>;
    async fn save_draft(&self, draft_id: &str, patch: &DraftPatch) -> Result<(), ApiError>;
    async fn delete_draft(&self, draft_id: &str) -> Result<(), ApiError>;
}

/// Long-running AI job submission and status.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobId, ApiError>;
    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobAccepted {
    job_id: JobId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    job_id: Option<JobId>,
}

/// `reqwest` implementation of both API traits with bearer authentication.
#[derive(Clone)]
pub struct ReqwestHubClient {
    base: Url,
    client: reqwest::Client,
    identity: Arc<dyn IdentityProvider>,
}

impl ReqwestHubClient {
    pub fn new(settings: ApiSettings, identity: Arc<dyn IdentityProvider>) -> Result<Self, ApiError> {
        let base = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            base,
            client,
            identity,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments.iter().copied());
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        if !self.identity.is_authenticated() {
            return Err(ApiError::Unauthorized);
        }
        let token = self.identity.access_token().ok_or(ApiError::Unauthorized)?;
        let url = self.url(segments)?;
        hub_trace!("{} {}", method, url);
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(map_reqwest_error)?;
        check_status(response).await
    }
}

fn json_body<T: serde::Serialize>(builder: RequestBuilder, body: &T) -> Result<RequestBuilder, ApiError> {
    let bytes = serde_json::to_vec(body).map_err(|err| ApiError::Decode(err.to_string()))?;
    Ok(builder.header(CONTENT_TYPE, "application/json").body(bytes))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let text = response.text().await.map_err(map_reqwest_error)?;
    serde_json::from_str(&text).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Maps a non-2xx answer onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    hub_debug!("API answered {}: {}", status, message);

    Err(match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Rejected {
            status: status.as_u16(),
            message,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::CONFLICT => ApiError::Conflict {
            existing: body.job_id,
        },
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    })
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(err.to_string());
    }
    ApiError::Network(err.to_string())
}

#[async_trait::async_trait]
impl DraftApi for ReqwestHubClient {
    async fn load_draft(&self, draft_id: &str) -> Result<Option<Draft>, ApiError> {
        let builder = self.request(Method::GET, &["draft", draft_id])?;
        match self.send(builder).await {
            Ok(response) => read_json(response).await.map(Some),
            Err(ApiError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn save_draft(&self, draft_id: &str, patch: &DraftPatch) -> Result<(), ApiError> {
        let builder = json_body(self.request(Method::PUT, &["draft", draft_id])?, patch)?;
        // The merged draft in the answer is not used; local state stays authoritative.
        self.send(builder).await.map(|_| ())
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &["draft", draft_id])?;
        match self.send(builder).await {
            Ok(_) | Err(ApiError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl JobApi for ReqwestHubClient {
    async fn submit_job(&self, request: &JobRequest) -> Result<JobId, ApiError> {
        let builder = json_body(self.request(Method::POST, &["job"])?, request)?;
        let response = self.send(builder).await?;
        let accepted: JobAccepted = read_json(response).await?;
        Ok(accepted.job_id)
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, ApiError> {
        let builder = self.request(Method::GET, &["job", job_id.as_str(), "status"])?;
        let response = self.send(builder).await?;
        read_json(response).await
    }
}
