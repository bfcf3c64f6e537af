//! HTTP implementation of [`KnowledgeApi`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use docchat_core::{
    ChatAnswer, ChatRequest, CreatedStore, Error, FileRecord, FileUpload, KnowledgeApi,
    ModelDescriptor, ProgressCallback, Result, StoreListing,
};

use crate::config::ClientConfig;
use crate::error::to_docchat_error;
use crate::types::*;

/// Percent-encode each `/`-separated segment of a store id.
///
/// Store ids such as `fileSearchStores/abc` keep their separators so the
/// server's path routing still matches.
pub fn encode_store_id(store_id: &str) -> String {
    store_id
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split an upload body into chunks, reporting progress as each one is pulled.
fn progress_body(data: Vec<u8>, chunk_bytes: usize, progress: ProgressCallback) -> Body {
    let total = data.len() as u64;
    let data = Bytes::from(data);
    let step = chunk_bytes.max(1);

    let chunks: Vec<Bytes> = (0..data.len())
        .step_by(step)
        .map(|start| data.slice(start..(start + step).min(data.len())))
        .collect();

    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(sent, total);
        Ok::<Bytes, std::io::Error>(chunk)
    }));

    Body::wrap_stream(stream)
}

/// Client for the document-chat server's `/api` surface.
pub struct HttpApi {
    client: Client,
    config: ClientConfig,
}

impl HttpApi {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "client",
            base_url = %config.base_url,
            timeout_secs = ?config.timeout_seconds,
            "Initializing docchat HTTP client"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/api{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.client.get(self.url(endpoint))
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        self.client.post(self.url(endpoint))
    }

    /// Decode a JSON body, mapping non-2xx statuses to server errors.
    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::text);
            return Err(to_docchat_error(status.as_u16(), message));
        }

        serde_json::from_slice(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }

    async fn read_status(response: Response) -> Result<StatusResponse> {
        Self::read_json::<StatusResponse>(response)
            .await?
            .into_result()
    }
}

#[async_trait]
impl KnowledgeApi for HttpApi {
    async fn list_stores(&self) -> Result<StoreListing> {
        let response = self.get("/stores").send().await?;
        let body: StoreListResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(Error::Api(error));
        }

        debug!(result_count = body.stores.len(), "Listed stores");
        Ok(StoreListing {
            stores: body.stores,
            active_store_id: body.active_store_id,
        })
    }

    async fn create_store(&self, name: &str) -> Result<CreatedStore> {
        let response = self
            .post("/stores")
            .json(&CreateStoreRequest { name })
            .send()
            .await?;
        let body = Self::read_status(response).await?;

        let id = body
            .id
            .ok_or_else(|| Error::MalformedResponse("create store: missing `id`".to_string()))?;
        info!(store_id = %id, "Created store");
        Ok(CreatedStore {
            id,
            name: body.name.unwrap_or_else(|| name.to_string()),
        })
    }

    async fn delete_store(&self, store_id: &str) -> Result<()> {
        let endpoint = format!("/stores/{}", encode_store_id(store_id));
        let response = self.client.delete(self.url(&endpoint)).send().await?;
        Self::read_status(response).await?;
        info!(store_id, "Deleted store");
        Ok(())
    }

    async fn set_active_store(&self, store_id: &str) -> Result<()> {
        let response = self
            .post("/stores/active")
            .json(&SetActiveStoreRequest { store_id })
            .send()
            .await?;
        Self::read_status(response).await?;
        debug!(store_id, "Active store set");
        Ok(())
    }

    async fn list_files(&self, store_id: &str) -> Result<Vec<FileRecord>> {
        let endpoint = format!("/store/{}/files", encode_store_id(store_id));
        let response = self.get(&endpoint).send().await?;
        let body: FileListResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(Error::Api(error));
        }
        debug!(store_id, result_count = body.files.len(), "Listed files");
        Ok(body.files)
    }

    async fn upload_file(&self, upload: FileUpload, progress: ProgressCallback) -> Result<()> {
        let start = Instant::now();
        let total = upload.size();
        let name = upload.name;

        debug!(file_name = %name, total_bytes = total, "Starting upload");
        progress(0, total);

        let body = progress_body(upload.data, self.config.upload_chunk_bytes, progress);
        let part = Part::stream_with_length(body, total)
            .file_name(name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self.post("/upload").multipart(form).send().await?;
        match Self::read_status(response).await {
            Ok(_) => {
                info!(
                    file_name = %name,
                    total_bytes = total,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Upload complete"
                );
                Ok(())
            }
            Err(e) => {
                warn!(file_name = %name, error = %e, "Upload rejected");
                Err(e)
            }
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatAnswer> {
        let start = Instant::now();
        debug!(
            model = %request.model,
            message_len = request.message.len(),
            "Sending chat turn"
        );

        let response = self.post("/chat").json(request).send().await?;
        let body: ChatResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(Error::Api(error));
        }

        let text = body
            .response
            .ok_or_else(|| Error::MalformedResponse("chat: missing `response`".to_string()))?;
        let citations = body.citations.unwrap_or_default();

        debug!(
            result_count = citations.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat reply received"
        );
        Ok(ChatAnswer { text, citations })
    }

    async fn suggestions(&self, store_id: &str) -> Result<Vec<String>> {
        let endpoint = format!("/store/{}/suggestions", encode_store_id(store_id));
        let response = self.post(&endpoint).send().await?;
        let body: SuggestionsResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(Error::Api(error));
        }
        Ok(body.questions)
    }

    async fn list_models(&self) -> Result<Vec<ModelDescriptor>> {
        let response = self.get("/models").send().await?;
        let body: ModelListResponse = Self::read_json(response).await?;
        if let Some(error) = body.error {
            return Err(Error::Api(error));
        }
        debug!(result_count = body.models.len(), "Listed models");
        Ok(body.models)
    }

    async fn set_api_key(&self, key: &str) -> Result<()> {
        let response = self
            .post("/set_key")
            .json(&SetKeyRequest { api_key: key })
            .send()
            .await?;
        Self::read_status(response).await?;
        info!("API key updated");
        Ok(())
    }

    async fn has_api_key(&self) -> Result<bool> {
        let response = self.get("/has_key").send().await?;
        let body: HasKeyResponse = Self::read_json(response).await?;
        Ok(body.has_key)
    }

    async fn heartbeat(&self) -> Result<()> {
        let response = self.post("/heartbeat").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(to_docchat_error(status.as_u16(), None));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let response = self.post("/shutdown").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(to_docchat_error(status.as_u16(), None));
        }
        info!("Server shutdown requested");
        Ok(())
    }
}
