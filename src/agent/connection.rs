use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{AgentError, AppError, AppResult};

use super::protocol::{AgentInfo, JobSnapshot, JobState, Measurement, MeasurementMetadata, StartResponse};

/// Builds the process-wide HTTP client. Agents routinely run with
/// self-signed certificates, so validation is bypassed.
pub fn build_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|err| AppError::agent(AgentError::Client { source: err }))
}

/// Stateful client for one `(job, endpoint)` pair. Owns the measurement
/// queue; the poll loop is the only appender, and the auto-flush drain is
/// serialized against it by the queue mutex.
pub struct JobConnection {
    client: reqwest::Client,
    endpoint: String,
    job_name: String,
    template: Value,
    job_id: Option<String>,
    state: JobState,
    observed_failed: bool,
    metadata: Vec<MeasurementMetadata>,
    queue: Mutex<Vec<Measurement>>,
    server_seen: usize,
    info: Option<AgentInfo>,
}

impl JobConnection {
    pub fn new(client: reqwest::Client, job_name: &str, template: Value, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            job_name: job_name.to_owned(),
            template,
            job_id: None,
            state: JobState::New,
            observed_failed: false,
            metadata: Vec::new(),
            queue: Mutex::new(Vec::new()),
            server_seen: 0,
            info: None,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn last_state(&self) -> JobState {
        self.state
    }

    /// True once any poll observed `Failed`, even after teardown moves the
    /// local state on to `Stopping` or `Deleted`.
    pub fn observed_failed(&self) -> bool {
        self.observed_failed
    }

    fn note_state(&mut self, state: JobState) {
        self.state = state;
        if state == JobState::Failed {
            self.observed_failed = true;
        }
    }

    pub fn metadata(&self) -> &[MeasurementMetadata] {
        &self.metadata
    }

    /// Info fetched by an earlier [`JobConnection::info`] call, if any.
    pub fn cached_info(&self) -> Option<&AgentInfo> {
        self.info.as_ref()
    }

    pub fn measurements(&self) -> Vec<Measurement> {
        self.queue
            .lock()
            .map(|queue| queue.clone())
            .unwrap_or_default()
    }

    pub fn has_delimiter(&self) -> bool {
        self.queue
            .lock()
            .map(|queue| queue.iter().any(|measurement| measurement.is_delimiter))
            .unwrap_or(false)
    }

    /// Atomically removes and returns the queue prefix up to and including
    /// the first delimiter. Anything after the delimiter is discarded
    /// locally; the agent still holds it and the next snapshot re-delivers.
    pub fn drain_to_delimiter(&self) -> Option<Vec<Measurement>> {
        let mut queue = self.queue.lock().ok()?;
        let position = queue.iter().position(|measurement| measurement.is_delimiter)?;
        let batch: Vec<Measurement> = queue.drain(..=position).collect();
        queue.clear();
        Some(batch)
    }

    /// POSTs the job template; the agent allocates a job id.
    pub async fn start(&mut self) -> AppResult<()> {
        const OP: &str = "start";
        let url = format!("{}/jobs", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&self.template)
            .send()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(OP, status.as_u16()));
        }
        let accepted: StartResponse = response
            .json()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        info!(
            "Job '{}' started on {} (id {})",
            self.job_name, self.endpoint, accepted.id
        );
        self.job_id = Some(accepted.id);
        self.state = JobState::Initializing;
        Ok(())
    }

    pub async fn state(&mut self) -> AppResult<JobState> {
        const OP: &str = "state";
        let url = format!("{}/state", self.job_url(OP)?);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(OP, status.as_u16()));
        }
        let state: JobState = response
            .json()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        self.note_state(state);
        Ok(state)
    }

    /// Pulls the full snapshot and merge-appends new measurements in
    /// delivery order. The high-water mark skips samples already delivered.
    pub async fn try_update(&mut self) -> AppResult<()> {
        const OP: &str = "update";
        let url = self.job_url(OP)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(OP, status.as_u16()));
        }
        let snapshot: JobSnapshot = response
            .json()
            .await
            .map_err(|err| self.request_error(OP, err))?;

        self.note_state(snapshot.state);
        if !snapshot.metadata.is_empty() {
            self.metadata = snapshot.metadata;
        }
        let total = snapshot.measurements.len();
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(snapshot.measurements.into_iter().skip(self.server_seen));
        }
        self.server_seen = total;
        Ok(())
    }

    /// Asks the agent to drop every buffered measurement.
    pub async fn clear_measurements(&mut self) -> AppResult<()> {
        const OP: &str = "clear";
        let url = format!("{}/resultsclear", self.job_url(OP)?);
        self.post_ok(OP, &url).await?;
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
        self.server_seen = 0;
        Ok(())
    }

    /// Asks the agent to drop measurements up to and including the most
    /// recent delimiter.
    pub async fn flush_measurements(&mut self) -> AppResult<()> {
        const OP: &str = "flush";
        let url = format!("{}/resultsflush", self.job_url(OP)?);
        self.post_ok(OP, &url).await?;
        self.server_seen = 0;
        Ok(())
    }

    /// Requests a graceful stop; returns once the agent acknowledges.
    pub async fn stop(&mut self) -> AppResult<()> {
        const OP: &str = "stop";
        let url = format!("{}/stop", self.job_url(OP)?);
        self.post_ok(OP, &url).await?;
        self.state = JobState::Stopping;
        Ok(())
    }

    pub async fn delete(&mut self) -> AppResult<()> {
        const OP: &str = "delete";
        let url = self.job_url(OP)?;
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(self.status_error(OP, status.as_u16()));
        }
        self.state = JobState::Deleted;
        Ok(())
    }

    /// Pulls agent-side artifacts next to the working directory. A 404 means
    /// the job produced none.
    pub async fn download_assets(&mut self) -> AppResult<()> {
        const OP: &str = "assets";
        let url = format!("{}/assets", self.job_url(OP)?);
        let destination = PathBuf::from(format!(
            "{}-{}.assets.zip",
            self.job_name,
            sanitize_endpoint(&self.endpoint)
        ));
        self.download_to(OP, &url, &destination).await
    }

    /// Streams the trace file to `destination`, renamed into place on
    /// success.
    pub async fn download_trace(&mut self, destination: &Path) -> AppResult<()> {
        const OP: &str = "trace";
        let url = format!("{}/trace", self.job_url(OP)?);
        self.download_to(OP, &url, destination).await
    }

    /// Returns OS/arch facts, cached for the connection lifetime.
    pub async fn info(&mut self) -> AppResult<AgentInfo> {
        if let Some(info) = &self.info {
            return Ok(info.clone());
        }
        const OP: &str = "info";
        let url = format!("{}/info", self.endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.status_error(OP, status.as_u16()));
        }
        let info: AgentInfo = response
            .json()
            .await
            .map_err(|err| self.request_error(OP, err))?;
        self.info = Some(info.clone());
        Ok(info)
    }

    async fn download_to(&self, op: &'static str, url: &str, destination: &Path) -> AppResult<()> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.request_error(op, err))?;
        let status = response.status();
        if status.as_u16() == 404 {
            debug!("Nothing to download for '{}' from {}", op, self.endpoint);
            return Ok(());
        }
        if !status.is_success() {
            return Err(self.status_error(op, status.as_u16()));
        }

        let tmp = PathBuf::from(format!("{}.tmp", destination.display()));
        let mut file = tokio::fs::File::create(&tmp).await.map_err(|err| {
            AppError::agent(AgentError::Io {
                context: "create download file",
                source: err,
            })
        })?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| self.request_error(op, err))?
        {
            file.write_all(&chunk).await.map_err(|err| {
                AppError::agent(AgentError::Io {
                    context: "write download file",
                    source: err,
                })
            })?;
        }
        file.flush().await.map_err(|err| {
            AppError::agent(AgentError::Io {
                context: "flush download file",
                source: err,
            })
        })?;
        drop(file);
        tokio::fs::rename(&tmp, destination).await.map_err(|err| {
            AppError::agent(AgentError::Io {
                context: "finalize download file",
                source: err,
            })
        })?;
        debug!("Downloaded {:?} from {}", destination, self.endpoint);
        Ok(())
    }

    async fn post_ok(&self, op: &'static str, url: &str) -> AppResult<()> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|err| self.request_error(op, err))?;
        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(self.status_error(op, status.as_u16()));
        }
        Ok(())
    }

    fn job_url(&self, op: &'static str) -> AppResult<String> {
        let id = self
            .job_id
            .as_deref()
            .ok_or_else(|| AppError::agent(AgentError::NotStarted { op }))?;
        Ok(format!("{}/jobs/{}", self.endpoint, id))
    }

    fn request_error(&self, op: &'static str, err: reqwest::Error) -> AppError {
        AppError::agent(AgentError::Request {
            op,
            endpoint: self.endpoint.clone(),
            source: err,
        })
    }

    fn status_error(&self, op: &'static str, status: u16) -> AppError {
        AppError::agent(AgentError::Status {
            op,
            endpoint: self.endpoint.clone(),
            status,
        })
    }

    #[cfg(test)]
    pub(crate) fn push_measurements(&self, items: Vec<Measurement>) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.extend(items);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_metadata(&mut self, metadata: Vec<MeasurementMetadata>) {
        self.metadata = metadata;
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: JobState) {
        self.note_state(state);
    }
}

fn sanitize_endpoint(endpoint: &str) -> String {
    endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect()
}
