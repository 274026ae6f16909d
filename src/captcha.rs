use crate::config::CaptchaConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    #[error("captcha service error: {0}")]
    Service(String),
    #[error("captcha image is empty")]
    EmptyImage,
    #[error("captcha not solved after {polls} polls")]
    Timeout { polls: u32 },
    #[error("captcha service unreachable")]
    Http(#[from] reqwest::Error),
}

#[async_trait::async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Result<String, SolveError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateTask<'a> {
    client_key: &'a str,
    task: ImageToTextTask,
}

#[derive(Debug, Serialize)]
struct ImageToTextTask {
    #[serde(rename = "type")]
    kind: &'static str,
    body: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetTaskResult<'a> {
    client_key: &'a str,
    task_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceReply {
    error_id: u32,
    error_description: Option<String>,
    task_id: Option<u64>,
    status: Option<String>,
    solution: Option<Solution>,
}

#[derive(Debug, Deserialize)]
struct Solution {
    text: String,
}

impl ServiceReply {
    fn check(self) -> Result<Self, SolveError> {
        if self.error_id == 0 {
            Ok(self)
        } else {
            Err(SolveError::Service(
                self.error_description
                    .unwrap_or_else(|| format!("errorId {}", self.error_id)),
            ))
        }
    }
}

/// anti-captcha.com image-to-text client.
pub struct AntiCaptchaSolver {
    client: reqwest::Client,
    config: CaptchaConfig,
}

impl AntiCaptchaSolver {
    pub fn new(config: CaptchaConfig) -> Self {
        AntiCaptchaSolver {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn create_task_body(&self, image: &[u8]) -> CreateTask<'_> {
        CreateTask {
            client_key: &self.config.api_key,
            task: ImageToTextTask {
                kind: "ImageToTextTask",
                body: STANDARD.encode(image),
            },
        }
    }

    async fn call<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> Result<ServiceReply, SolveError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), method);
        let reply = self
            .client
            .post(url)
            .json(body)
            .send()
            .await?
            .json::<ServiceReply>()
            .await?;
        reply.check()
    }
}

#[async_trait::async_trait]
impl CaptchaSolver for AntiCaptchaSolver {
    async fn solve(&self, image: &[u8]) -> Result<String, SolveError> {
        if image.is_empty() {
            return Err(SolveError::EmptyImage);
        }

        let task_id = self
            .call("createTask", &self.create_task_body(image))
            .await?
            .task_id
            .ok_or_else(|| SolveError::Service("createTask returned no taskId".to_string()))?;
        debug!("captcha task {} created", task_id);

        let poll = GetTaskResult {
            client_key: &self.config.api_key,
            task_id,
        };
        for _ in 0..self.config.max_polls {
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;

            let reply = self.call("getTaskResult", &poll).await?;
            match (reply.status.as_deref(), reply.solution) {
                (Some("ready"), Some(solution)) => return Ok(solution.text),
                (Some("ready"), None) => {
                    return Err(SolveError::Service("ready without solution".to_string()))
                }
                _ => continue,
            }
        }

        warn!("captcha task {} still processing", task_id);
        Err(SolveError::Timeout {
            polls: self.config.max_polls,
        })
    }
}
