//! HTTP adapter for the iFlytek PDF OCR service.
//!
//! ## Wire protocol
//!
//! ```text
//! POST {base}/start             multipart: file, exportFormat  → data.taskId
//! GET  {base}/getResult?taskId  → data.status, data.downloadUrl
//! GET  {downloadUrl}            → raw result bytes
//! ```
//!
//! Every JSON response is wrapped as `{ "code": 0, "desc": "...", "data": {...} }`;
//! a non-zero `code` is an application error. Task status codes are
//! `"1"` queued, `"2"` processing, `"3"` done, `"4"` failed.
//!
//! Each request is signed with three headers: `appId`, `timestamp` (unix
//! seconds) and `signature = base64(hmac_sha1(secret, md5_hex(appId + timestamp)))`.

use super::{RecognitionClient, ResultLocator, TaskHandle, TaskStatus};
use crate::config::{Credentials, ExportFormat};
use crate::error::{DocScanError, RecognitionError};
use crate::output::file_name;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use sha1::Sha1;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Production endpoint of the PDF OCR service.
pub const DEFAULT_BASE_URL: &str = "https://iocr.xfyun.cn/ocrzdq/v1/pdfOcr";

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    desc: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct StartData {
    #[serde(rename = "taskId")]
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    status: Value,
    #[serde(rename = "downloadUrl", default)]
    download_url: Option<String>,
    #[serde(default)]
    desc: Option<String>,
}

/// Client for the task-based PDF OCR API.
pub struct XunfeiClient {
    http: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

impl XunfeiClient {
    /// Build a client. Fails with `ClientInit` on empty credentials.
    pub fn new(credentials: Credentials, base_url: impl Into<String>) -> Result<Self, DocScanError> {
        if credentials.app_id.is_empty() || credentials.secret.is_empty() {
            return Err(DocScanError::ClientInit(
                "the OCR service needs both an app id and a secret".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| DocScanError::ClientInit(e.to_string()))?;

        info!(
            "OCR client ready (app id {}***)",
            credentials.app_id.chars().take(8).collect::<String>()
        );

        Ok(Self {
            http,
            credentials,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn signed(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, RecognitionError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&self.credentials.app_id, &self.credentials.secret, &timestamp)?;
        Ok(request
            .header("appId", &self.credentials.app_id)
            .header("timestamp", timestamp)
            .header("signature", signature))
    }
}

/// `base64(hmac_sha1(secret, md5_hex(app_id + timestamp)))`.
pub fn sign(app_id: &str, secret: &str, timestamp: &str) -> Result<String, RecognitionError> {
    let auth = format!("{:x}", md5::compute(format!("{app_id}{timestamp}")));
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| RecognitionError::Submission(format!("invalid signing key: {e}")))?;
    mac.update(auth.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Decode downloaded bytes as UTF-8, falling back to GBK (lossy).
pub fn decode_download(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
            if had_errors {
                warn!("OCR result is neither valid UTF-8 nor GBK; undecodable bytes replaced");
            }
            text.into_owned()
        }
    }
}

fn status_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RecognitionClient for XunfeiClient {
    fn name(&self) -> &str {
        "xunfei"
    }

    async fn submit(
        &self,
        document: &Path,
        format: ExportFormat,
    ) -> Result<TaskHandle, RecognitionError> {
        let bytes = tokio::fs::read(document).await.map_err(|e| {
            RecognitionError::Submission(format!("cannot read {}: {}", document.display(), e))
        })?;
        let name = file_name(document);
        debug!("Uploading {} ({} bytes)", name, bytes.len());

        let part = Part::bytes(bytes)
            .file_name(name)
            .mime_str("application/pdf")
            .map_err(|e| RecognitionError::Submission(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("exportFormat", format.as_str());

        let response = self
            .signed(self.http.post(format!("{}/start", self.base_url)))?
            .timeout(SUBMIT_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RecognitionError::Submission(e.to_string()))?;

        let body: ApiResponse<StartData> = response
            .json()
            .await
            .map_err(|e| RecognitionError::Submission(format!("malformed response: {e}")))?;

        match (body.code, body.data) {
            (0, Some(data)) => Ok(TaskHandle(data.task_id)),
            (0, None) => Err(RecognitionError::Submission("response carried no task id".into())),
            (code, _) => Err(RecognitionError::Submission(format!(
                "code {}: {}",
                code,
                body.desc.unwrap_or_else(|| "unknown error".into())
            ))),
        }
    }

    async fn poll(&self, task: &TaskHandle) -> Result<TaskStatus, RecognitionError> {
        let response = self
            .signed(self.http.get(format!("{}/getResult", self.base_url)))?
            .query(&[("taskId", task.0.as_str())])
            .timeout(POLL_TIMEOUT)
            .send()
            .await
            .map_err(|e| RecognitionError::TransientNetwork(e.to_string()))?;

        let body: ApiResponse<ResultData> = response
            .json()
            .await
            .map_err(|e| RecognitionError::TransientNetwork(format!("malformed response: {e}")))?;

        if body.code != 0 {
            return Err(RecognitionError::TaskFailed(format!(
                "status query rejected (code {}): {}",
                body.code,
                body.desc.unwrap_or_else(|| "unknown error".into())
            )));
        }
        let data = body
            .data
            .ok_or_else(|| RecognitionError::TransientNetwork("response carried no data".into()))?;

        let status = match status_code(&data.status).as_str() {
            "1" => TaskStatus::Queued,
            "2" => TaskStatus::Processing,
            "3" => match data.download_url {
                Some(url) if !url.is_empty() => TaskStatus::Done(ResultLocator(url)),
                _ => TaskStatus::Failed("task finished without a download URL".into()),
            },
            "4" => TaskStatus::Failed(data.desc.unwrap_or_else(|| "unknown error".into())),
            other => {
                warn!(task_id = %task.0, "Unknown task status '{}', still waiting", other);
                TaskStatus::Processing
            }
        };
        Ok(status)
    }

    async fn fetch(&self, locator: &ResultLocator) -> Result<String, RecognitionError> {
        let response = self
            .http
            .get(&locator.0)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| RecognitionError::Download(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RecognitionError::Download(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RecognitionError::Download(e.to_string()))?;
        let text = decode_download(&bytes);
        debug!("Downloaded OCR result: {} chars", text.chars().count());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;

    fn client(base: &str) -> XunfeiClient {
        XunfeiClient::new(Credentials::new("app123", "s3cret"), base).unwrap()
    }

    #[test]
    fn signature_matches_reference_vector() {
        assert_eq!(
            sign("app123", "s3cret", "1700000000").unwrap(),
            "TGgWclEx96dprIiHT6xLSZJBtQU="
        );
    }

    #[test]
    fn signing_accepts_any_key_length() {
        assert!(sign("app123", "", "1700000000").is_ok());
        assert!(sign("app123", &"k".repeat(200), "1700000000").is_ok());
    }

    #[test]
    fn empty_credentials_rejected() {
        let err = XunfeiClient::new(Credentials::new("", "x"), DEFAULT_BASE_URL)
            .err()
            .unwrap();
        assert!(matches!(err, DocScanError::ClientInit(_)));
    }

    #[test]
    fn download_falls_back_to_gbk() {
        assert_eq!(decode_download("plain utf-8 ✓".as_bytes()), "plain utf-8 ✓");
        assert_eq!(decode_download(&[0xd6, 0xd0, 0xce, 0xc4]), "中文");
    }

    #[tokio::test]
    async fn submit_returns_task_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/start")
            .match_header("appId", "app123")
            .match_header("signature", Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":0,"desc":"ok","data":{"taskId":"t-42"}}"#)
            .create_async()
            .await;

        let mut pdf = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        pdf.write_all(b"%PDF-1.7 fake").unwrap();

        let task = client(&server.url())
            .submit(pdf.path(), ExportFormat::Txt)
            .await
            .unwrap();
        assert_eq!(task, TaskHandle("t-42".into()));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_error_code_is_submission_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/start")
            .with_body(r#"{"code":10105,"desc":"illegal access"}"#)
            .create_async()
            .await;
        let pdf = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();

        let err = client(&server.url())
            .submit(pdf.path(), ExportFormat::Txt)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::Submission(ref m) if m.contains("illegal access")));
    }

    #[tokio::test]
    async fn poll_maps_status_codes() {
        let mut server = mockito::Server::new_async().await;
        let _processing = server
            .mock("GET", "/getResult")
            .match_query(Matcher::UrlEncoded("taskId".into(), "busy".into()))
            .with_body(r#"{"code":0,"data":{"status":"2"}}"#)
            .create_async()
            .await;
        let _done = server
            .mock("GET", "/getResult")
            .match_query(Matcher::UrlEncoded("taskId".into(), "ready".into()))
            .with_body(r#"{"code":0,"data":{"status":"3","downloadUrl":"https://dl/x.txt"}}"#)
            .create_async()
            .await;
        let _failed = server
            .mock("GET", "/getResult")
            .match_query(Matcher::UrlEncoded("taskId".into(), "bad".into()))
            .with_body(r#"{"code":0,"data":{"status":4,"desc":"blank pages"}}"#)
            .create_async()
            .await;

        let c = client(&server.url());
        assert_eq!(c.poll(&TaskHandle("busy".into())).await.unwrap(), TaskStatus::Processing);
        assert_eq!(
            c.poll(&TaskHandle("ready".into())).await.unwrap(),
            TaskStatus::Done(ResultLocator("https://dl/x.txt".into()))
        );
        assert_eq!(
            c.poll(&TaskHandle("bad".into())).await.unwrap(),
            TaskStatus::Failed("blank pages".into())
        );
    }

    #[tokio::test]
    async fn fetch_decodes_body_and_reports_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/files/ok.txt")
            .with_body("recognised text")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/files/gone.txt")
            .with_status(404)
            .create_async()
            .await;

        let c = client(&server.url());
        let text = c
            .fetch(&ResultLocator(format!("{}/files/ok.txt", server.url())))
            .await
            .unwrap();
        assert_eq!(text, "recognised text");

        let err = c
            .fetch(&ResultLocator(format!("{}/files/gone.txt", server.url())))
            .await
            .unwrap_err();
        assert_eq!(err, RecognitionError::Download("HTTP 404 Not Found".into()));
    }
}
