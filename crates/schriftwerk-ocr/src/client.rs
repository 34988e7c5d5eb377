// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR backend trait and the HTTP multipart implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use schriftwerk_core::config::OcrServiceConfig;
use schriftwerk_core::error::{Result, SchriftwerkError};
use tracing::{debug, instrument};

/// Anything that can turn an encoded page image into an OCR payload.
///
/// The returned bytes are the raw response body; unwrap them with
/// [`crate::decode_payload`].
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn extract_text(&self, image: Vec<u8>, filename: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadMethod {
    Post,
    Put,
}

/// OCR service reached over HTTP with a multipart file upload.
pub struct HttpOcrService {
    client: reqwest::Client,
    method: UploadMethod,
    config: OcrServiceConfig,
}

impl HttpOcrService {
    /// Build the client. Fails on an unsupported method or if the TLS
    /// backend cannot be initialised.
    pub fn new(config: OcrServiceConfig) -> Result<Self> {
        let method = match config.method.to_ascii_uppercase().as_str() {
            "POST" => UploadMethod::Post,
            "PUT" => UploadMethod::Put,
            other => {
                return Err(SchriftwerkError::Config(format!(
                    "unsupported OCR upload method {}",
                    other
                )));
            }
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                SchriftwerkError::Transport(format!("failed to create HTTP client: {}", err))
            })?;

        Ok(Self {
            client,
            method,
            config,
        })
    }

    /// Endpoint, timeout and upload settings this client was built with.
    pub fn config(&self) -> &OcrServiceConfig {
        &self.config
    }

    fn build_form(&self, image: Vec<u8>, filename: &str) -> Result<Form> {
        let part = Part::bytes(image)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .map_err(|err| SchriftwerkError::Transport(format!("invalid MIME type: {}", err)))?;

        let mut form = Form::new();
        for (name, value) in &self.config.form_fields {
            form = form.text(name.clone(), value.clone());
        }
        Ok(form.part(self.config.file_field_name.clone(), part))
    }
}

#[async_trait]
impl OcrBackend for HttpOcrService {
    #[instrument(skip_all, fields(filename = %filename, bytes = image.len()))]
    async fn extract_text(&self, image: Vec<u8>, filename: &str) -> Result<Vec<u8>> {
        let form = self.build_form(image, filename)?;

        let mut request = match self.method {
            UploadMethod::Post => self.client.post(&self.config.url),
            UploadMethod::Put => self.client.put(&self.config.url),
        };
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.multipart(form).send().await.map_err(|err| {
            SchriftwerkError::Transport(format!("request to {} failed: {}", self.config.url, err))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SchriftwerkError::Transport(format!(
                "OCR service returned status {}",
                status
            )));
        }

        let body = response.bytes().await.map_err(|err| {
            SchriftwerkError::Transport(format!("failed to read OCR response: {}", err))
        })?;

        debug!(status = %status, response_bytes = body.len(), "OCR response received");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Read one HTTP request (headers plus a Content-Length body) and answer it
    /// with `status_line` and `body`. Returns the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/file", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end].lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        });
        match content_length {
            Some(len) => raw.len() >= header_end + 4 + len,
            None => text.ends_with("--\r\n"),
        }
    }

    fn config_for(url: String) -> OcrServiceConfig {
        OcrServiceConfig {
            url,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn unsupported_method_rejected() {
        let config = OcrServiceConfig {
            method: "GET".into(),
            ..Default::default()
        };
        assert!(matches!(
            HttpOcrService::new(config),
            Err(SchriftwerkError::Config(_))
        ));
    }

    #[test]
    fn method_is_case_insensitive() {
        let config = OcrServiceConfig {
            method: "put".into(),
            ..Default::default()
        };
        let service = HttpOcrService::new(config).unwrap();
        assert_eq!(service.method, UploadMethod::Put);
    }

    #[tokio::test]
    async fn uploads_multipart_with_fields_and_headers() {
        let (url, server) = serve_once("200 OK", r#"{"result":"<div></div>"}"#).await;
        let service = HttpOcrService::new(config_for(url)).unwrap();

        let body = service
            .extract_text(vec![0xFF, 0xD8, 0xFF, 0xD9], "page_1.jpg")
            .await
            .unwrap();
        assert_eq!(body, br#"{"result":"<div></div>"}"#);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /file HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("accept: application/json"));
        assert!(request.contains("multipart/form-data"));
        assert!(request.contains("name=\"format\""));
        assert!(request.contains("hocr"));
        assert!(request.contains("name=\"file\"; filename=\"page_1.jpg\""));
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let (url, server) = serve_once("503 Service Unavailable", "busy").await;
        let service = HttpOcrService::new(config_for(url)).unwrap();

        let err = service.extract_text(vec![1, 2, 3], "x.jpg").await.unwrap_err();
        match err {
            SchriftwerkError::Transport(message) => assert!(message.contains("503")),
            other => panic!("expected transport error, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/file", listener.local_addr().unwrap());
        drop(listener);

        let service = HttpOcrService::new(config_for(url)).unwrap();
        let err = service.extract_text(vec![1], "x.jpg").await.unwrap_err();
        assert!(matches!(err, SchriftwerkError::Transport(_)));
    }
}
