use super::debug::{
    HttpDebugConfig, redact_header_value, redact_text_body, redact_url, truncate_for_log,
};
use crate::trace::SessionTrace;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Request, Response};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// Thin wrapper over `reqwest::Client` that mirrors every exchange into the
/// session trace and, when verbose, onto stderr.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    debug: HttpDebugConfig,
    sink: LogSink,
    trace: Option<SessionTrace>,
}

#[derive(Clone)]
enum LogSink {
    Stderr,
    #[cfg(test)]
    Buffer(Arc<Mutex<Vec<String>>>),
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("debug", &self.debug)
            .finish()
    }
}

/// Longest unterminated line a streaming response may buffer.
pub const MAX_STREAM_LINE_BYTES: usize = 1_000_000;

#[derive(Debug)]
pub enum StreamError {
    Http(reqwest::Error),
    LineTooLong { limit: usize },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => write!(f, "{err}"),
            Self::LineTooLong { limit } => {
                write!(f, "stream line exceeded maximum size of {limit} bytes")
            }
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::LineTooLong { .. } => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(inner: Client, debug: HttpDebugConfig) -> Self {
        Self {
            inner,
            debug,
            sink: LogSink::Stderr,
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponseData, reqwest::Error> {
        let mut builder = self.inner.get(url).query(query);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.build()?;
        self.record_request(&request, "");

        let response = self.execute(request).await?;
        let (status, headers) = response_head(&response);
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return Err(self.record_error(err)),
        };

        self.record_response(status, &headers, &body);
        Ok(HttpResponseData {
            status,
            content_type: content_type(&headers),
            body,
        })
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let body_json = serialize_for_log(payload);
        let request = self.inner.post(url).json(payload).build()?;
        self.record_request(&request, &body_json);

        let response = self.execute(request).await?;
        let (status, headers) = response_head(&response);
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => return Err(self.record_error(err)),
        };

        self.record_response(status, &headers, &body);
        Ok(HttpResponseData {
            status,
            content_type: content_type(&headers),
            body,
        })
    }

    /// Posts `payload` and hands each newline-delimited line of a successful
    /// response body to `on_line` as soon as it has fully arrived. Error
    /// responses are read whole and returned without invoking `on_line`.
    /// A line longer than [`MAX_STREAM_LINE_BYTES`] aborts the read.
    pub async fn post_json_streaming<T, F>(
        &self,
        url: &str,
        payload: &T,
        mut on_line: F,
    ) -> Result<HttpResponseData, StreamError>
    where
        T: Serialize + ?Sized,
        F: FnMut(&str),
    {
        let body_json = serialize_for_log(payload);
        let request = self.inner.post(url).json(payload).build()?;
        self.record_request(&request, &body_json);

        let mut response = self.execute(request).await?;
        let (status, headers) = response_head(&response);

        let body = if response.status().is_success() {
            let mut body = String::new();
            let mut pending: Vec<u8> = Vec::new();
            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(err) => return Err(self.record_error(err).into()),
                };
                pending.extend_from_slice(&chunk);
                while let Some(pos) = pending.iter().position(|byte| *byte == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    emit_line(&line, &mut body, &mut on_line);
                }
                if pending.len() > MAX_STREAM_LINE_BYTES {
                    let err = StreamError::LineTooLong {
                        limit: MAX_STREAM_LINE_BYTES,
                    };
                    self.record_stream_error(&err);
                    return Err(err);
                }
            }
            if !pending.is_empty() {
                emit_line(&pending, &mut body, &mut on_line);
            }
            body
        } else {
            match response.text().await {
                Ok(body) => body,
                Err(err) => return Err(self.record_error(err).into()),
            }
        };

        self.record_response(status, &headers, &body);
        Ok(HttpResponseData {
            status,
            content_type: content_type(&headers),
            body,
        })
    }

    async fn execute(&self, request: Request) -> Result<Response, reqwest::Error> {
        self.inner
            .execute(request)
            .await
            .map_err(|err| self.record_error(err))
    }

    fn record_request(&self, request: &Request, body: &str) {
        if self.debug.enabled {
            for line in request_log_lines(self.debug, request, body) {
                self.log_line(line);
            }
        }
        if let Some(trace) = &self.trace {
            trace.log_http_request(
                request.method().as_str(),
                request.url().as_str(),
                request.headers(),
                body,
            );
        }
    }

    fn record_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        if self.debug.enabled {
            for line in response_log_lines(self.debug, status, headers, body) {
                self.log_line(line);
            }
        }
        if let Some(trace) = &self.trace {
            trace.log_http_response(status, headers, body);
        }
    }

    fn record_error(&self, err: reqwest::Error) -> reqwest::Error {
        self.log_failure(&err.to_string());
        err
    }

    fn record_stream_error(&self, err: &StreamError) {
        self.log_failure(&err.to_string());
    }

    fn log_failure(&self, message: &str) {
        if self.debug.enabled {
            self.log_line(format!("[http-debug] ! {message}"));
        }
        if let Some(trace) = &self.trace {
            trace.log_http_error(message);
        }
    }

    fn log_line(&self, line: String) {
        match &self.sink {
            LogSink::Stderr => {
                let mut stderr = io::stderr().lock();
                let _ = writeln!(stderr, "{line}");
            }
            #[cfg(test)]
            LogSink::Buffer(buffer) => {
                if let Ok(mut b) = buffer.lock() {
                    b.push(line);
                }
            }
        }
    }

    #[cfg(test)]
    pub fn with_buffer_sink(
        inner: Client,
        debug: HttpDebugConfig,
    ) -> (Self, Arc<Mutex<Vec<String>>>) {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let client = Self {
            inner,
            debug,
            sink: LogSink::Buffer(Arc::clone(&buffer)),
            trace: None,
        };
        (client, buffer)
    }
}

fn emit_line<F: FnMut(&str)>(raw: &[u8], body: &mut String, on_line: &mut F) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\r', '\n']);
    body.push_str(text);
    body.push('\n');
    if !text.trim().is_empty() {
        on_line(text);
    }
}

fn response_head(response: &Response) -> (u16, HeaderMap) {
    (response.status().as_u16(), response.headers().clone())
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn serialize_for_log<T: Serialize + ?Sized>(payload: &T) -> String {
    serde_json::to_string(payload)
        .unwrap_or_else(|err| format!("{{\"_serialization_error\":\"{err}\"}}"))
}

fn request_log_lines(debug: HttpDebugConfig, request: &Request, body: &str) -> Vec<String> {
    let url = redact_url(request.url(), debug.redact_secrets);
    let body = redact_text_body(body, debug.redact_secrets);
    let body = truncate_for_log(&body, debug.max_body_chars);

    let mut lines = Vec::new();
    lines.push(format!("[http-debug] > {} {}", request.method(), url));
    for (name, value) in request.headers() {
        lines.push(format!(
            "[http-debug] > {}: {}",
            name.as_str(),
            redact_header_value(name.as_str(), value, debug.redact_secrets)
        ));
    }
    lines.push("[http-debug] >".to_string());
    append_body_lines(&mut lines, '>', &body);
    lines
}

fn response_log_lines(
    debug: HttpDebugConfig,
    status: u16,
    headers: &HeaderMap,
    body: &str,
) -> Vec<String> {
    let body = redact_text_body(body, debug.redact_secrets);
    let body = truncate_for_log(&body, debug.max_body_chars);

    let mut lines = Vec::new();
    lines.push(format!("[http-debug] < HTTP {status}"));
    for (name, value) in headers {
        lines.push(format!(
            "[http-debug] < {}: {}",
            name.as_str(),
            redact_header_value(name.as_str(), value, debug.redact_secrets)
        ));
    }
    lines.push("[http-debug] <".to_string());
    append_body_lines(&mut lines, '<', &body);
    lines
}

fn append_body_lines(lines: &mut Vec<String>, direction: char, body: &str) {
    if body.is_empty() {
        lines.push(format!("[http-debug] {direction} <empty body>"));
        return;
    }

    for line in body.lines() {
        lines.push(format!("[http-debug] {direction} {line}"));
    }
}
