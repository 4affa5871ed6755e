//! Per-request retry for the statistics API.
//!
//! Two retry disciplines exist side by side:
//!
//! * [`send_json`] is used by the dispatcher. A transport error, a non-2xx
//!   status, or an unparseable body each count as one failed attempt. After
//!   [`MAX_ATTEMPTS`] failures the task is exhausted and the error is fatal.
//! * [`soft_get`] is used by the table-repair path. It retries non-200
//!   responses with a short pause, and then hands the API's error message
//!   back to the caller instead of failing, so the caller can repair the
//!   request and try again.

use std::time::Duration;

use serde_json::Value;

use crate::ApiError;
use crate::dispatch::FetchTask;

/// Attempts per task before a dispatch gives up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Pause between [`soft_get`] attempts.
const SOFT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 300;

/// Result of a [`soft_get`].
#[derive(Debug, Clone, PartialEq)]
pub enum SoftResponse {
    /// HTTP 200 with a JSON body.
    Success(Value),
    /// The API's error message from the last attempt.
    Failure(String),
}

/// Fetches `task` and parses the body as JSON, retrying up to
/// [`MAX_ATTEMPTS`] times with no backoff.
///
/// # Errors
///
/// Returns [`ApiError::FetchExhausted`] once every attempt has failed.
pub async fn send_json(client: &reqwest::Client, task: &FetchTask) -> Result<Value, ApiError> {
    let mut last_error = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match fetch_json(client, task).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                log::warn!(
                    "Fetch attempt {attempt}/{MAX_ATTEMPTS} failed\n  \
                     url: {}\n  \
                     error: {e}",
                    task.url,
                );
                last_error = Some(e);
            }
        }
    }

    let message = last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string());
    log::error!(
        "Giving up on {} after {MAX_ATTEMPTS} attempts: {message}",
        task.url
    );
    Err(ApiError::FetchExhausted {
        url: task.url.clone(),
        attempts: MAX_ATTEMPTS,
        message,
    })
}

/// One attempt: GET, require a 2xx status, parse the body as JSON.
async fn fetch_json(client: &reqwest::Client, task: &FetchTask) -> Result<Value, ApiError> {
    let response = client.get(&task.url).query(&task.params).send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            url: task.url.clone(),
            status: status.as_u16(),
            body: preview(&text),
        });
    }

    Ok(serde_json::from_str(&text)?)
}

/// GET that reports API failures as values.
///
/// Retries up to [`MAX_ATTEMPTS`] times, pausing briefly between attempts,
/// until the API answers HTTP 200. If it never does, the last response's
/// `error` field (or its raw body when that isn't JSON) is returned as
/// [`SoftResponse::Failure`].
///
/// # Errors
///
/// Returns [`ApiError::Http`] if the last attempt could not reach the API,
/// or [`ApiError::Json`] if a 200 response is not JSON.
pub async fn soft_get(
    client: &reqwest::Client,
    url: &str,
    params: &[(String, String)],
) -> Result<SoftResponse, ApiError> {
    let mut last_failure = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(SOFT_RETRY_DELAY).await;
        }

        let response = match client.get(url).query(params).send().await {
            Ok(response) => response,
            Err(e) if attempt < MAX_ATTEMPTS => {
                log::warn!("  transient error: {e}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::OK {
            return Ok(SoftResponse::Success(serde_json::from_str(&text)?));
        }

        log::debug!("HTTP {status} from {url} (attempt {attempt}/{MAX_ATTEMPTS})");
        last_failure = error_message(&text);
    }

    Ok(SoftResponse::Failure(last_failure))
}

/// The `error` field of a JSON error body, or the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(object)) => match object.get("error") {
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let end = (0..=BODY_PREVIEW_LEN)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn error_message_prefers_error_field() {
        assert_eq!(error_message(r#"{"error": "bad table"}"#), "bad table");
        assert_eq!(error_message("plain failure"), "plain failure");
        assert_eq!(error_message(r#"{"detail": 1}"#), r#"{"detail": 1}"#);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let short = preview(&long);
        assert!(short.ends_with("..."));
        assert!(short.len() <= BODY_PREVIEW_LEN + 3);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let task = FetchTask::new(format!("{}/flaky", server.uri()));
        let value = send_json(&reqwest::Client::new(), &task).await.unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn unparseable_body_counts_as_a_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(3)
            .mount(&server)
            .await;

        let task = FetchTask::new(format!("{}/garbled", server.uri()));
        let error = send_json(&reqwest::Client::new(), &task).await.unwrap_err();
        assert!(matches!(error, ApiError::FetchExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn soft_get_returns_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.0/data/show/acs2021_5yr"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "no such table"})),
            )
            .expect(3)
            .mount(&server)
            .await;

        let response = soft_get(
            &reqwest::Client::new(),
            &format!("{}/1.0/data/show/acs2021_5yr", server.uri()),
            &[],
        )
        .await
        .unwrap();
        assert_eq!(response, SoftResponse::Failure("no such table".to_string()));
    }
}
