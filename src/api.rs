use std::{thread, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
   config::DigestConfig,
   error::{DigestError, Result},
};

/// A text-generation backend: one prompt in, one completion out.
pub trait Generate {
   fn generate(&self, prompt: &str) -> Result<String>;
}

impl<F> Generate for F
where
   F: Fn(&str) -> Result<String>,
{
   fn generate(&self, prompt: &str) -> Result<String> {
      self(prompt)
   }
}

/// Build HTTP client with timeouts from config
pub fn build_client(config: &DigestConfig) -> Result<reqwest::blocking::Client> {
   reqwest::blocking::Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
      .build()
      .map_err(DigestError::HttpError)
}

#[derive(Debug, Serialize)]
struct Message<'a> {
   role:    &'static str,
   content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
   model:           &'a str,
   messages:        Vec<Message<'a>>,
   temperature:     f32,
   enable_thinking: bool,
   stream:          bool,
}

#[derive(Debug, Deserialize)]
struct Choice {
   message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
   #[serde(default)]
   content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
   #[serde(default)]
   choices: Vec<Choice>,
}

/// OpenAI-compatible `/chat/completions` client.
#[derive(Debug)]
pub struct ChatClient {
   client:             reqwest::blocking::Client,
   endpoint:           String,
   api_key:            String,
   model:              String,
   temperature:        f32,
   max_retries:        u32,
   initial_backoff_ms: u64,
}

impl ChatClient {
   pub fn new(config: &DigestConfig) -> Result<Self> {
      let api_key = config.require_api_key()?.to_string();
      Ok(Self {
         client: build_client(config)?,
         endpoint: format!("{}/chat/completions", config.api_base_url.trim_end_matches('/')),
         api_key,
         model: config.model.clone(),
         temperature: config.temperature,
         max_retries: config.max_retries,
         initial_backoff_ms: config.initial_backoff_ms,
      })
   }

   fn request_once(&self, prompt: &str) -> Result<(bool, Option<String>)> {
      let request = ApiRequest {
         model:           &self.model,
         messages:        vec![Message { role: "user", content: prompt }],
         temperature:     self.temperature,
         enable_thinking: false,
         stream:          false,
      };

      let response = self
         .client
         .post(&self.endpoint)
         .header("content-type", "application/json")
         .header("Authorization", format!("Bearer {}", self.api_key))
         .json(&request)
         .send()
         .map_err(DigestError::HttpError)?;

      let status = response.status();

      // 5xx comes back as ApiError too; retry_api_call decides by status
      if !status.is_success() {
         let error_text = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());
         return Err(DigestError::ApiError { status: status.as_u16(), body: error_text });
      }

      let body = response.text().map_err(DigestError::HttpError)?;
      extract_content(&body).map(|text| (false, Some(text)))
   }
}

impl Generate for ChatClient {
   fn generate(&self, prompt: &str) -> Result<String> {
      retry_api_call(self.max_retries, self.initial_backoff_ms, || self.request_once(prompt))
   }
}

/// Pull `choices[0].message.content` out of a completion body.
fn extract_content(body: &str) -> Result<String> {
   let api_response: ApiResponse = serde_json::from_str(body)?;
   let content = api_response
      .choices
      .into_iter()
      .next()
      .and_then(|choice| choice.message.content)
      .map(|text| text.trim().to_string())
      .unwrap_or_default();

   if content.is_empty() {
      return Err(DigestError::Other("API returned an empty completion".to_string()));
   }
   Ok(content)
}

/// Delay before retry number `attempt` (1-based): doubles each time,
/// saturating instead of overflowing.
fn backoff_delay(initial_backoff_ms: u64, attempt: u32) -> u64 {
   initial_backoff_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Retry an API call with exponential backoff. The closure returns
/// `(retry, value)`; `retry = true` asks for another attempt. Server errors
/// (5xx) and transport failures are retried; once attempts run out the last
/// error is kept as the source of `ApiRetryExhausted`.
pub fn retry_api_call<F, T>(max_retries: u32, initial_backoff_ms: u64, mut f: F) -> Result<T>
where
   F: FnMut() -> Result<(bool, Option<T>)>,
{
   let max_retries = max_retries.max(1);
   let mut attempt = 0;

   loop {
      attempt += 1;

      let last = match f() {
         Ok((false, Some(result))) => return Ok(result),
         Ok((false, None)) => {
            return Err(DigestError::Other("API call failed without result".to_string()));
         },
         Ok((true, _)) => DigestError::Other("API asked for a retry".to_string()),
         // Client errors will not improve on retry
         Err(e @ DigestError::ApiError { status, .. }) if status < 500 => return Err(e),
         Err(e) => e,
      };

      if attempt >= max_retries {
         return Err(DigestError::ApiRetryExhausted { retries: max_retries, source: Box::new(last) });
      }

      let backoff_ms = backoff_delay(initial_backoff_ms, attempt);
      crate::style::warn(&format!("{last} - Retry {attempt}/{max_retries} after {backoff_ms}ms..."));
      thread::sleep(Duration::from_millis(backoff_ms));
   }
}
