//! Report delivery.

use serde::Serialize;

use crate::{
   api::build_client,
   config::DigestConfig,
   error::{DigestError, Result},
   style,
};

/// Destination for the finished digest.
pub trait Notifier {
   fn deliver(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct WebhookContent<'a> {
   text: &'a str,
}

#[derive(Debug, Serialize)]
struct WebhookBody<'a> {
   msg_type: &'static str,
   content:  WebhookContent<'a>,
}

fn webhook_body(text: &str) -> WebhookBody<'_> {
   WebhookBody { msg_type: "text", content: WebhookContent { text } }
}

/// Posts the digest as a text message to a chat webhook.
#[derive(Debug)]
pub struct WebhookNotifier {
   client: reqwest::blocking::Client,
   url:    String,
}

impl WebhookNotifier {
   pub fn new(url: &str, config: &DigestConfig) -> Result<Self> {
      Ok(Self { client: build_client(config)?, url: url.to_string() })
   }
}

impl Notifier for WebhookNotifier {
   fn deliver(&self, text: &str) -> Result<()> {
      let response = self
         .client
         .post(&self.url)
         .json(&webhook_body(text))
         .send()
         .map_err(DigestError::HttpError)?;

      let status = response.status();
      if !status.is_success() {
         return Err(DigestError::DeliveryError { status: status.as_u16() });
      }
      Ok(())
   }
}

/// Console form of the report: a header rule, then the text exactly as the
/// webhook would receive it.
pub fn console_report(text: &str, width: usize) -> String {
   format!("{}\n{text}\n", style::section_header("Git digest", width))
}

/// Prints the digest to stdout; used for dry runs and when no webhook is set.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
   fn deliver(&self, text: &str) -> Result<()> {
      print!("{}", console_report(text, style::term_width()));
      Ok(())
   }
}

/// Webhook notifier when a URL is configured and this is not a dry run,
/// console otherwise.
pub fn notifier_for(config: &DigestConfig, dry_run: bool) -> Result<Box<dyn Notifier>> {
   match config.webhook_url.as_deref() {
      Some(url) if !dry_run => Ok(Box::new(WebhookNotifier::new(url, config)?)),
      _ => Ok(Box::new(ConsoleNotifier)),
   }
}

/// Deliver, falling back to the console if the primary sink fails.
pub fn deliver_or_print(notifier: &dyn Notifier, text: &str) -> bool {
   match notifier.deliver(text) {
      Ok(()) => true,
      Err(e) => {
         style::warn(&format!("Delivery failed ({e}); printing the digest instead"));
         let _ = ConsoleNotifier.deliver(text);
         false
      },
   }
}
