use std::{path::PathBuf, sync::LazyLock};

use parking_lot::Mutex;
use rust_embed::RustEmbed;
use serde::Serialize;
use tera::{Context, Tera};

use crate::error::{DigestError, Result};

/// Embedded prompts folder (compiled into binary)
#[derive(RustEmbed)]
#[folder = "prompts/"]
struct Prompts;

/// Shared Tera instance used for `render_str`
static TERA: LazyLock<Mutex<Tera>> = LazyLock::new(|| {
   let mut tera = Tera::default();
   // Prompts are plain text, never HTML
   tera.autoescape_on(vec![]);
   Mutex::new(tera)
});

/// User override directory (`~/.config/git-digest/prompts/`).
fn user_prompts_dir() -> Option<PathBuf> {
   crate::config::config_home()
      .ok()
      .map(|dir| dir.join("prompts"))
}

/// Load a template, preferring a user-provided file over the embedded one.
fn load_template(name: &str) -> Result<String> {
   let file_name = format!("{name}.md");

   if let Some(dir) = user_prompts_dir() {
      let path = dir.join(&file_name);
      if path.exists() {
         return std::fs::read_to_string(&path).map_err(|e| DigestError::TemplateError {
            name:   name.to_string(),
            reason: format!("failed to read {}: {e}", path.display()),
         });
      }
   }

   let embedded = Prompts::get(&file_name).ok_or_else(|| DigestError::TemplateError {
      name:   name.to_string(),
      reason: "not found as user override or embedded default".to_string(),
   })?;

   std::str::from_utf8(embedded.data.as_ref())
      .map(str::to_string)
      .map_err(|e| DigestError::TemplateError {
         name:   name.to_string(),
         reason: format!("embedded template is not valid UTF-8: {e}"),
      })
}

fn render(name: &str, context: &Context) -> Result<String> {
   let template = load_template(name)?;
   let mut tera = TERA.lock();
   tera.render_str(&template, context)
      .map_err(|e| DigestError::TemplateError { name: name.to_string(), reason: e.to_string() })
}

/// Commit header shared by the chunk and commit prompts.
#[derive(Debug, Serialize)]
pub struct CommitHeader<'a> {
   pub hash:     &'a str,
   pub title:    &'a str,
   pub author:   &'a str,
   pub branches: String,
}

/// One entry of the daily merge prompt.
#[derive(Debug, Serialize)]
pub struct DailyEntry<'a> {
   pub hash:     &'a str,
   pub title:    &'a str,
   pub author:   &'a str,
   pub branches: String,
   pub url:      &'a str,
   pub summary:  &'a str,
}

/// Prompt for summarizing one diff chunk of a commit.
pub fn render_chunk_prompt(
   commit: &CommitHeader<'_>,
   part: usize,
   total: usize,
   files: &[&str],
   diff: &str,
) -> Result<String> {
   let mut context = Context::new();
   context.insert("commit", commit);
   context.insert("part", &part);
   context.insert("total", &total);
   context.insert("files", files);
   context.insert("diff", diff);
   render("chunk", &context)
}

/// Prompt for merging a commit's chunk summaries.
pub fn render_commit_prompt(commit: &CommitHeader<'_>, parts: &[&str]) -> Result<String> {
   let mut context = Context::new();
   context.insert("commit", commit);
   context.insert("parts", parts);
   render("commit", &context)
}

/// Prompt for merging every commit summary into the digest.
pub fn render_daily_prompt(
   repo: &str,
   window: &str,
   entries: &[DailyEntry<'_>],
) -> Result<String> {
   let mut context = Context::new();
   context.insert("repo", repo);
   context.insert("window", window);
   context.insert("entries", entries);
   render("daily", &context)
}

#[cfg(test)]
mod tests {
   use super::*;

   fn header() -> CommitHeader<'static> {
      CommitHeader {
         hash:     "0123abcd",
         title:    "Add <login> & logout",
         author:   "Dana",
         branches: "origin/main".to_string(),
      }
   }

   #[test]
   fn test_embedded_templates_present() {
      for name in ["chunk", "commit", "daily"] {
         assert!(Prompts::get(&format!("{name}.md")).is_some(), "missing {name}.md");
      }
   }

   #[test]
   fn test_render_chunk_prompt() {
      let prompt =
         render_chunk_prompt(&header(), 2, 3, &["src/a.rs"], "+fn a() {}\n").unwrap();
      assert!(prompt.contains("part 2 of 3"));
      assert!(prompt.contains("src/a.rs"));
      assert!(prompt.contains("+fn a() {}"));
      // No HTML escaping
      assert!(prompt.contains("Add <login> & logout"));
   }

   #[test]
   fn test_render_commit_prompt() {
      let prompt = render_commit_prompt(&header(), &["first part", "second part"]).unwrap();
      assert!(prompt.contains("first part"));
      assert!(prompt.contains("second part"));
      assert!(prompt.find("first part") < prompt.find("second part"));
   }

   #[test]
   fn test_render_daily_prompt() {
      let entries = [DailyEntry {
         hash:     "0123abcd",
         title:    "Fix login",
         author:   "Dana",
         branches: "origin/main, origin/dev".to_string(),
         url:      "https://example.com/c/0123abcd",
         summary:  "Fixed the login redirect.",
      }];
      let prompt = render_daily_prompt("acme/widgets", "today", &entries).unwrap();
      assert!(prompt.contains("acme/widgets"));
      assert!(prompt.contains("Fixed the login redirect."));
      assert!(prompt.contains("origin/main, origin/dev"));
   }
}
