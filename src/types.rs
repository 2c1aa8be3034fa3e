use std::{collections::BTreeSet, fmt, path::PathBuf};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, TimeZone};
use clap::Parser;
use indexmap::IndexMap;

use crate::error::{DigestError, Result};

// === Lookback window ===

/// Time range the digest covers. Both variants end at "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
   SinceMidnight,
   DaysAgo(u32),
}

impl Window {
   pub const fn from_days(days: u32) -> Self {
      if days == 0 { Self::SinceMidnight } else { Self::DaysAgo(days) }
   }

   /// Resolve the window against a fixed "now". A lookback reaching past
   /// the representable date range is a configuration error.
   pub fn bounds_at(&self, now: DateTime<Local>) -> Result<WindowBounds> {
      let since = match self {
         Self::SinceMidnight => local_midnight(now),
         Self::DaysAgo(days) => Duration::try_days(i64::from(*days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
               DigestError::ConfigError(format!("a lookback of {days} days is out of range"))
            })?,
      };
      Ok(WindowBounds { since: since.fixed_offset(), until: now.fixed_offset() })
   }

   pub fn bounds(&self) -> Result<WindowBounds> {
      self.bounds_at(Local::now())
   }
}

impl fmt::Display for Window {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::SinceMidnight => write!(f, "today"),
         Self::DaysAgo(1) => write!(f, "last 24 hours"),
         Self::DaysAgo(days) => write!(f, "last {days} days"),
      }
   }
}

fn local_midnight(now: DateTime<Local>) -> DateTime<Local> {
   let midnight = now.date_naive().and_time(NaiveTime::MIN);
   // DST gaps can make midnight ambiguous or missing; take the earliest valid
   // instant and fall back to "now" if there is none.
   Local
      .from_local_datetime(&midnight)
      .earliest()
      .unwrap_or(now)
}

pub const GIT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Concrete `[since, until]` instants handed to git.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
   pub since: DateTime<FixedOffset>,
   pub until: DateTime<FixedOffset>,
}

impl WindowBounds {
   /// `--since=` / `--until=` arguments in git's default date format.
   pub fn git_args(&self) -> [String; 2] {
      [
         format!("--since={}", self.since.format(GIT_DATE_FORMAT)),
         format!("--until={}", self.until.format(GIT_DATE_FORMAT)),
      ]
   }
}

// === Commits ===

/// Raw metadata for one commit as reported by git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
   pub title:        String,
   pub author:       String,
   pub committed_at: Option<DateTime<FixedOffset>>,
}

/// A commit selected for the digest; unique by `hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
   pub hash:         String,
   pub title:        String,
   pub author:       String,
   pub url:          String,
   pub committed_at: Option<DateTime<FixedOffset>>,
   /// Sorted, never empty
   pub branches:     Vec<String>,
}

impl CommitRecord {
   pub fn short_hash(&self) -> &str {
      short_hash(&self.hash)
   }

   /// One-line label used in prompts and fallback listings.
   pub fn label(&self) -> String {
      format!(
         "[{}] {} (author: {}, branches: {})",
         self.short_hash(),
         self.title,
         self.author,
         self.branches.join(", ")
      )
   }
}

pub fn short_hash(hash: &str) -> &str {
   hash.get(..8).unwrap_or(hash)
}

/// Branch name -> oldest-first hashes inside the window, in branch
/// enumeration order.
#[derive(Debug, Clone, Default)]
pub struct BranchCommitIndex {
   branches: IndexMap<String, Vec<String>>,
}

impl BranchCommitIndex {
   /// Record a branch's commits, keeping only the most recent `cap`.
   pub fn insert_capped(&mut self, branch: &str, mut hashes: Vec<String>, cap: usize) {
      if hashes.len() > cap {
         hashes.drain(..hashes.len() - cap);
      }
      self.branches.insert(branch.to_string(), hashes);
   }

   pub fn commits(&self, branch: &str) -> Option<&[String]> {
      self.branches.get(branch).map(Vec::as_slice)
   }

   pub fn branch_count(&self) -> usize {
      self.branches.len()
   }

   pub fn is_empty(&self) -> bool {
      self.branches.values().all(Vec::is_empty)
   }

   /// hash -> sorted set of branches containing it.
   pub fn reverse(&self) -> IndexMap<&str, BTreeSet<&str>> {
      let mut reverse: IndexMap<&str, BTreeSet<&str>> = IndexMap::new();
      for (branch, hashes) in &self.branches {
         for hash in hashes {
            reverse
               .entry(hash.as_str())
               .or_default()
               .insert(branch.as_str());
         }
      }
      reverse
   }
}

// === Summaries ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
   Chunk,
   Commit,
   Daily,
}

/// Result of one reduction step. Every variant carries text that can flow
/// to the next level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
   /// The model produced this text.
   Clean(String),
   /// The model call failed; this is the fallback text.
   Degraded(String),
   /// Nothing to summarize (empty or fully excluded diff).
   Placeholder(String),
}

impl SummaryOutcome {
   pub fn text(&self) -> &str {
      match self {
         Self::Clean(s) | Self::Degraded(s) | Self::Placeholder(s) => s,
      }
   }

   pub fn into_text(self) -> String {
      match self {
         Self::Clean(s) | Self::Degraded(s) | Self::Placeholder(s) => s,
      }
   }

   pub const fn is_degraded(&self) -> bool {
      matches!(self, Self::Degraded(_))
   }
}

/// A node of the chunk -> commit -> daily reduction tree.
#[derive(Debug, Clone)]
pub struct SummaryNode {
   pub level:   SummaryLevel,
   pub outcome: SummaryOutcome,
   /// Labels of the inputs this node was reduced from
   pub inputs:  Vec<String>,
}

impl SummaryNode {
   pub fn text(&self) -> &str {
      self.outcome.text()
   }
}

/// Per-commit processing stage, reported in progress output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CommitStage {
   Pending,
   Diffed,
   Chunked,
   Summarized,
}

impl fmt::Display for CommitStage {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(match self {
         Self::Pending => "pending",
         Self::Diffed => "diffed",
         Self::Chunked => "chunked",
         Self::Summarized => "summarized",
      })
   }
}

// CLI Args
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Summarize recent commits across all remote branches with an LLM", long_about = None)]
pub struct Args {
   /// Path to config file (default: ~/.config/git-digest/config.toml)
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// Repository checkout to report on (overrides `repo_dir`)
   #[arg(long)]
   pub dir: Option<PathBuf>,

   /// Days to look back; 0 means since local midnight
   #[arg(long, short = 'd')]
   pub days: Option<u32>,

   /// Model used for every generation call
   #[arg(long, short = 'm')]
   pub model: Option<String>,

   /// Print the digest instead of posting it to the webhook
   #[arg(long)]
   pub dry_run: bool,

   /// Skip `git fetch --all --prune` before collecting
   #[arg(long)]
   pub no_fetch: bool,

   /// Print git commands, chunk counts and prompt sizes
   #[arg(long, short = 'v')]
   pub verbose: bool,
}
