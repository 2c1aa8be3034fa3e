//! Map-reduce summarization
//!
//! Three levels, each one generation call per node:
//! chunk (one per diff chunk) -> commit (merge of its chunks) -> daily
//! (merge of every commit). A failed call never aborts the run: the node
//! falls back to text assembled from its inputs and is marked degraded.

use std::fmt::Write;

use crate::{
   api::Generate,
   diff::chunk_file_names,
   error::Result,
   style,
   templates::{self, CommitHeader, DailyEntry},
   types::{CommitRecord, SummaryLevel, SummaryNode, SummaryOutcome},
};

/// Summary recorded for a commit with nothing left to summarize.
pub const EMPTY_DIFF_PLACEHOLDER: &str =
   "No summarizable changes (empty diff, or only excluded files such as lock files and build output).";

/// Marker heading the hand-assembled digest when the daily merge fails.
pub const DAILY_FAILURE_MARKER: &str =
   "[Digest generation failed] The overall summary could not be generated; per-commit summaries follow.";

/// A commit together with its final summary node.
#[derive(Debug, Clone)]
pub struct CommitSummary {
   pub record:  CommitRecord,
   pub summary: SummaryNode,
}

fn commit_header(record: &CommitRecord) -> CommitHeader<'_> {
   CommitHeader {
      hash:     record.short_hash(),
      title:    &record.title,
      author:   &record.author,
      branches: record.branches.join(", "),
   }
}

/// Render a prompt and run it; any failure along the way is reported once.
fn generate_with(generator: &dyn Generate, prompt: Result<String>) -> Result<String> {
   let prompt = prompt?;
   style::debug(&format!("prompt: {} bytes", prompt.len()));
   generator.generate(&prompt)
}

/// Map phase: one summary per chunk, in order.
pub fn summarize_chunks(
   generator: &dyn Generate,
   record: &CommitRecord,
   chunks: &[String],
) -> Vec<SummaryNode> {
   let header = commit_header(record);
   let total = chunks.len();

   chunks
      .iter()
      .enumerate()
      .map(|(idx, chunk)| {
         let part = idx + 1;
         let files = chunk_file_names(chunk);
         let prompt = templates::render_chunk_prompt(&header, part, total, &files, chunk);

         let outcome = match generate_with(generator, prompt) {
            Ok(text) => SummaryOutcome::Clean(text),
            Err(e) => {
               style::warn(&format!(
                  "{}: summary of part {part}/{total} failed: {e}",
                  record.short_hash()
               ));
               SummaryOutcome::Degraded(format!(
                  "(Summary of part {part}/{total} failed: {e}. Files: {})",
                  if files.is_empty() { "continuation".to_string() } else { files.join(", ") }
               ))
            },
         };

         SummaryNode {
            level: SummaryLevel::Chunk,
            outcome,
            inputs: vec![format!("{}#{part}", record.short_hash())],
         }
      })
      .collect()
}

/// Reduce phase for one commit: merge its chunk summaries. With no chunks the
/// commit gets the explicit empty-diff placeholder and no call is made.
pub fn merge_commit(generator: &dyn Generate, record: &CommitRecord, parts: &[SummaryNode]) -> SummaryNode {
   let inputs: Vec<String> = parts.iter().flat_map(|p| p.inputs.clone()).collect();

   if parts.is_empty() {
      return SummaryNode {
         level: SummaryLevel::Commit,
         outcome: SummaryOutcome::Placeholder(EMPTY_DIFF_PLACEHOLDER.to_string()),
         inputs,
      };
   }

   let texts: Vec<&str> = parts.iter().map(SummaryNode::text).collect();
   let prompt = templates::render_commit_prompt(&commit_header(record), &texts);

   let outcome = match generate_with(generator, prompt) {
      Ok(text) => SummaryOutcome::Clean(text),
      Err(e) => {
         style::warn(&format!("{}: commit merge failed, using part summaries: {e}", record.short_hash()));
         SummaryOutcome::Degraded(texts.join("\n\n"))
      },
   };

   SummaryNode { level: SummaryLevel::Commit, outcome, inputs }
}

/// Full chunk -> commit reduction for one commit. Also returns how many
/// nodes (chunks plus the merge) fell back to assembled text.
pub fn summarize_commit(
   generator: &dyn Generate,
   record: &CommitRecord,
   chunks: &[String],
) -> (SummaryNode, usize) {
   let parts = summarize_chunks(generator, record, chunks);
   let summary = merge_commit(generator, record, &parts);
   let degraded = parts.iter().filter(|p| p.outcome.is_degraded()).count()
      + usize::from(summary.outcome.is_degraded());
   (summary, degraded)
}

/// Final reduction: merge every commit summary, in the given (chronological)
/// order, into the digest body.
pub fn summarize_daily(
   generator: &dyn Generate,
   repo: &str,
   window: &str,
   commits: &[CommitSummary],
) -> SummaryNode {
   let inputs: Vec<String> = commits.iter().map(|c| c.record.hash.clone()).collect();

   let entries: Vec<DailyEntry<'_>> = commits
      .iter()
      .map(|c| DailyEntry {
         hash:     c.record.short_hash(),
         title:    &c.record.title,
         author:   &c.record.author,
         branches: c.record.branches.join(", "),
         url:      &c.record.url,
         summary:  c.summary.text(),
      })
      .collect();

   let prompt = templates::render_daily_prompt(repo, window, &entries);
   let outcome = match generate_with(generator, prompt) {
      Ok(text) => SummaryOutcome::Clean(text),
      Err(e) => {
         style::warn(&format!("Daily merge failed, falling back to per-commit listing: {e}"));
         SummaryOutcome::Degraded(fallback_digest(commits))
      },
   };

   SummaryNode { level: SummaryLevel::Daily, outcome, inputs }
}

/// Hand-assembled digest: failure marker, then every commit in order.
pub fn fallback_digest(commits: &[CommitSummary]) -> String {
   let mut out = String::from(DAILY_FAILURE_MARKER);
   for (idx, commit) in commits.iter().enumerate() {
      let _ = write!(out, "\n\n{}. {}", idx + 1, commit.record.label());
      if !commit.record.url.is_empty() {
         let _ = write!(out, "\n{}", commit.record.url);
      }
      let _ = write!(out, "\n{}", commit.summary.text());
   }
   out
}
