//! One digest run: collect, summarize, report.

use std::collections::BTreeSet;

use crate::{
   api::Generate,
   collect::collect_commits,
   config::DigestConfig,
   diff::chunk_patch,
   error::Result,
   git::{Vcs, extract_diff},
   map_reduce::{CommitSummary, summarize_commit, summarize_daily},
   notify::{Notifier, deliver_or_print},
   style::{self, icons},
   types::{CommitRecord, CommitStage, Window},
};

/// What a run ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
   /// Nothing landed on any remote branch in the window; nothing was sent.
   NoCommits,
   Reported {
      commits:   usize,
      /// Chunk, commit and daily nodes that fell back to assembled text
      degraded:  usize,
      /// False when the primary sink failed and the report went to the console
      delivered: bool,
   },
}

/// Counts shown on the report's title lines.
#[derive(Debug, Clone)]
pub struct ReportHeader<'a> {
   pub repo:     &'a str,
   pub window:   Window,
   pub commits:  usize,
   pub branches: usize,
   pub degraded: usize,
}

/// Title lines followed by the digest body.
pub fn format_report(header: &ReportHeader<'_>, body: &str) -> String {
   let mut counts = format!(
      "{} commit{} across {} branch{}",
      header.commits,
      if header.commits == 1 { "" } else { "s" },
      header.branches,
      if header.branches == 1 { "" } else { "es" },
   );
   if header.degraded > 0 {
      counts.push_str(&format!(", {} summaries degraded", header.degraded));
   }
   format!("Git digest: {} ({})\n{counts}\n\n{}", header.repo, header.window, body.trim())
}

fn report_stage(record: &CommitRecord, stage: CommitStage, detail: &str) {
   style::debug(&format!("{} {stage}: {detail}", record.short_hash()));
}

/// Diff, chunk and summarize one commit. Never fails: every problem is folded
/// into the summary. Returns the summary and the number of degraded nodes.
fn process_commit(
   config: &DigestConfig,
   vcs: &dyn Vcs,
   generator: &dyn Generate,
   record: CommitRecord,
) -> (CommitSummary, usize) {
   let diff = extract_diff(vcs, &record.hash, &config.excluded_paths);
   report_stage(&record, CommitStage::Diffed, &format!("{} bytes", diff.len()));

   let chunks = chunk_patch(&diff, config.chunk_max_bytes);
   report_stage(&record, CommitStage::Chunked, &format!("{} chunk(s)", chunks.len()));

   let (summary, degraded) = summarize_commit(generator, &record, &chunks);
   report_stage(&record, CommitStage::Summarized, &format!("{degraded} degraded"));

   (CommitSummary { record, summary }, degraded)
}

/// Run the whole digest for one repository. Only an unusable window is an
/// error; everything after that degrades instead of failing.
///
/// `repo` names the repository in prompts and on the report title.
pub fn run_digest(
   config: &DigestConfig,
   repo: &str,
   window: Window,
   vcs: &dyn Vcs,
   generator: &dyn Generate,
   notifier: &dyn Notifier,
) -> Result<RunOutcome> {
   let bounds = window.bounds()?;
   style::print_info(&format!(
      "{} Collecting commits on remote branches ({window})",
      icons::SEARCH
   ));

   let (index, records) = collect_commits(vcs, &bounds, config);
   style::debug(&format!("{} remote branch(es) scanned", index.branch_count()));
   if records.is_empty() {
      style::print_info("No commits in the window; nothing to report");
      return Ok(RunOutcome::NoCommits);
   }

   let branches: BTreeSet<&str> = records
      .iter()
      .flat_map(|r| r.branches.iter().map(String::as_str))
      .collect();
   let branch_count = branches.len();

   let total = records.len();
   let mut degraded = 0;
   let mut summaries = Vec::with_capacity(total);
   for (idx, record) in records.into_iter().enumerate() {
      style::print_info(&format!(
         "{} [{}/{total}] {} {}",
         icons::ROBOT,
         idx + 1,
         record.short_hash(),
         style::dim(&record.title)
      ));
      report_stage(&record, CommitStage::Pending, &record.branches.join(", "));
      let (summary, bad) = process_commit(config, vcs, generator, record);
      degraded += bad;
      summaries.push(summary);
   }

   style::print_info("Merging commit summaries into the digest");
   let daily = summarize_daily(generator, repo, &window.to_string(), &summaries);
   degraded += usize::from(daily.outcome.is_degraded());

   let header = ReportHeader { repo, window, commits: total, branches: branch_count, degraded };
   let report = format_report(&header, daily.text());
   let delivered = deliver_or_print(notifier, &report);

   Ok(RunOutcome::Reported { commits: total, degraded, delivered })
}
