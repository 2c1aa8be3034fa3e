//! Commit collection across remote branches
//!
//! Every remote branch contributes its most recent commits in the window
//! (capped per branch). The global `--all` listing supplies chronological
//! order; it is filtered down to hashes some remote branch contributed, so a
//! commit reachable from several branches is reported once with all of them.

use std::collections::HashSet;

use crate::{
   config::DigestConfig,
   git::{RevScope, Vcs},
   style,
   types::{BranchCommitIndex, CommitInfo, CommitRecord, WindowBounds},
};

/// Per-branch listing, capped. A failed listing counts as empty.
pub fn build_branch_index(vcs: &dyn Vcs, window: &WindowBounds, cap: usize) -> BranchCommitIndex {
   let branches = vcs.remote_branches().unwrap_or_else(|e| {
      style::warn(&format!("Could not list remote branches: {e}"));
      Vec::new()
   });

   let mut index = BranchCommitIndex::default();
   for branch in &branches {
      let hashes = vcs
         .commits_in_window(RevScope::Branch(branch), window)
         .unwrap_or_else(|e| {
            style::warn(&format!("Could not list commits on {branch}: {e}"));
            Vec::new()
         });
      if hashes.len() > cap {
         style::debug(&format!("{branch}: keeping {cap} of {} commits", hashes.len()));
      }
      index.insert_capped(branch, hashes, cap);
   }
   index
}

/// Global oldest-first listing, deduplicated by first occurrence.
fn global_order(vcs: &dyn Vcs, window: &WindowBounds) -> Vec<String> {
   let hashes = vcs
      .commits_in_window(RevScope::AllRefs, window)
      .unwrap_or_else(|e| {
         style::warn(&format!("Could not list commits across all refs: {e}"));
         Vec::new()
      });

   let mut seen = HashSet::new();
   hashes
      .into_iter()
      .filter(|h| seen.insert(h.clone()))
      .collect()
}

/// Build the ordered, deduplicated reporting set.
pub fn collect_commits(
   vcs: &dyn Vcs,
   window: &WindowBounds,
   config: &DigestConfig,
) -> (BranchCommitIndex, Vec<CommitRecord>) {
   let index = build_branch_index(vcs, window, config.max_commits_per_branch);
   if index.is_empty() {
      return (index, Vec::new());
   }

   let records = {
      let reverse = index.reverse();
      global_order(vcs, window)
         .into_iter()
         .filter_map(|hash| {
            let branches = reverse.get(hash.as_str())?;
            let info = vcs.commit_info(&hash).unwrap_or_else(|e| {
               style::warn(&format!("Could not read metadata for {hash}: {e}"));
               CommitInfo {
                  title:        "(unknown title)".to_string(),
                  author:       "(unknown author)".to_string(),
                  committed_at: None,
               }
            });
            Some(CommitRecord {
               url: config.commit_url(&hash),
               title: info.title,
               author: info.author,
               committed_at: info.committed_at,
               branches: branches.iter().map(|b| (*b).to_string()).collect(),
               hash,
            })
         })
         .collect()
   };

   (index, records)
}
