use std::{
   path::{Path, PathBuf},
   process::Command,
};

use chrono::DateTime;

use crate::{
   error::{DigestError, Result},
   types::{CommitInfo, WindowBounds},
};

/// Hash of the empty tree; root commits are diffed against it.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Which refs a commit listing walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevScope<'a> {
   Branch(&'a str),
   AllRefs,
}

/// Version-control operations the digest needs.
pub trait Vcs {
   /// Remote-tracking branches, without symbolic refs like `origin/HEAD`.
   fn remote_branches(&self) -> Result<Vec<String>>;

   /// Non-merge commit hashes inside the window, oldest first.
   fn commits_in_window(&self, scope: RevScope<'_>, window: &WindowBounds) -> Result<Vec<String>>;

   fn parents(&self, hash: &str) -> Result<Vec<String>>;

   /// Zero-context, minimal unified diff between two tree-ish ids.
   fn diff(&self, from: &str, to: &str, excludes: &[String]) -> Result<String>;

   fn commit_info(&self, hash: &str) -> Result<CommitInfo>;
}

/// `Vcs` backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
   dir: PathBuf,
}

impl GitCli {
   pub fn new(dir: impl Into<PathBuf>) -> Self {
      Self { dir: dir.into() }
   }

   /// Open a checkout, failing if the path is missing or not a git work tree.
   pub fn open(dir: &Path) -> Result<Self> {
      let invalid = |reason: String| DigestError::InvalidRepository {
         path: dir.display().to_string(),
         reason,
      };

      if !dir.is_dir() {
         return Err(invalid("directory does not exist".to_string()));
      }

      let cli = Self::new(dir);
      match cli.run(&["rev-parse", "--is-inside-work-tree"]) {
         Ok(out) if out.trim() == "true" => Ok(cli),
         Ok(_) => Err(invalid("not inside a git work tree".to_string())),
         Err(e) => Err(invalid(e.to_string())),
      }
   }

   /// `git fetch --all --prune`
   pub fn fetch_remotes(&self) -> Result<()> {
      self.run(&["fetch", "--all", "--prune", "--quiet"]).map(|_| ())
   }

   fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
      let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
      crate::style::debug(&format!("git {}", args.join(" ")));

      let output = Command::new("git")
         .args(&args)
         .current_dir(&self.dir)
         .output()
         .map_err(|e| DigestError::GitError(format!("Failed to run git {}: {e}", args[0])))?;

      if !output.status.success() {
         let stderr = String::from_utf8_lossy(&output.stderr);
         return Err(DigestError::GitError(format!("git {} failed: {}", args[0], stderr.trim())));
      }

      Ok(String::from_utf8_lossy(&output.stdout).to_string())
   }
}

impl Vcs for GitCli {
   fn remote_branches(&self) -> Result<Vec<String>> {
      let stdout = self.run(&["for-each-ref", "--format=%(refname)%00%(symref)", "refs/remotes"])?;
      Ok(parse_remote_refs(&stdout))
   }

   fn commits_in_window(&self, scope: RevScope<'_>, window: &WindowBounds) -> Result<Vec<String>> {
      let [since, until] = window.git_args();
      let mut args = vec![
         "log".to_string(),
         "--no-merges".to_string(),
         "--date-order".to_string(),
         "--reverse".to_string(),
         "--format=%H".to_string(),
         since,
         until,
      ];
      match scope {
         RevScope::Branch(branch) => args.push(format!("refs/remotes/{branch}")),
         RevScope::AllRefs => args.push("--all".to_string()),
      }
      args.push("--".to_string());

      let stdout = self.run(&args)?;
      Ok(parse_hash_lines(&stdout))
   }

   fn parents(&self, hash: &str) -> Result<Vec<String>> {
      let stdout = self.run(&["rev-list", "--parents", "-n", "1", hash])?;
      Ok(stdout
         .split_whitespace()
         .skip(1) // First is the commit itself
         .map(|s| s.to_string())
         .collect())
   }

   fn diff(&self, from: &str, to: &str, excludes: &[String]) -> Result<String> {
      let mut args = vec![
         "diff".to_string(),
         "--unified=0".to_string(),
         "--minimal".to_string(),
         "--no-color".to_string(),
         "--no-ext-diff".to_string(),
         from.to_string(),
         to.to_string(),
         "--".to_string(),
         ".".to_string(),
      ];
      args.extend(excludes.iter().map(|p| exclude_pathspec(p)));
      self.run(&args)
   }

   fn commit_info(&self, hash: &str) -> Result<CommitInfo> {
      let stdout = self.run(&["show", "-s", "--format=%s%x00%an%x00%cI", hash])?;
      parse_commit_info(&stdout)
         .ok_or_else(|| DigestError::GitError(format!("Failed to parse commit metadata for {hash}")))
   }
}

/// Diff a commit against its first parent, or the empty tree for a root
/// commit. Returns an empty string when anything fails or nothing is left
/// after exclusions.
pub fn extract_diff(vcs: &dyn Vcs, hash: &str, excludes: &[String]) -> String {
   let base = match vcs.parents(hash) {
      Ok(parents) => parents
         .into_iter()
         .next()
         .unwrap_or_else(|| EMPTY_TREE.to_string()),
      Err(e) => {
         crate::style::warn(&format!("Could not resolve parent of {hash}: {e}"));
         return String::new();
      },
   };

   match vcs.diff(&base, hash, excludes) {
      Ok(diff) if diff.trim().is_empty() => String::new(),
      Ok(diff) => diff,
      Err(e) => {
         crate::style::warn(&format!("Could not diff {hash}: {e}"));
         String::new()
      },
   }
}

/// Turn a configured exclusion into a git pathspec. Entries ending in `/`
/// exclude that directory at any depth; bare globs and file names match at
/// any depth too.
fn exclude_pathspec(pattern: &str) -> String {
   let pattern = pattern.trim();
   if pattern.starts_with(":(") {
      return pattern.to_string();
   }
   if let Some(dir) = pattern.strip_suffix('/') {
      return format!(":(exclude,glob)**/{dir}/**");
   }
   format!(":(exclude,glob)**/{pattern}")
}

fn parse_remote_refs(stdout: &str) -> Vec<String> {
   stdout
      .lines()
      .filter_map(|line| {
         let (refname, symref) = line.split_once('\0').unwrap_or((line, ""));
         if !symref.is_empty() {
            return None;
         }
         refname
            .strip_prefix("refs/remotes/")
            .filter(|name| !name.is_empty() && !name.ends_with("/HEAD"))
            .map(str::to_string)
      })
      .collect()
}

fn parse_hash_lines(stdout: &str) -> Vec<String> {
   stdout
      .lines()
      .map(str::trim)
      .filter(|l| !l.is_empty())
      .map(str::to_string)
      .collect()
}

fn parse_commit_info(stdout: &str) -> Option<CommitInfo> {
   let mut parts = stdout.trim_end_matches('\n').splitn(3, '\0');
   let title = parts.next()?.trim().to_string();
   let author = parts.next()?.trim().to_string();
   let committed_at = parts
      .next()
      .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok());
   Some(CommitInfo { title, author, committed_at })
}

#[cfg(test)]
mod tests {
   use std::fs;

   use chrono::{Duration, Local};

   use super::*;
   use crate::types::Window;

   #[test]
   fn test_parse_remote_refs_skips_symrefs() {
      let stdout = "refs/remotes/origin/HEAD\0refs/remotes/origin/main\n\
                    refs/remotes/origin/main\0\n\
                    refs/remotes/origin/feature/login\0\n\
                    refs/remotes/upstream/dev\0\n";
      assert_eq!(parse_remote_refs(stdout), [
         "origin/main",
         "origin/feature/login",
         "upstream/dev"
      ]);
   }

   #[test]
   fn test_parse_remote_refs_skips_bare_head() {
      let stdout = "refs/remotes/origin/HEAD\0\nrefs/remotes/origin/main\0\n";
      assert_eq!(parse_remote_refs(stdout), ["origin/main"]);
   }

   #[test]
   fn test_parse_hash_lines() {
      assert_eq!(parse_hash_lines("a\n\n b \n"), ["a", "b"]);
      assert!(parse_hash_lines("").is_empty());
   }

   #[test]
   fn test_parse_commit_info() {
      let info = parse_commit_info("Fix login\0Dana\x002024-05-10T12:00:00+02:00\n").unwrap();
      assert_eq!(info.title, "Fix login");
      assert_eq!(info.author, "Dana");
      assert_eq!(info.committed_at.unwrap().to_rfc3339(), "2024-05-10T12:00:00+02:00");
   }

   #[test]
   fn test_parse_commit_info_missing_author() {
      assert!(parse_commit_info("only a title").is_none());
   }

   #[test]
   fn test_exclude_pathspec() {
      assert_eq!(exclude_pathspec("dist/"), ":(exclude,glob)**/dist/**");
      assert_eq!(exclude_pathspec("*.min.js"), ":(exclude,glob)**/*.min.js");
      assert_eq!(exclude_pathspec("yarn.lock"), ":(exclude,glob)**/yarn.lock");
      assert_eq!(exclude_pathspec(":(exclude)vendor"), ":(exclude)vendor");
   }

   struct FailingVcs;

   impl Vcs for FailingVcs {
      fn remote_branches(&self) -> Result<Vec<String>> {
         Err(DigestError::GitError("boom".into()))
      }

      fn commits_in_window(&self, _: RevScope<'_>, _: &WindowBounds) -> Result<Vec<String>> {
         Err(DigestError::GitError("boom".into()))
      }

      fn parents(&self, _: &str) -> Result<Vec<String>> {
         Ok(vec!["p".into()])
      }

      fn diff(&self, _: &str, _: &str, _: &[String]) -> Result<String> {
         Err(DigestError::GitError("boom".into()))
      }

      fn commit_info(&self, _: &str) -> Result<CommitInfo> {
         Err(DigestError::GitError("boom".into()))
      }
   }

   #[test]
   fn test_extract_diff_failure_is_empty() {
      assert_eq!(extract_diff(&FailingVcs, "abc", &[]), "");
   }

   // === Tests against a scratch repository ===

   fn git(dir: &Path, args: &[&str]) -> String {
      let output = Command::new("git")
         .args(args)
         .current_dir(dir)
         .env("GIT_AUTHOR_NAME", "Test")
         .env("GIT_AUTHOR_EMAIL", "test@test.com")
         .env("GIT_COMMITTER_NAME", "Test")
         .env("GIT_COMMITTER_EMAIL", "test@test.com")
         .output()
         .unwrap();
      assert!(output.status.success(), "git {args:?}: {}", String::from_utf8_lossy(&output.stderr));
      String::from_utf8_lossy(&output.stdout).trim().to_string()
   }

   fn scratch_repo() -> tempfile::TempDir {
      let dir = tempfile::tempdir().unwrap();
      git(dir.path(), &["init", "-q", "-b", "main"]);
      git(dir.path(), &["config", "commit.gpgsign", "false"]);
      dir
   }

   fn commit_file(dir: &Path, name: &str, content: &str, message: &str) -> String {
      let path = dir.join(name);
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent).unwrap();
      }
      fs::write(path, content).unwrap();
      git(dir, &["add", "-A"]);
      git(dir, &["commit", "-q", "-m", message]);
      git(dir, &["rev-parse", "HEAD"])
   }

   #[test]
   fn test_open_rejects_missing_dir() {
      let err = GitCli::open(Path::new("/definitely/not/here")).unwrap_err();
      assert!(matches!(err, DigestError::InvalidRepository { .. }));
   }

   #[test]
   fn test_open_rejects_plain_dir() {
      let dir = tempfile::tempdir().unwrap();
      let err = GitCli::open(dir.path()).unwrap_err();
      assert!(matches!(err, DigestError::InvalidRepository { .. }));
   }

   #[test]
   fn test_root_commit_diffs_against_empty_tree() {
      let dir = scratch_repo();
      let hash = commit_file(dir.path(), "src/lib.rs", "pub fn hi() {}\n", "init");
      let cli = GitCli::open(dir.path()).unwrap();

      assert!(cli.parents(&hash).unwrap().is_empty());
      let diff = extract_diff(&cli, &hash, &[]);
      assert!(diff.contains("diff --git a/src/lib.rs b/src/lib.rs"));
      assert!(diff.contains("+pub fn hi() {}"));
   }

   #[test]
   fn test_diff_is_zero_context_and_honours_excludes() {
      let dir = scratch_repo();
      commit_file(dir.path(), "a.txt", "1\n2\n3\n4\n5\n", "init");
      fs::write(dir.path().join("package-lock.json"), "{}\n").unwrap();
      fs::create_dir_all(dir.path().join("dist")).unwrap();
      fs::write(dir.path().join("dist/app.js"), "x\n").unwrap();
      let hash = commit_file(dir.path(), "a.txt", "1\n2\nthree\n4\n5\n", "edit");
      let cli = GitCli::open(dir.path()).unwrap();

      let excludes = vec!["package-lock.json".to_string(), "dist/".to_string()];
      let diff = extract_diff(&cli, &hash, &excludes);
      assert!(diff.contains("+three"));
      assert!(!diff.contains(" 2\n"), "context lines leaked: {diff}");
      assert!(!diff.contains("package-lock.json"));
      assert!(!diff.contains("dist/app.js"));
   }

   #[test]
   fn test_fully_excluded_commit_yields_empty_diff() {
      let dir = scratch_repo();
      commit_file(dir.path(), "a.txt", "a\n", "init");
      let hash = commit_file(dir.path(), "yarn.lock", "lock\n", "bump lock");
      let cli = GitCli::open(dir.path()).unwrap();
      assert_eq!(extract_diff(&cli, &hash, &["yarn.lock".to_string()]), "");
   }

   #[test]
   fn test_commit_info_and_window_listing() {
      let dir = scratch_repo();
      let first = commit_file(dir.path(), "a.txt", "a\n", "first change");
      let second = commit_file(dir.path(), "b.txt", "b\n", "second change");
      let cli = GitCli::open(dir.path()).unwrap();

      let info = cli.commit_info(&second).unwrap();
      assert_eq!(info.title, "second change");
      assert_eq!(info.author, "Test");
      assert!(info.committed_at.is_some());

      let bounds = Window::DaysAgo(1).bounds_at(Local::now() + Duration::minutes(1)).unwrap();
      let all = cli.commits_in_window(RevScope::AllRefs, &bounds).unwrap();
      assert_eq!(all, [first, second]);
   }

   #[test]
   fn test_remote_branches_in_repo_without_remotes() {
      let dir = scratch_repo();
      commit_file(dir.path(), "a.txt", "a\n", "init");
      let cli = GitCli::open(dir.path()).unwrap();
      assert!(cli.remote_branches().unwrap().is_empty());
   }
}
