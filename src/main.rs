use std::{
   path::{Path, PathBuf},
   process::ExitCode,
};

use clap::Parser;
use git_digest::{
   api::ChatClient,
   git::GitCli,
   notify::notifier_for,
   style::{self, icons},
   *,
};

/// Apply CLI overrides to config
fn apply_cli_overrides(config: &mut DigestConfig, args: &Args) {
   if let Some(ref model) = args.model {
      config.model.clone_from(model);
   }
   if let Some(days) = args.days {
      config.lookback_days = days;
   }
   if let Some(ref dir) = args.dir {
      config.repo_dir = Some(dir.clone());
   }
   if args.no_fetch {
      config.fetch_remotes = false;
   }
   if args.verbose {
      config.verbose = true;
   }
}

/// Load config from args or default
fn load_config_from_args(args: &Args) -> Result<DigestConfig> {
   if let Some(ref config_path) = args.config {
      DigestConfig::from_file(config_path)
   } else {
      DigestConfig::load()
   }
}

/// Name used on the report: the configured identity, else the checkout's
/// directory name.
fn repo_label(config: &DigestConfig, dir: &Path) -> String {
   if !config.repo_identity.trim().is_empty() {
      return config.repo_identity.clone();
   }
   dir.canonicalize()
      .ok()
      .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
      .unwrap_or_else(|| "repository".to_string())
}

fn run(args: &Args) -> Result<RunOutcome> {
   let mut config = load_config_from_args(args)?;
   apply_cli_overrides(&mut config, args);
   style::set_verbose(config.verbose);
   eprintln!("{}", style::section_header("git-digest", style::term_width()));

   config.validate()?;
   config.require_api_key()?;

   let dir = config.repo_dir.clone().unwrap_or_else(|| PathBuf::from("."));
   let git = GitCli::open(&dir)?;

   if config.fetch_remotes {
      style::print_info(&format!("Fetching remotes in {}", style::dim(&dir.display().to_string())));
      if let Err(e) = git.fetch_remotes() {
         style::warn(&format!("Fetch failed, using local remote-tracking refs: {e}"));
      }
   }

   let client = ChatClient::new(&config)?;
   let notifier = notifier_for(&config, args.dry_run)?;
   let repo = repo_label(&config, &dir);
   let window = Window::from_days(config.lookback_days);
   style::debug(&format!("model {}, window {window}, repo {repo}", config.model));

   run_digest(&config, &repo, window, &git, &client, notifier.as_ref())
}

fn main() -> ExitCode {
   dotenvy::dotenv().ok();
   let args = Args::parse();

   match run(&args) {
      Ok(RunOutcome::NoCommits) => ExitCode::SUCCESS,
      Ok(RunOutcome::Reported { commits, degraded, delivered }) => {
         let how = if delivered { "delivered" } else { "printed" };
         let mut line = format!("Digest of {commits} commit(s) {how}");
         if degraded > 0 {
            line.push_str(&format!(" ({degraded} degraded summaries)"));
            style::warn(&line);
         } else {
            eprintln!("{} {}", style::success(icons::SUCCESS), style::success(&line));
         }
         ExitCode::SUCCESS
      },
      Err(e) => {
         let kind = if e.is_fatal() { "Fatal" } else { "Error" };
         eprintln!("{} {}", style::error(icons::ERROR), style::error(&format!("{kind}: {e}")));
         ExitCode::FAILURE
      },
   }
}
