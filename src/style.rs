//! Console output: colored status lines on stderr, plain report text on
//! stdout.
//!
//! Colors follow `NO_COLOR` and what the terminal supports. Debug lines only
//! appear after `set_verbose(true)`.

use std::{
   io::IsTerminal,
   sync::{
      OnceLock,
      atomic::{AtomicBool, Ordering},
   },
};

use owo_colors::{OwoColorize, Style};

static COLOR_ENABLED: OnceLock<bool> = OnceLock::new();

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(on: bool) {
   VERBOSE.store(on, Ordering::Relaxed);
}

pub fn verbose() -> bool {
   VERBOSE.load(Ordering::Relaxed)
}

/// Decided once per process.
pub fn colors_enabled() -> bool {
   *COLOR_ENABLED.get_or_init(|| {
      // https://no-color.org/
      std::env::var_os("NO_COLOR").is_none()
         && supports_color::on(supports_color::Stream::Stderr).is_some_and(|level| level.has_basic)
   })
}

fn paint(s: &str, style: Style) -> String {
   if colors_enabled() { s.style(style).to_string() } else { s.to_string() }
}

pub fn success(s: &str) -> String {
   paint(s, Style::new().green().bold())
}

pub fn warning(s: &str) -> String {
   paint(s, Style::new().yellow())
}

pub fn error(s: &str) -> String {
   paint(s, Style::new().red().bold())
}

pub fn dim(s: &str) -> String {
   paint(s, Style::new().dimmed())
}

pub fn bold(s: &str) -> String {
   paint(s, Style::new().bold())
}

/// Non-fatal problem; the run continues.
pub fn warn(msg: &str) {
   eprintln!("{} {}", warning(icons::WARNING), warning(msg));
}

/// Progress line.
pub fn print_info(msg: &str) {
   let icon = if std::io::stderr().is_terminal() {
      paint(icons::INFO, Style::new().cyan())
   } else {
      icons::INFO.to_string()
   };
   eprintln!("{icon} {msg}");
}

/// Verbose-only diagnostics (git invocations, chunk counts, prompt sizes).
pub fn debug(msg: &str) {
   if verbose() {
      eprintln!("{} {}", dim(icons::ARROW), dim(msg));
   }
}

/// Terminal width, capped at 120 columns; 80 when unknown.
pub fn term_width() -> usize {
   terminal_size::terminal_size()
      .map_or(80, |(w, _)| w.0 as usize)
      .min(120)
}

/// `──── title ────` spanning `width` columns.
pub fn section_header(title: &str, width: usize) -> String {
   let side = "\u{2500}".repeat(width.saturating_sub(title.chars().count() + 2) / 2);
   format!("{} {} {}", dim(&side), bold(title), dim(&side))
}

pub mod icons {
   pub const SUCCESS: &str = "\u{2713}";
   pub const WARNING: &str = "\u{26A0}";
   pub const ERROR: &str = "\u{2717}";
   pub const INFO: &str = "\u{2139}";
   pub const ARROW: &str = "\u{2192}";
   pub const SEARCH: &str = "\u{1F50D}";
   pub const ROBOT: &str = "\u{1F916}";
}
