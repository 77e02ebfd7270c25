use console::{style, Emoji, Term};
use std::io::Write;

pub static CHECK: Emoji<'static, 'static> = Emoji("✓", "+");
pub static ARROW: Emoji<'static, 'static> = Emoji("▶", ">");

pub const RULE_WIDTH: usize = 72;

pub fn line() -> String {
    "-".repeat(RULE_WIDTH)
}

pub fn dline() -> String {
    "=".repeat(RULE_WIDTH)
}

pub fn check_icon() -> String {
    style(format!("{}", CHECK)).green().to_string()
}

pub fn bold<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).bold().to_string()
}

pub fn error<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).red().to_string()
}

pub fn warning<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).color256(214).bold().to_string()
}

pub fn success<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).green().to_string()
}

pub fn highlight<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).blue().bold().to_string()
}

pub fn light<T: AsRef<str>>(text: T) -> String {
    style(text.as_ref()).color256(245).to_string()
}

/// Prints a styled warning line, e.g. `Warning: Lasso did not converge`.
pub fn warn<T: AsRef<str>>(message: T) {
    println!("{}: {}", warning("Warning"), message.as_ref());
}

/// Redraws a `label... NN%` progress line in place.
pub fn progress(label: &str, done: usize, total: usize) {
    let term = Term::stdout();
    let _ = term.clear_line();
    print!("\r{}... {:.0}%", label, done as f32 / total.max(1) as f32 * 100.0);
    let _ = std::io::stdout().flush();
}

/// Replaces the current progress line with a completed stage message.
pub fn stage_done<T: AsRef<str>>(message: T, seconds: f64) {
    let term = Term::stdout();
    let _ = term.clear_line();
    println!("\r{} {} in {:.2} seconds.", check_icon(), message.as_ref(), seconds);
}
