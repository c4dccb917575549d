// Output formatting helpers for CLI commands
// Human-facing messages go to stderr so stdout stays machine readable

use std::io::IsTerminal;
use std::sync::OnceLock;

/// ANSI styling only when stderr is a terminal and NO_COLOR is unset
fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal())
}

fn paint(style: &str, text: &str) -> String {
    if color_enabled() {
        format!("\x1b[{}m{}\x1b[0m", style, text)
    } else {
        text.to_string()
    }
}

/// Right-aligned action verb followed by a message
pub fn status(action: &str, message: &str) {
    eprintln!("{} {}", paint("1;36", &format!("{:>12}", action)), message);
}

pub fn success(message: &str) {
    eprintln!("  {} {}", paint("1;32", "\u{2713}"), message);
}

pub fn failure(message: &str) {
    eprintln!("  {} {}", paint("1;31", "\u{2717}"), message);
}

/// A passed validation step
pub fn check(message: &str) {
    eprintln!("  {} {}", paint("32", "\u{2713}"), message);
}

pub fn warning(message: &str) {
    eprintln!("  {} {}", paint("33", "!"), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", paint("1;31", "error:"), message);
}

pub fn info(message: &str) {
    eprintln!("  {} {}", paint("36", "i"), message);
}

pub fn dim(message: &str) {
    eprintln!("{}", paint("2", message));
}
