//! Terminal output for the CLI.
//!
//! Messages use `color_print::cformat!` tags; output goes through anstream so
//! `NO_COLOR`, `CLICOLOR_FORCE` and non-terminal stdout strip the styling.

use color_print::cformat;

/// Auto-detecting println that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::println;

/// Auto-detecting eprintln that respects NO_COLOR, CLICOLOR_FORCE, and terminal capabilities
pub use anstream::eprintln;

pub use anstream::print;

pub const ERROR_EMOJI: &str = "❌";
pub const WARNING_EMOJI: &str = "🟡";
pub const HINT_EMOJI: &str = "💡";
pub const INFO_EMOJI: &str = "⚪";

/// `error_message(cformat!("No ULOG at <bold>{path}</>"))`
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("{ERROR_EMOJI} <red>{}</>", content.as_ref())
}

pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("{WARNING_EMOJI} <yellow>{}</>", content.as_ref())
}

pub fn hint_message(content: impl AsRef<str>) -> String {
    cformat!("{HINT_EMOJI} <dim>{}</>", content.as_ref())
}

pub fn info_message(content: impl AsRef<str>) -> String {
    cformat!("{INFO_EMOJI} {}", content.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_strip_to_plain_text() {
        let stripped = anstream::adapter::strip_str(&error_message("boom")).to_string();
        assert_eq!(stripped, "❌ boom");

        let stripped = anstream::adapter::strip_str(&hint_message("try -v")).to_string();
        assert_eq!(stripped, "💡 try -v");
    }
}
