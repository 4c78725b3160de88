//! Display helpers for terminal output

use std::fmt::Display;

use colored::Colorize;
use nfc_access_credential::Authenticity;
use nfc_access_session::{SessionEvent, TagReadResult, WriteOutcome};

/// A formatted section title
pub struct SectionTitle(pub &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub const fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format an error message
pub fn failure(message: &str) -> String {
    format!("❌ {}", message.red().bold())
}

/// Format an info message
pub fn info(message: &str) -> String {
    format!("ℹ️  {}", message.blue())
}

/// Format a key-value section for important outputs
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Format a sensitive data warning
pub fn sensitive_data_warning() -> String {
    warning("THE PRIVATE KEY SIGNS EVERY CREDENTIAL - KEEP IT OFF SHARED MACHINES!")
}

/// Colored authenticity verdict
pub fn authenticity(verdict: Option<Authenticity>) -> String {
    match verdict {
        Some(Authenticity::Genuine) => "genuine signature".green().bold().to_string(),
        Some(Authenticity::Forged) => "INVALID SIGNATURE".red().bold().to_string(),
        Some(Authenticity::Unsigned) => "unsigned (legacy credential)".yellow().to_string(),
        None => "unknown (no public key configured)".dimmed().to_string(),
    }
}

/// Print a tag read
pub fn read_result(result: &TagReadResult) {
    println!(
        "{}",
        key_value_box(
            "Tag",
            vec![
                ("UID", result.uid.clone()),
                ("Type", result.tag_type.clone()),
                (
                    "Counter",
                    result
                        .counter
                        .map_or_else(|| "unavailable".to_string(), |c| c.to_string()),
                ),
                (
                    "Door code",
                    result.access_code.clone().unwrap_or_else(|| "-".to_string()),
                ),
                ("Signature", authenticity(result.authenticity)),
            ],
        )
    );

    println!("{}", section_title("Content"));
    if result.text.is_empty() {
        println!("  {}", "(empty)".dimmed());
    }
    for line in result.text.lines() {
        println!("  {line}");
    }
}

fn write_outcome(outcome: &WriteOutcome) -> String {
    let counter = if outcome.counter_enabled {
        "counter on"
    } else {
        "counter off"
    };
    success(&format!(
        "{} written to {} {} ({counter})",
        outcome.kind, outcome.tag_type, outcome.uid
    ))
}

/// Print a session event
pub fn event(event: &SessionEvent) {
    match event {
        SessionEvent::Waiting(kind) => {
            println!("{}", info(&format!("Present a tag for the {kind}...")));
        }
        SessionEvent::Success(outcome) => println!("{}", write_outcome(outcome)),
        SessionEvent::Failure { kind, uid, reason } => {
            let uid = if uid.is_empty() { "?" } else { uid.as_str() };
            println!("{}", failure(&format!("{kind} on {uid} failed: {reason}")));
        }
        SessionEvent::Read(result) => read_result(result),
    }
}
