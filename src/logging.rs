use std::io::Write;
use std::path::Path;

use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

use crate::eval::{Outcome, Report};

/// Install the stderr logger. Safe to call more than once; later calls are ignored.
pub fn init(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Never);
}

/// Parse a `--log-level` value, falling back to `info`.
pub fn parse_level(raw: &str) -> LevelFilter {
    raw.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Append one verdict line to the decision log.
/// Best-effort: failures are ignored so the log can never change a verdict.
pub fn log_decision(path: &Path, repo: &str, actor: &str, report: &Report) {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    else {
        return;
    };
    let _ = file.write_all(decision_line(repo, actor, report).as_bytes());
}

fn decision_line(repo: &str, actor: &str, report: &Report) -> String {
    let (verdict, message) = match &report.outcome {
        Outcome::Decided(decision) => (decision.as_str(), decision.message.as_str()),
        Outcome::SafeExit(reason) => ("skip", reason.as_str()),
    };
    // Compact single-line message; tabs would break the columns.
    let message = message.replace(['\n', '\t'], " ");
    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        "{ts}\t{repo}\t{actor}\t{verdict}\t{context}\t{message}\n",
        context = report.context,
    )
}
