//! Trigger phrase and parameter handling for a comment body.

/// Whether `body` invokes `command`. The command must lead the comment:
/// `.deploy dev` triggers `.deploy`, `I want to .deploy` does not.
pub fn is_triggered(body: &str, command: &str) -> bool {
    let command = command.trim();
    if command.is_empty() {
        return false;
    }
    let triggered = body.trim().starts_with(command);
    if triggered {
        log::info!("comment body starts with trigger: {command}");
    } else {
        log::debug!("comment body does not start with trigger: {command}");
    }
    triggered
}

/// Everything after the first `separator`, trimmed. `None` when absent or blank.
pub fn parameters(body: &str, separator: &str) -> Option<String> {
    if separator.is_empty() {
        return None;
    }
    let (_, params) = body.split_once(separator)?;
    let params = params.trim();
    if params.is_empty() {
        log::debug!("no parameters found in comment body");
        return None;
    }
    log::debug!("found parameters in comment body: {params}");
    Some(params.to_string())
}
