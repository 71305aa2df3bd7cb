//! Syntax checks for GitHub handles and team slugs. No network access.

const MAX_HANDLE_LEN: usize = 39;
const MAX_TEAM_SLUG_LEN: usize = 255;

/// GitHub username syntax: alphanumerics and single inner hyphens, at most
/// 39 characters. An Enterprise Managed User suffix (`_shortcode`) is allowed.
pub fn is_valid_username(handle: &str) -> bool {
    let (base, shortcode) = match handle.rsplit_once('_') {
        Some((base, shortcode)) => (base, Some(shortcode)),
        None => (handle, None),
    };
    if let Some(shortcode) = shortcode
        && (shortcode.is_empty() || !shortcode.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return false;
    }
    is_valid_base_handle(base)
}

fn is_valid_base_handle(base: &str) -> bool {
    if base.is_empty() || base.len() > MAX_HANDLE_LEN {
        return false;
    }
    if base.starts_with('-') || base.ends_with('-') || base.contains("--") {
        return false;
    }
    base.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Team slug syntax: the lowercase, URL-safe form GitHub derives from a team name.
pub fn is_valid_team_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_TEAM_SLUG_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
