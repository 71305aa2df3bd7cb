use serde::Serialize;

/// Final answer for one command invocation.
///
/// `ref_name`/`sha` are only set when the command is allowed on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub message: String,
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
    pub sha: Option<String>,
}

impl Decision {
    pub fn allow(message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            message: message.into(),
            ref_name: None,
            sha: None,
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
            ref_name: None,
            sha: None,
        }
    }

    /// Attach the ref and sha to act on. Denials never carry them.
    pub fn with_target(mut self, ref_name: &str, sha: &str) -> Self {
        if self.allowed {
            self.ref_name = Some(ref_name.to_string());
            self.sha = Some(sha.to_string());
        }
        self
    }

    pub fn as_str(&self) -> &'static str {
        if self.allowed { "allow" } else { "deny" }
    }
}
