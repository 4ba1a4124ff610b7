use url::Url;

const SCHEMES: [&str; 2] = ["https://", "http://"];

/// Decides whether a message counts as a submission: it has to contain an
/// http(s) URL, and if an allow-list is set, one on an allowed host.
#[derive(Debug, Clone, Default)]
pub struct SubmissionMatcher {
    allowed_hosts: Vec<String>,
}

impl SubmissionMatcher {
    pub fn new<I, S>(allowed_hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_hosts: allowed_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// First qualifying URL in `content`, if any.
    pub fn find(&self, content: &str) -> Option<Url> {
        content
            .split_whitespace()
            .filter_map(extract_url)
            .find(|url| self.host_allowed(url))
    }

    pub fn is_submission(&self, content: &str) -> bool {
        self.find(content).is_some()
    }

    fn host_allowed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.allowed_hosts.is_empty() {
            return true;
        }
        self.allowed_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }
}

/// URL starting somewhere inside a whitespace-free token, e.g. `<https://x>`.
fn extract_url(token: &str) -> Option<Url> {
    let start = SCHEMES
        .iter()
        .filter_map(|s| token.to_ascii_lowercase().find(s))
        .min()?;
    let candidate = token[start..].trim_end_matches(['>', ')', ']', ',', '.', '!', '?']);
    let url = Url::parse(candidate).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
