//! Blocked-domain classification.
//!
//! # Responsibilities
//! - Decide whether an outbound URL must go through a relay
//! - Skip local, same-host and infrastructure targets
//! - Match hostnames against the blocked-domain list
//!
//! # Design Decisions
//! - Substring matching on the lowercased hostname (covers subdomains and CDN
//!   host families such as `allohacdn`)
//! - Never fails: an unparsable URL is simply not relayed

use url::Url;

/// Hosts known to be blocked for the client's network.
pub const BLOCKED_DOMAINS: &[&str] = &[
    "hdrezka.tv", "hdrezka.ag", "hdrezka.me", "rezka.ag",
    "kinogo.biz", "kinogo.net", "smotret.online",
    "rutracker.org", "kinozal.tv", "nnm-club.me",
    "filmix.ac", "filmix.me", "filmix.pro",
    "zetflix.co", "kinobase.org", "ivi.tv",
    "okko.tv", "more.tv", "start.ru", "premier.one",
    "wink.ru", "megogo.net", "kion.ru",
    "allohacdn", "fancdn", "cdnmovies", "lumex.space",
    "youtube.com", "youtu.be", "vimeo.com", "twitch.tv",
];

/// Infrastructure hosts that are always requested directly.
pub const INFRASTRUCTURE_HOSTS: &[&str] = &["cdnjs.cloudflare.com", "github.io"];

/// Decides whether a request target requires relaying.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    blocked: Vec<String>,
    page_host: Option<String>,
}

impl DomainClassifier {
    /// Classifier over the built-in list plus `extra` entries.
    pub fn new(extra: &[String], page_host: Option<String>) -> Self {
        let blocked = BLOCKED_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .chain(extra.iter().map(|d| d.trim().to_lowercase()))
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            blocked,
            page_host: page_host.map(|h| h.to_lowercase()),
        }
    }

    /// Whether `url` should be relayed.
    ///
    /// `enabled` is the engine master switch, `restrict` the
    /// "known blocked hosts only" mode.
    pub fn should_relay(&self, url: &str, enabled: bool, restrict: bool) -> bool {
        if !enabled || url.is_empty() {
            return false;
        }
        if url.starts_with('/') || url.starts_with("data:") || url.starts_with("blob:") {
            return false;
        }

        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "URL parsing error, not relaying");
                return false;
            }
        };
        let hostname = match parsed.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };

        if self.page_host.as_deref() == Some(hostname.as_str())
            || url.contains("localhost")
            || INFRASTRUCTURE_HOSTS.iter().any(|h| url.contains(h))
        {
            return false;
        }

        if !restrict {
            return true;
        }

        self.matching_domain(&hostname).is_some()
    }

    /// The first blocked-list entry contained in `hostname`.
    pub fn matching_domain(&self, hostname: &str) -> Option<&str> {
        let hostname = hostname.to_lowercase();
        self.blocked
            .iter()
            .find(|d| hostname.contains(d.as_str()))
            .map(String::as_str)
    }
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(&[], None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_hosts_relayed_in_restricted_mode() {
        let classifier = DomainClassifier::default();
        assert!(classifier.should_relay("https://hdrezka.tv/films/1", true, true));
        assert!(classifier.should_relay("https://WWW.YouTube.com/watch?v=1", true, true));
        assert!(classifier.should_relay("https://s1.allohacdn.net/v.m3u8", true, true));
        assert!(!classifier.should_relay("https://example.com/", true, true));
    }

    #[test]
    fn test_unrestricted_mode_relays_any_external_url() {
        let classifier = DomainClassifier::default();
        assert!(classifier.should_relay("https://example.com/", true, false));
        assert!(!classifier.should_relay("https://cdnjs.cloudflare.com/lib.js", true, false));
        assert!(!classifier.should_relay("https://user.github.io/app", true, false));
    }

    #[test]
    fn test_never_relays_local_targets() {
        let classifier = DomainClassifier::new(&[], Some("TV.local".into()));
        for url in [
            "http://tv.local/api/hdrezka.tv",
            "/relative/path",
            "data:text/plain,hi",
            "blob:https://hdrezka.tv/1234",
            "http://localhost:8080/hdrezka",
        ] {
            assert!(!classifier.should_relay(url, true, false), "{}", url);
        }
    }

    #[test]
    fn test_disabled_and_malformed() {
        let classifier = DomainClassifier::default();
        assert!(!classifier.should_relay("https://hdrezka.tv/", false, true));
        assert!(!classifier.should_relay("not a url", true, false));
        assert!(!classifier.should_relay("", true, false));
    }

    #[test]
    fn test_extra_domains() {
        let classifier = DomainClassifier::new(&[" Blocked.Example ".to_string()], None);
        assert!(classifier.should_relay("https://cdn.blocked.example/x", true, true));
        assert_eq!(classifier.matching_domain("CDN.BLOCKED.EXAMPLE"), Some("blocked.example"));
    }
}
