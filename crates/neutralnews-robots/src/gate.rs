use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// Why a body fetch is being attempted: feed retrieval tolerates a robots
/// denial (it becomes a warning), body scraping does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Feed,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

/// Disallow rules parsed out of a robots.txt, scoped to the `*` user-agent
/// group (outlets in this registry do not special-case individual bots).
#[derive(Debug, Clone, Default)]
struct RobotRules {
    disallow: Vec<String>,
}

impl RobotRules {
    fn parse(body: &str) -> Self {
        let mut disallow = Vec::new();
        let mut in_wildcard_group = false;
        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();
            match key.as_str() {
                "user-agent" => {
                    in_wildcard_group = value == "*";
                }
                "disallow" if in_wildcard_group && !value.is_empty() => {
                    disallow.push(value.to_string());
                }
                _ => {}
            }
        }
        Self { disallow }
    }

    fn allows(&self, path: &str) -> bool {
        !self.disallow.iter().any(|rule| path.starts_with(rule.as_str()))
    }
}

struct DomainEntry {
    rules: RobotRules,
    last_access: Instant,
}

/// Per-domain robots.txt cache and access pacing, shared across the fetch
/// and enrich pools. Robots documents that fail to load are cached as
/// "unknown" and treated as allow.
pub struct RobotsGate {
    client: reqwest::Client,
    domains: Mutex<HashMap<String, DomainEntry>>,
    domain_delay: Duration,
    max_domains: usize,
}

impl RobotsGate {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(500))
    }

    pub fn with_delay(domain_delay: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("NeutralNewsBot/1.0 (+https://neutralnews.internal)")
            .build()
            .expect("failed to build robots HTTP client");
        Self {
            client,
            domains: Mutex::new(HashMap::new()),
            domain_delay,
            max_domains: neutralnews_common::tunables::MAX_DOMAINS,
        }
    }

    fn domain_of(url: &str) -> Option<String> {
        Url::parse(url).ok()?.host_str().map(|h| h.to_string())
    }

    /// Raw robots.txt lookup, ignoring the caller's purpose.
    async fn raw_check(&self, url: &str) -> Decision {
        let Some(domain) = Self::domain_of(url) else {
            return Decision::Allow;
        };
        let path = Url::parse(url)
            .map(|u| {
                let mut p = u.path().to_string();
                if let Some(q) = u.query() {
                    p.push('?');
                    p.push_str(q);
                }
                p
            })
            .unwrap_or_else(|_| "/".to_string());

        self.ensure_loaded(&domain).await;

        let mut domains = self.domains.lock().await;
        let Some(entry) = domains.get(&domain) else {
            return Decision::Allow;
        };
        if entry.rules.allows(&path) {
            Decision::Allow
        } else {
            Decision::Deny(format!("robots.txt disallows {path} on {domain}"))
        }
    }

    /// `allowed(url, purpose)`: for `Purpose::Feed`, a robots denial is
    /// downgraded to a warning and the fetch proceeds; for `Purpose::Body`
    /// it blocks the fetch.
    pub async fn allowed(&self, url: &str, purpose: Purpose) -> Decision {
        let raw = self.raw_check(url).await;
        match (purpose, raw) {
            (Purpose::Feed, Decision::Deny(reason)) => {
                warn!(url, reason = %reason, "robots denies feed fetch, proceeding anyway");
                Decision::Allow
            }
            (_, other) => other,
        }
    }

    async fn ensure_loaded(&self, domain: &str) {
        {
            let domains = self.domains.lock().await;
            if domains.contains_key(domain) {
                return;
            }
        }

        let robots_url = format!("https://{domain}/robots.txt");
        let rules = match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => RobotRules::parse(&body),
                Err(_) => RobotRules::default(),
            },
            _ => RobotRules::default(),
        };

        let mut domains = self.domains.lock().await;
        self.evict_if_needed(&mut domains);
        domains.insert(
            domain.to_string(),
            DomainEntry {
                rules,
                last_access: Instant::now(),
            },
        );
    }

    fn evict_if_needed(&self, domains: &mut HashMap<String, DomainEntry>) {
        if domains.len() <= self.max_domains {
            return;
        }
        let mut by_recency: Vec<(String, Instant)> = domains
            .iter()
            .map(|(k, v)| (k.clone(), v.last_access))
            .collect();
        by_recency.sort_by_key(|(_, t)| *t);
        for (domain, _) in by_recency.into_iter().take(domains.len() / 2) {
            domains.remove(&domain);
        }
    }

    /// Sleep the calling worker so successive calls on the same domain are
    /// spaced by at least `domain_delay`.
    pub async fn wait(&self, domain: &str) {
        let sleep_for = {
            let mut domains = self.domains.lock().await;
            let now = Instant::now();
            let sleep_for = domains
                .get(domain)
                .map(|entry| self.domain_delay.saturating_sub(now.duration_since(entry.last_access)))
                .unwrap_or(Duration::ZERO);
            domains
                .entry(domain.to_string())
                .or_insert_with(|| DomainEntry {
                    rules: RobotRules::default(),
                    last_access: now,
                })
                .last_access = now + sleep_for;
            sleep_for
        };
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }
    }
}

impl Default for RobotsGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard_disallow_rules() {
        let body = "User-agent: *\nDisallow: /private\nDisallow: /admin\n\nUser-agent: OtherBot\nDisallow: /everything\n";
        let rules = RobotRules::parse(body);
        assert!(!rules.allows("/private/page"));
        assert!(!rules.allows("/admin"));
        assert!(rules.allows("/everything"));
        assert!(rules.allows("/public"));
    }

    #[test]
    fn empty_disallow_value_allows_everything() {
        let body = "User-agent: *\nDisallow:\n";
        let rules = RobotRules::parse(body);
        assert!(rules.allows("/anything"));
    }

    #[tokio::test]
    async fn unreachable_domain_defaults_to_allow() {
        let gate = RobotsGate::new();
        let decision = gate
            .allowed("https://this-domain-should-not-resolve.invalid/article", Purpose::Body)
            .await;
        assert_eq!(decision, Decision::Allow);
    }
}
