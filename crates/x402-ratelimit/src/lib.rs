use std::collections::HashMap;

use chrono::Utc;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::warn;

use x402_types::RateLimitCounter;

#[derive(Debug, Clone)]
enum MatchKind {
    Regex(Box<str>),
    Prefix,
}

struct LimitEntry {
    pattern: String,
    kind: MatchKind,
    compiled: Option<Regex>,
    limit: u32,
}

/// A single path-pattern -> requests-per-window rule, in the order it
/// should be considered.
pub struct LimitRule {
    pub pattern: String,
    pub limit: u32,
}

/// Returns true if a pattern string should be treated as a regex rather
/// than a plain prefix, mirroring `_get_limit`'s heuristic.
fn looks_like_regex(pattern: &str) -> bool {
    pattern.contains('^') || pattern.contains('\\') || pattern.contains('{') || pattern.contains('*')
}

/// Fixed-window rate limiter with heterogeneous keying: requests to task
/// polling endpoints are keyed by the buyer's capability secret, everything
/// else by client IP + path.
pub struct RateLimiter {
    limits: Vec<LimitEntry>,
    window_seconds: i64,
    counters: Mutex<HashMap<String, RateLimitCounter>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitDecision {
    Allowed,
    Denied { limit: u32, window_seconds: i64 },
}

impl RateLimiter {
    pub fn new(rules: Vec<LimitRule>, window_seconds: i64) -> Self {
        let limits = rules
            .into_iter()
            .map(|rule| {
                let kind = if looks_like_regex(&rule.pattern) {
                    MatchKind::Regex(rule.pattern.clone().into_boxed_str())
                } else {
                    MatchKind::Prefix
                };
                let compiled = match &kind {
                    MatchKind::Regex(raw) => match Regex::new(&format!("^(?:{raw})$")) {
                        Ok(re) => Some(re),
                        Err(err) => {
                            warn!(pattern = %raw, %err, "invalid rate-limit pattern, skipping");
                            None
                        }
                    },
                    MatchKind::Prefix => None,
                };
                LimitEntry {
                    pattern: rule.pattern,
                    kind,
                    compiled,
                    limit: rule.limit,
                }
            })
            .collect();
        Self {
            limits,
            window_seconds,
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn limit_for_path(&self, path: &str) -> Option<u32> {
        if let Some(entry) = self.limits.iter().find(|e| e.pattern == path) {
            return Some(entry.limit);
        }
        for entry in &self.limits {
            let matched = match &entry.kind {
                MatchKind::Regex(_) => entry
                    .compiled
                    .as_ref()
                    .map(|re| re.is_match(path))
                    .unwrap_or(false),
                MatchKind::Prefix => path.starts_with(entry.pattern.as_str()),
            };
            if matched {
                return Some(entry.limit);
            }
        }
        None
    }

    /// Chooses the counter key for a request: buyer-secret-scoped for task
    /// polling, otherwise client-IP-scoped.
    pub fn key_for(path: &str, buyer_secret: Option<&str>, client_ip: Option<&str>) -> String {
        if path.contains("tasks") {
            if let Some(secret) = buyer_secret {
                return format!("secret:{secret}");
            }
        }
        let ip = client_ip.unwrap_or("unknown");
        format!("ip:{ip}:{path}")
    }

    /// Evaluates and records one request against the configured limits.
    pub async fn check(
        &self,
        path: &str,
        buyer_secret: Option<&str>,
        client_ip: Option<&str>,
    ) -> LimitDecision {
        let Some(limit) = self.limit_for_path(path) else {
            return LimitDecision::Allowed;
        };
        let key = Self::key_for(path, buyer_secret, client_ip);
        let now = Utc::now();
        let mut counters = self.counters.lock().await;
        let entry = counters.entry(key).or_insert_with(|| RateLimitCounter::fresh(now));

        if (now - entry.window_start).num_seconds() > self.window_seconds {
            *entry = RateLimitCounter::fresh(now);
        }

        if entry.count >= limit {
            return LimitDecision::Denied {
                limit,
                window_seconds: self.window_seconds,
            };
        }

        entry.count += 1;
        LimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            vec![
                LimitRule { pattern: "/tasks".to_string(), limit: 2 },
                LimitRule { pattern: "/execute".to_string(), limit: 1 },
                LimitRule { pattern: r"^/agents/[^/]+$".to_string(), limit: 5 },
            ],
            60,
        )
    }

    #[tokio::test]
    async fn allows_up_to_the_limit_then_denies() {
        let rl = limiter();
        assert_eq!(
            rl.check("/execute", None, Some("1.1.1.1")).await,
            LimitDecision::Allowed
        );
        match rl.check("/execute", None, Some("1.1.1.1")).await {
            LimitDecision::Denied { limit, .. } => assert_eq!(limit, 1),
            LimitDecision::Allowed => panic!("expected denial on second request"),
        }
    }

    #[tokio::test]
    async fn tasks_polling_is_keyed_by_buyer_secret_not_ip() {
        let rl = limiter();
        assert_eq!(
            rl.check("/tasks/abc", Some("secret-1"), Some("1.1.1.1")).await,
            LimitDecision::Allowed
        );
        assert_eq!(
            rl.check("/tasks/abc", Some("secret-1"), Some("2.2.2.2")).await,
            LimitDecision::Allowed
        );
        // Third request from a different IP but same secret still counts
        // against the same bucket.
        match rl.check("/tasks/abc", Some("secret-1"), Some("3.3.3.3")).await {
            LimitDecision::Denied { .. } => {}
            LimitDecision::Allowed => panic!("expected denial, secret bucket should be shared"),
        }
    }

    #[tokio::test]
    async fn regex_pattern_requires_full_match() {
        let rl = limiter();
        // Matches the anchored pattern exactly.
        assert_eq!(
            rl.check("/agents/42", None, Some("1.1.1.1")).await,
            LimitDecision::Allowed
        );
        // Has a trailing segment the anchored pattern doesn't allow, so no
        // rule applies and the request passes through unlimited.
        assert_eq!(
            rl.check("/agents/42/extra", None, Some("1.1.1.1")).await,
            LimitDecision::Allowed
        );
    }

    #[tokio::test]
    async fn unrelated_paths_are_unlimited() {
        let rl = limiter();
        for _ in 0..10 {
            assert_eq!(
                rl.check("/health", None, Some("1.1.1.1")).await,
                LimitDecision::Allowed
            );
        }
    }
}
