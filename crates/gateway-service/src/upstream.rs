//! Prefix routing table for the gateway's upstream services.

use crate::config::Config;
use reqwest::Url;

/// One upstream service and the path prefix routed to it.
#[derive(Debug, Clone)]
pub struct Upstream {
    name: &'static str,
    prefix: &'static str,
    base_url: Url,
    strip_prefix: bool,
}

impl Upstream {
    /// `prefix` must start with `/` and have no trailing slash.
    #[must_use]
    pub fn new(name: &'static str, prefix: &'static str, base_url: Url, strip_prefix: bool) -> Self {
        Self {
            name,
            prefix,
            base_url,
            strip_prefix,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Prefix match on whole segments: `/users` covers `/users` and
    /// `/users/me`, not `/usersettings`.
    fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    fn forwarded_path<'a>(&self, path: &'a str) -> &'a str {
        if !self.strip_prefix {
            return path;
        }
        match path.get(self.prefix.len()..) {
            Some(rest) if !rest.is_empty() => rest,
            _ => "/",
        }
    }
}

/// Where a request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub upstream: &'static str,
    pub url: Url,
}

/// Ordered upstream list. The first matching prefix wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    upstreams: Vec<Upstream>,
}

impl RouteTable {
    #[must_use]
    pub fn new(upstreams: Vec<Upstream>) -> Self {
        Self { upstreams }
    }

    /// `/auth/*` keeps its prefix because the auth service serves it;
    /// `/users/*` and `/tmdb/*` are stripped.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            Upstream::new("auth", "/auth", config.auth_service_url.clone(), false),
            Upstream::new("user", "/users", config.user_service_url.clone(), true),
            Upstream::new("tmdb", "/tmdb", config.tmdb_service_url.clone(), true),
        ])
    }

    pub fn upstreams(&self) -> impl Iterator<Item = &Upstream> {
        self.upstreams.iter()
    }

    /// Resolve `path` (and the raw query string) to an upstream URL.
    #[must_use]
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<Target> {
        let upstream = self.upstreams.iter().find(|u| u.matches(path))?;

        let mut url = upstream.base_url.clone();
        let joined = format!(
            "{}{}",
            upstream.base_url.path().trim_end_matches('/'),
            upstream.forwarded_path(path)
        );
        url.set_path(&joined);
        url.set_query(query);

        Some(Target {
            upstream: upstream.name,
            url,
        })
    }
}
