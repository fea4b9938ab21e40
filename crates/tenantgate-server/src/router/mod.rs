//! Method and path-pattern routing.
//!
//! Patterns are `/`-separated segments; a segment written `:name` captures
//! one non-empty path segment under `name`. Everything else matches
//! literally.

use axum::http::Method;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Named segments captured from a path.
pub type PathParams = HashMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("pattern '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern '{pattern}' has an unnamed parameter")]
    EmptyParam { pattern: String },

    #[error("pattern '{pattern}' declares parameter '{name}' twice")]
    DuplicateParam { pattern: String, name: String },

    #[error("pattern '{pattern}' failed to compile: {reason}")]
    Compile { pattern: String, reason: String },
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    pub fn compile(pattern: &str) -> Result<Self, RouterError> {
        if !pattern.starts_with('/') {
            return Err(RouterError::MissingLeadingSlash(pattern.to_string()));
        }

        let mut params: Vec<String> = Vec::new();
        let mut segments = Vec::new();

        for segment in pattern.split('/') {
            match segment.strip_prefix(':') {
                Some("") => {
                    return Err(RouterError::EmptyParam {
                        pattern: pattern.to_string(),
                    })
                }
                Some(name) => {
                    if params.iter().any(|p| p == name) {
                        return Err(RouterError::DuplicateParam {
                            pattern: pattern.to_string(),
                            name: name.to_string(),
                        });
                    }
                    params.push(name.to_string());
                    segments.push("([^/]+)".to_string());
                }
                None => segments.push(regex::escape(segment)),
            }
        }

        let regex = Regex::new(&format!("^{}$", segments.join("/"))).map_err(|e| RouterError::Compile {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Captured parameters when the whole path matches.
    pub fn captures(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .zip(captures.iter().skip(1))
                .filter_map(|(name, m)| m.map(|m| (name.clone(), m.as_str().to_string())))
                .collect(),
        )
    }
}

struct Route<T> {
    method: Method,
    pattern: RoutePattern,
    target: T,
}

/// Successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
    pub target: &'a T,
    pub pattern: &'a str,
    pub params: PathParams,
}

/// Ordered table of routes. The first registered match wins.
pub struct RouteTable<T> {
    routes: Vec<Route<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, pattern: &str, target: T) -> Result<(), RouterError> {
        let pattern = RoutePattern::compile(pattern)?;
        self.routes.push(Route {
            method,
            pattern,
            target,
        });
        Ok(())
    }

    pub fn match_route(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, T>> {
        self.routes
            .iter()
            .filter(|r| r.method == *method)
            .find_map(|r| {
                r.pattern.captures(path).map(|params| RouteMatch {
                    target: &r.target,
                    pattern: r.pattern.as_str(),
                    params,
                })
            })
    }

    /// Whether any route, of any method, matches `path`.
    pub fn allows_path(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r.pattern.regex.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
