//! Path templates and route matching.
//!
//! Templates are `/`-separated; a segment starting with `:` binds the request
//! segment at the same position under that name; empty segments never bind.
//! Routes are tried in registration order and the first structural match wins.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

#[derive(Debug)]
struct Route<F> {
    segments: Vec<Segment>,
    factory: F,
}

/// Values bound from named template segments for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteBinding(HashMap<String, String>);

impl RouteBinding {
    /// Returns the value bound to `name`, if the matched template has that segment.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of bound segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was bound.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for RouteBinding {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for RouteBinding {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(pairs: I) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Ordered set of path templates, each carrying a factory value.
#[derive(Debug)]
pub struct RouteTable<F> {
    routes: Vec<Route<F>>,
}

impl<F> Default for RouteTable<F> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<F> RouteTable<F> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a template. Earlier registrations take precedence.
    pub fn register(&mut self, template: &str, factory: F) -> &mut Self {
        let segments = split(template)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        self.routes.push(Route { segments, factory });
        self
    }

    /// Finds the first template matching `path` and binds its named segments.
    ///
    /// `path` must be absolute. Segment counts must be equal and every literal
    /// must match exactly.
    pub fn match_path(&self, path: &str) -> Option<(&F, RouteBinding)> {
        if !path.starts_with('/') {
            return None;
        }
        let parts: Vec<&str> = split(path).collect();

        self.routes.iter().find_map(|route| {
            if route.segments.len() != parts.len() {
                return None;
            }
            let mut binding = HashMap::new();
            for (segment, part) in route.segments.iter().zip(&parts) {
                match segment {
                    Segment::Literal(literal) if literal.as_str() == *part => {},
                    Segment::Literal(_) => return None,
                    Segment::Param(_) if part.is_empty() => return None,
                    Segment::Param(name) => {
                        binding.insert(name.clone(), (*part).to_string());
                    },
                }
            }
            Some((&route.factory, RouteBinding(binding)))
        })
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}
