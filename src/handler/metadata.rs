//! Declarative route metadata attached to handler types.

use serde_json::{Map, Value};

use crate::handler::pipeline::Handler;

/// One route a handler type exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAttribute {
    pub path: String,
    /// Upper-case HTTP verbs; empty means any method.
    pub methods: Vec<String>,
    /// Canonical names of middleware services, outermost first.
    pub middlewares: Vec<String>,
    pub meta: Map<String, Value>,
}

impl RouteAttribute {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
            middlewares: Vec::new(),
            meta: Map::new(),
        }
    }

    /// Add HTTP methods. Duplicates are ignored.
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for method in methods {
            let method = method.as_ref().to_ascii_uppercase();
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        self
    }

    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middlewares.push(name.into());
        self
    }

    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Declares that a handler consumes a hydrated request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAttribute {
    /// Canonical name of the transfer object the payload is mapped into.
    pub dto: String,
    pub entity: Option<String>,
}

impl EntityAttribute {
    pub fn new(dto: impl Into<String>) -> Self {
        Self {
            dto: dto.into(),
            entity: None,
        }
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

/// Capability implemented by every discoverable handler type.
///
/// `NAME` is the canonical type name, `Module::Handler::TypeName`, matching
/// the handler's source file below the module directory.
pub trait RouteMetadataSource: Handler {
    const NAME: &'static str;

    fn routes() -> Vec<RouteAttribute>;

    fn entity() -> Option<EntityAttribute> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_attribute_builder() {
        let route = RouteAttribute::new("/posts")
            .methods(["get", "POST", "GET"])
            .middleware("Blog::Middleware::Auth")
            .meta("permission", "posts.read");

        assert_eq!(route.methods, vec!["GET", "POST"]);
        assert_eq!(route.middlewares, vec!["Blog::Middleware::Auth"]);
        assert_eq!(route.meta.get("permission"), Some(&json!("posts.read")));
    }
}
