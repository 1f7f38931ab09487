//! Query / mutation document builder.
//!
//! Every remote call is a single root field with scalar or input-object
//! arguments and an optional selection set. [`GraphQlRequest`] renders
//! the document and the `{"query": ...}` body the node service expects.

use std::fmt::Write as _;

use serde::Serialize;

/// Root operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Read-only query.
    Query,
    /// State-mutating operation.
    Mutation,
}

/// Argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    /// Unsigned integer literal.
    Int(u64),
    /// String literal (escaped on render).
    Str(String),
    /// Boolean literal.
    Bool(bool),
    /// Input object.
    Object(Vec<(String, ArgValue)>),
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for ArgValue {
    fn from(value: usize) -> Self {
        Self::Int(u64::try_from(value).unwrap_or(u64::MAX))
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl ArgValue {
    fn render(&self, out: &mut String) {
        match self {
            Self::Int(v) => {
                let _ = write!(out, "{v}");
            }
            Self::Bool(v) => {
                let _ = write!(out, "{v}");
            }
            // JSON string escaping is valid GraphQL string escaping.
            Self::Str(v) => out.push_str(&serde_json::Value::from(v.as_str()).to_string()),
            Self::Object(fields) => {
                out.push('{');
                render_args(fields, out);
                out.push('}');
            }
        }
    }
}

fn render_args(args: &[(String, ArgValue)], out: &mut String) {
    for (i, (name, value)) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(name);
        out.push_str(": ");
        value.render(out);
    }
}

/// A single-field query or mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphQlRequest {
    kind: OperationKind,
    field: String,
    args: Vec<(String, ArgValue)>,
    selection: Option<String>,
}

#[derive(Serialize)]
struct Body<'a> {
    query: &'a str,
}

impl GraphQlRequest {
    /// Starts a query on `field`.
    #[must_use]
    pub fn query(field: &str) -> Self {
        Self::new(OperationKind::Query, field)
    }

    /// Starts a mutation on `field`.
    #[must_use]
    pub fn mutation(field: &str) -> Self {
        Self::new(OperationKind::Mutation, field)
    }

    fn new(kind: OperationKind, field: &str) -> Self {
        Self {
            kind,
            field: field.to_string(),
            args: Vec::new(),
            selection: None,
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.args.push((name.to_string(), value.into()));
        self
    }

    /// Sets the selection set (without surrounding braces).
    #[must_use]
    pub fn select(mut self, fields: &str) -> Self {
        self.selection = Some(fields.to_string());
        self
    }

    /// Root field name; also the key of the payload in `data`.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Looks up an argument by name.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&ArgValue> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Renders the document, e.g. `query { auctionInfo(auctionId: 4) { status } }`.
    #[must_use]
    pub fn document(&self) -> String {
        let mut out = String::new();
        out.push_str(match self.kind {
            OperationKind::Query => "query { ",
            OperationKind::Mutation => "mutation { ",
        });
        out.push_str(&self.field);
        if !self.args.is_empty() {
            out.push('(');
            render_args(&self.args, &mut out);
            out.push(')');
        }
        if let Some(selection) = &self.selection {
            out.push_str(" { ");
            out.push_str(selection);
            out.push_str(" }");
        }
        out.push_str(" }");
        out
    }

    /// Serialized request body: `{"query": "<document>"}`.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        let document = self.document();
        serde_json::to_string(&Body { query: &document })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn renders_query_with_args_and_selection() {
        let req = GraphQlRequest::query("bidHistory")
            .arg("auctionId", 42u64)
            .arg("offset", 0usize)
            .arg("limit", 50usize)
            .select("bidId quantity");
        assert_eq!(
            req.document(),
            "query { bidHistory(auctionId: 42, offset: 0, limit: 50) { bidId quantity } }"
        );
    }

    #[test]
    fn renders_bare_mutation() {
        let req = GraphQlRequest::mutation("trigger");
        assert_eq!(req.document(), "mutation { trigger }");
        assert_eq!(req.kind(), OperationKind::Mutation);
    }

    #[test]
    fn strings_are_escaped() {
        let req = GraphQlRequest::mutation("createAuction").arg(
            "params",
            ArgValue::Object(vec![("itemName".to_string(), ArgValue::from("a \"b\""))]),
        );
        assert_eq!(
            req.document(),
            r#"mutation { createAuction(params: {itemName: "a \"b\""}) }"#
        );
    }

    #[test]
    fn body_wraps_document() {
        let req = GraphQlRequest::query("myAuctionCommitment").select("auctionId");
        let Ok(body) = req.to_body() else {
            panic!("serialization failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) else {
            panic!("body is not json");
        };
        assert_eq!(
            value.get("query").and_then(|v| v.as_str()),
            Some("query { myAuctionCommitment { auctionId } }")
        );
    }

    #[test]
    fn argument_lookup() {
        let req = GraphQlRequest::query("auctionInfo").arg("auctionId", 3u64);
        assert_eq!(req.argument("auctionId"), Some(&ArgValue::Int(3)));
        assert_eq!(req.argument("missing"), None);
    }
}
