//! Routes between node fields.
//!
//! A [`Route`] stores only node handles and field indices. The textual form used by content
//! files and serializers is [`RouteSpec`], which names nodes by DEF name and fields by any of
//! their legal spellings; it is resolved to indices once, when the route is added.
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::NodeId;

/// Directed edge from a readable field to a writable field.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    pub source: NodeId,
    pub source_field: usize,
    pub dest: NodeId,
    pub dest_field: usize,
}

impl Route {
    pub fn new(source: NodeId, source_field: usize, dest: NodeId, dest_field: usize) -> Self {
        Self {
            source,
            source_field,
            dest,
            dest_field,
        }
    }

    /// Whether either end of the route is `node`.
    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.dest == node
    }
}

/// Route expressed with DEF names and field names, as in `ROUTE A.x TO B.y`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RouteSpec {
    pub from_node: String,
    pub from_field: String,
    pub to_node: String,
    pub to_field: String,
}

impl RouteSpec {
    pub fn new(
        from_node: impl Into<String>,
        from_field: impl Into<String>,
        to_node: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_field: from_field.into(),
            to_node: to_node.into(),
            to_field: to_field.into(),
        }
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ROUTE {}.{} TO {}.{}",
            self.from_node, self.from_field, self.to_node, self.to_field
        )
    }
}

fn split_endpoint(s: &str) -> Result<(String, String)> {
    match s.split_once('.') {
        Some((node, field)) if !node.is_empty() && !field.is_empty() && !field.contains('.') => {
            Ok((node.to_owned(), field.to_owned()))
        }
        _ => Err(Error::InvalidRoute(format!(
            "expected 'Node.field', got '{s}'"
        ))),
    }
}

impl FromStr for RouteSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["ROUTE", from, "TO", to] => {
                let (from_node, from_field) = split_endpoint(from)?;
                let (to_node, to_field) = split_endpoint(to)?;
                Ok(RouteSpec {
                    from_node,
                    from_field,
                    to_node,
                    to_field,
                })
            }
            _ => Err(Error::InvalidRoute(format!(
                "expected 'ROUTE A.x TO B.y', got '{s}'"
            ))),
        }
    }
}
