//! Canonical absolute paths for the namespace.
//!
//! Every node is addressed by an absolute, forward-slash separated path.
//! Paths are normalised on parse: `.` and `..` are resolved and duplicate
//! separators are collapsed. The empty component list denotes the root.

use crate::error::DomainError;
use std::fmt;

/// A canonical absolute path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath {
    components: Vec<String>,
}

impl NodePath {
    /// Parse and normalise an absolute path.
    ///
    /// Rejects non-absolute input. `..` above the root resolves to the root,
    /// matching Unix `path.Clean` semantics.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        if !input.starts_with('/') {
            return Err(DomainError::InvalidArgument(format!(
                "path '{input}' is not absolute"
            )));
        }

        let mut components: Vec<String> = Vec::new();
        for part in input.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    components.pop();
                }
                name => components.push(name.to_string()),
            }
        }

        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// The final component, or `None` for the root.
    pub fn basename(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The canonical string form (`/` for the root).
    pub fn as_string(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}", self.components.join("/"))
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            for component in &self.components {
                write!(f, "/{component}")?;
            }
            Ok(())
        }
    }
}
