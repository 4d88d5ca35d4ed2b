//! Diagnostic document paths

use std::fmt;

/// One step from a container to a member
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field
    Field(String),
    /// 0-based array element
    Index(usize),
}

/// Path from the document root to the value being visited
///
/// Rendered dotted for fields and bracketed for indices, e.g. `list[0].name`.
/// The empty path renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocPath {
    segments: Vec<PathSegment>,
}

impl DocPath {
    /// Empty path (document root)
    pub fn new() -> Self {
        Self::default()
    }

    /// Descend into an object field
    pub fn push_field(&mut self, name: impl Into<String>) {
        self.segments.push(PathSegment::Field(name.into()));
    }

    /// Descend into an array element
    pub fn push_index(&mut self, index: usize) {
        self.segments.push(PathSegment::Index(index));
    }

    /// Return to the parent container
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.segments.pop()
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True at the document root
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments from the root down
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if idx == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_renders_placeholder() {
        assert_eq!(DocPath::new().to_string(), "<root>");
    }

    #[test]
    fn renders_fields_and_indices() {
        let mut path = DocPath::new();
        path.push_field("list");
        assert_eq!(path.to_string(), "list");

        path.push_index(0);
        path.push_field("name");
        assert_eq!(path.to_string(), "list[0].name");
        assert_eq!(path.depth(), 3);

        assert_eq!(path.pop(), Some(PathSegment::Field("name".to_string())));
        path.pop();
        assert_eq!(path.to_string(), "list");
    }

    #[test]
    fn top_level_index_has_no_leading_dot() {
        let mut path = DocPath::new();
        path.push_index(3);
        path.push_field("x");
        assert_eq!(path.to_string(), "[3].x");
    }
}
