//! Capability roles shared across catalogues.
//!
//! Kinds do not inherit behaviour. Instead a schema binds the well-known
//! roles to one of its abstract kinds, and every node whose kind derives from
//! that abstract kind can be viewed through the role's trait.

use serde::Serialize;

use crate::id::AttrId;
use crate::node::NodeRef;
use crate::schema::{NamedRole, PositionedRole};

/// Something with a name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Something with a source range.
pub trait Positioned {
    fn path(&self) -> &str;
    fn line(&self) -> i32;
    fn col(&self) -> i32;
    fn end_line(&self) -> i32;
    fn end_col(&self) -> i32;

    fn range(&self) -> SourceRange {
        SourceRange {
            path: self.path().to_string(),
            line: self.line(),
            col: self.col(),
            end_line: self.end_line(),
            end_col: self.end_col(),
        }
    }
}

/// Owned copy of a node's source range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRange {
    pub path: String,
    pub line: i32,
    pub col: i32,
    pub end_line: i32,
    pub end_col: i32,
}

/// [`Named`] view of a node.
#[derive(Debug, Clone, Copy)]
pub struct NamedView<'a> {
    node: NodeRef<'a>,
    name: AttrId,
}

impl<'a> NamedView<'a> {
    pub(crate) fn new(node: NodeRef<'a>, role: NamedRole) -> Self {
        NamedView { node, name: role.name }
    }

    pub fn node(&self) -> NodeRef<'a> {
        self.node
    }
}

impl Named for NamedView<'_> {
    fn name(&self) -> &str {
        self.node.str_attr(self.name).unwrap_or("")
    }
}

/// [`Positioned`] view of a node.
#[derive(Debug, Clone, Copy)]
pub struct PositionedView<'a> {
    node: NodeRef<'a>,
    role: PositionedRole,
}

impl<'a> PositionedView<'a> {
    pub(crate) fn new(node: NodeRef<'a>, role: PositionedRole) -> Self {
        PositionedView { node, role }
    }

    pub fn node(&self) -> NodeRef<'a> {
        self.node
    }

    fn int(&self, attr: AttrId) -> i32 {
        self.node.int_attr(attr).unwrap_or(0)
    }
}

impl Positioned for PositionedView<'_> {
    fn path(&self) -> &str {
        self.node.str_attr(self.role.path).unwrap_or("")
    }

    fn line(&self) -> i32 {
        self.int(self.role.line)
    }

    fn col(&self) -> i32 {
        self.int(self.role.col)
    }

    fn end_line(&self) -> i32 {
        self.int(self.role.end_line)
    }

    fn end_col(&self) -> i32 {
        self.int(self.role.end_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::catalog::python::{self, attr, kind};
    use crate::node::AttrValue;

    #[test]
    fn named_view_reads_name_attribute() {
        let mut arena = Arena::new(python::schema());
        let f = arena.create(kind::FUNCTION_DEF).unwrap();
        arena.set_str(f, attr::NAME, "main").unwrap();
        let node = arena.get(f).unwrap();
        assert_eq!(node.as_named().unwrap().name(), "main");
    }

    #[test]
    fn positioned_view_builds_range() {
        let mut arena = Arena::new(python::schema());
        let s = arena.create(kind::RETURN).unwrap();
        arena.set_str(s, attr::PATH, "a.py").unwrap();
        arena.set_attr(s, attr::LINE, AttrValue::Int(3)).unwrap();
        arena.set_attr(s, attr::COL, AttrValue::Int(4)).unwrap();
        arena.set_attr(s, attr::END_LINE, AttrValue::Int(3)).unwrap();
        arena.set_attr(s, attr::END_COL, AttrValue::Int(12)).unwrap();

        let range = arena.get(s).unwrap().as_positioned().unwrap().range();
        assert_eq!(
            range,
            SourceRange {
                path: "a.py".into(),
                line: 3,
                col: 4,
                end_line: 3,
                end_col: 12
            }
        );
    }
}
