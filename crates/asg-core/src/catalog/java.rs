//! Java subset catalogue.
//!
//! Its base graph is a diamond: `Member` reaches `Base` through both
//! `Commentable` and `Positioned`, and `NamedDeclaration` adds `Named` on top.

use std::sync::{Arc, OnceLock};

use crate::error::SchemaError;
use crate::schema::{AttrType, EdgeRole, EdgeShape, PositionedRole, Schema, SchemaBuilder};

pub const NAME: &str = "java";
pub const VERSION: u32 = 1;

pub mod kind {
    use crate::id::NodeKind;

    pub const BASE: NodeKind = NodeKind(0);
    pub const COMMENTABLE: NodeKind = NodeKind(1);
    pub const POSITIONED: NodeKind = NodeKind(2);
    pub const MEMBER: NodeKind = NodeKind(3);
    pub const NAMED: NodeKind = NodeKind(4);
    pub const NAMED_DECLARATION: NodeKind = NodeKind(5);
    pub const COMMENT: NodeKind = NodeKind(6);
    pub const LINE_COMMENT: NodeKind = NodeKind(7);
    pub const PACKAGE: NodeKind = NodeKind(8);
    pub const COMPILATION_UNIT: NodeKind = NodeKind(9);
    pub const CLASS_DECLARATION: NodeKind = NodeKind(10);
    pub const METHOD_DECLARATION: NodeKind = NodeKind(11);
    pub const STATEMENT: NodeKind = NodeKind(12);
    pub const BLOCK: NodeKind = NodeKind(13);
    pub const RETURN: NodeKind = NodeKind(14);
    pub const EXPRESSION: NodeKind = NodeKind(15);
    pub const IDENTIFIER: NodeKind = NodeKind(16);
}

pub mod attr {
    use crate::id::AttrId;

    pub const PATH: AttrId = AttrId(0);
    pub const LINE: AttrId = AttrId(1);
    pub const COL: AttrId = AttrId(2);
    pub const END_LINE: AttrId = AttrId(3);
    pub const END_COL: AttrId = AttrId(4);
    pub const NAME: AttrId = AttrId(5);
    pub const ACCESSIBILITY: AttrId = AttrId(6);
    pub const TEXT: AttrId = AttrId(7);
    pub const IS_ABSTRACT: AttrId = AttrId(8);
    pub const IS_FINAL: AttrId = AttrId(9);
    pub const IS_STATIC: AttrId = AttrId(10);
}

pub mod edge {
    use crate::id::EdgeKind;

    pub const HAS_COMMENT: EdgeKind = EdgeKind(0);
    pub const PACKAGE_HAS_SUB_PACKAGE: EdgeKind = EdgeKind(1);
    pub const PACKAGE_HAS_COMPILATION_UNIT: EdgeKind = EdgeKind(2);
    pub const UNIT_TYPE_DECLARATION: EdgeKind = EdgeKind(3);
    pub const CLASS_HAS_MEMBER: EdgeKind = EdgeKind(4);
    pub const CLASS_EXTENDS: EdgeKind = EdgeKind(5);
    pub const METHOD_HAS_BODY: EdgeKind = EdgeKind(6);
    pub const METHOD_OVERRIDES: EdgeKind = EdgeKind(7);
    pub const BLOCK_HAS_STATEMENT: EdgeKind = EdgeKind(8);
    pub const RETURN_HAS_EXPRESSION: EdgeKind = EdgeKind(9);
    pub const IDENTIFIER_REFERS_TO: EdgeKind = EdgeKind(10);
}

pub const ACCESSIBILITIES: &[&str] = &["package", "public", "protected", "private"];

/// Builds a fresh copy of the catalogue.
pub fn build() -> Result<Schema, SchemaError> {
    use self::attr as a;
    use self::edge as e;
    use self::kind as k;
    use EdgeRole::{Containment, Reference};
    use EdgeShape::{Multi, Single};

    let mut b = SchemaBuilder::new(NAME, VERSION);
    b.abstract_kind(k::BASE, "Base", &[])
        .abstract_kind(k::COMMENTABLE, "Commentable", &[k::BASE])
        .abstract_kind(k::POSITIONED, "Positioned", &[k::BASE])
        .abstract_kind(k::MEMBER, "Member", &[k::COMMENTABLE, k::POSITIONED])
        .abstract_kind(k::NAMED, "Named", &[k::BASE])
        .abstract_kind(k::NAMED_DECLARATION, "NamedDeclaration", &[k::MEMBER, k::NAMED])
        .abstract_kind(k::COMMENT, "Comment", &[k::POSITIONED])
        .special_kind(k::LINE_COMMENT, "LineComment", &[k::COMMENT])
        .concrete_kind(k::PACKAGE, "Package", &[k::NAMED])
        .concrete_kind(k::COMPILATION_UNIT, "CompilationUnit", &[k::POSITIONED, k::COMMENTABLE])
        .concrete_kind(k::CLASS_DECLARATION, "ClassDeclaration", &[k::NAMED_DECLARATION])
        .concrete_kind(k::METHOD_DECLARATION, "MethodDeclaration", &[k::NAMED_DECLARATION])
        .abstract_kind(k::STATEMENT, "Statement", &[k::POSITIONED])
        .concrete_kind(k::BLOCK, "Block", &[k::STATEMENT])
        .concrete_kind(k::RETURN, "Return", &[k::STATEMENT])
        .abstract_kind(k::EXPRESSION, "Expression", &[k::POSITIONED])
        .concrete_kind(k::IDENTIFIER, "Identifier", &[k::EXPRESSION, k::NAMED]);

    b.attr(a::PATH, k::POSITIONED, "path", AttrType::Str)
        .attr(a::LINE, k::POSITIONED, "line", AttrType::Int)
        .attr(a::COL, k::POSITIONED, "col", AttrType::Int)
        .attr(a::END_LINE, k::POSITIONED, "endLine", AttrType::Int)
        .attr(a::END_COL, k::POSITIONED, "endCol", AttrType::Int)
        .attr(a::NAME, k::NAMED, "name", AttrType::Str)
        .attr(a::ACCESSIBILITY, k::NAMED_DECLARATION, "accessibility", AttrType::Enum(ACCESSIBILITIES))
        .attr(a::TEXT, k::COMMENT, "text", AttrType::Str)
        .attr(a::IS_ABSTRACT, k::CLASS_DECLARATION, "isAbstract", AttrType::Bool)
        .attr(a::IS_FINAL, k::CLASS_DECLARATION, "isFinal", AttrType::Bool)
        .attr(a::IS_STATIC, k::METHOD_DECLARATION, "isStatic", AttrType::Bool);

    b.edge(e::HAS_COMMENT, k::COMMENTABLE, "hasComment", Multi, Reference, k::COMMENT)
        .edge(e::PACKAGE_HAS_SUB_PACKAGE, k::PACKAGE, "hasSubPackage", Multi, Containment, k::PACKAGE)
        .edge(e::PACKAGE_HAS_COMPILATION_UNIT, k::PACKAGE, "hasCompilationUnit", Multi, Containment, k::COMPILATION_UNIT)
        .edge(e::UNIT_TYPE_DECLARATION, k::COMPILATION_UNIT, "typeDeclaration", Multi, Containment, k::CLASS_DECLARATION)
        .edge(e::CLASS_HAS_MEMBER, k::CLASS_DECLARATION, "hasMember", Multi, Containment, k::MEMBER)
        .edge(e::CLASS_EXTENDS, k::CLASS_DECLARATION, "extends", Single, Reference, k::CLASS_DECLARATION)
        .edge(e::METHOD_HAS_BODY, k::METHOD_DECLARATION, "hasBody", Single, Containment, k::BLOCK)
        .edge(e::METHOD_OVERRIDES, k::METHOD_DECLARATION, "overrides", Multi, Reference, k::METHOD_DECLARATION)
        .edge(e::BLOCK_HAS_STATEMENT, k::BLOCK, "hasStatement", Multi, Containment, k::STATEMENT)
        .edge(e::RETURN_HAS_EXPRESSION, k::RETURN, "hasExpression", Single, Containment, k::EXPRESSION)
        .edge(e::IDENTIFIER_REFERS_TO, k::IDENTIFIER, "refersTo", Single, Reference, k::NAMED_DECLARATION);

    b.bind_named(k::NAMED, a::NAME).bind_positioned(PositionedRole {
        kind: k::POSITIONED,
        path: a::PATH,
        line: a::LINE,
        col: a::COL,
        end_line: a::END_LINE,
        end_col: a::END_COL,
    });

    b.build()
}

/// Shared instance of the catalogue.
pub fn schema() -> Arc<Schema> {
    static SCHEMA: OnceLock<Arc<Schema>> = OnceLock::new();
    SCHEMA
        .get_or_init(|| Arc::new(build().expect("java catalogue is well-formed")))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_linearisation() {
        let schema = schema();
        let layout = schema.layout(kind::METHOD_DECLARATION).unwrap();
        let names: Vec<_> = layout.ancestors.iter().map(|&k| schema.kind_name(k)).collect();
        assert_eq!(
            names,
            vec![
                "Base",
                "Commentable",
                "Positioned",
                "Member",
                "Named",
                "NamedDeclaration",
                "MethodDeclaration"
            ]
        );
        // hasComment comes from Commentable and appears exactly once.
        let comment_edges = layout.edges.iter().filter(|&&e| e == edge::HAS_COMMENT).count();
        assert_eq!(comment_edges, 1);
    }

    #[test]
    fn member_capability() {
        let schema = schema();
        assert!(schema.is_a(kind::METHOD_DECLARATION, kind::MEMBER));
        assert!(schema.is_a(kind::CLASS_DECLARATION, kind::COMMENTABLE));
        assert!(!schema.is_a(kind::BLOCK, kind::MEMBER));
        assert!(schema.is_special(kind::LINE_COMMENT));
    }
}
