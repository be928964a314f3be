//! Python subset catalogue.

use std::sync::{Arc, OnceLock};

use crate::error::SchemaError;
use crate::schema::{AttrType, EdgeRole, EdgeShape, PositionedRole, Schema, SchemaBuilder};

pub const NAME: &str = "python";
pub const VERSION: u32 = 1;

pub mod kind {
    use crate::id::NodeKind;

    pub const BASE: NodeKind = NodeKind(0);
    pub const POSITIONED: NodeKind = NodeKind(1);
    pub const NAMED: NodeKind = NodeKind(2);
    pub const DOCSTRING: NodeKind = NodeKind(3);
    pub const PACKAGE: NodeKind = NodeKind(4);
    pub const MODULE: NodeKind = NodeKind(5);
    pub const OBJECT: NodeKind = NodeKind(6);
    pub const STATEMENT: NodeKind = NodeKind(7);
    pub const COMPOUND_STATEMENT: NodeKind = NodeKind(8);
    pub const SIMPLE_STATEMENT: NodeKind = NodeKind(9);
    pub const SUITE: NodeKind = NodeKind(10);
    pub const CLASS_DEF: NodeKind = NodeKind(11);
    pub const FUNCTION_DEF: NodeKind = NodeKind(12);
    pub const PARAMETER: NodeKind = NodeKind(13);
    pub const ASSIGN: NodeKind = NodeKind(14);
    pub const RETURN: NodeKind = NodeKind(15);
    pub const IF: NodeKind = NodeKind(16);
    pub const BASE_SPECIFIER: NodeKind = NodeKind(17);
    pub const EXPRESSION: NodeKind = NodeKind(18);
    pub const IDENTIFIER: NodeKind = NodeKind(19);
    pub const INTEGER_LITERAL: NodeKind = NodeKind(20);
    pub const STRING_LITERAL: NodeKind = NodeKind(21);
    pub const BINARY_ARITHMETIC: NodeKind = NodeKind(22);
    pub const CALL: NodeKind = NodeKind(23);
}

pub mod attr {
    use crate::id::AttrId;

    pub const PATH: AttrId = AttrId(0);
    pub const LINE: AttrId = AttrId(1);
    pub const COL: AttrId = AttrId(2);
    pub const END_LINE: AttrId = AttrId(3);
    pub const END_COL: AttrId = AttrId(4);
    pub const NAME: AttrId = AttrId(5);
    pub const DOCSTRING: AttrId = AttrId(6);
    pub const IS_GENERATOR: AttrId = AttrId(7);
    pub const IS_ASYNC: AttrId = AttrId(8);
    pub const PARAMETER_KIND: AttrId = AttrId(9);
    pub const INTEGER_VALUE: AttrId = AttrId(10);
    pub const STRING_VALUE: AttrId = AttrId(11);
    pub const ARITHMETIC_KIND: AttrId = AttrId(12);
}

pub mod edge {
    use crate::id::EdgeKind;

    pub const PACKAGE_HAS_MODULE: EdgeKind = EdgeKind(0);
    pub const PACKAGE_HAS_SUB_PACKAGE: EdgeKind = EdgeKind(1);
    pub const MODULE_HAS_STATEMENT: EdgeKind = EdgeKind(2);
    pub const MODULE_HAS_OBJECT: EdgeKind = EdgeKind(3);
    pub const OBJECT_REFERS_TO: EdgeKind = EdgeKind(4);
    pub const SUITE_HAS_STATEMENT: EdgeKind = EdgeKind(5);
    pub const CLASS_HAS_BASE: EdgeKind = EdgeKind(6);
    pub const CLASS_HAS_BODY: EdgeKind = EdgeKind(7);
    pub const FUNCTION_HAS_PARAMETER: EdgeKind = EdgeKind(8);
    pub const FUNCTION_HAS_BODY: EdgeKind = EdgeKind(9);
    pub const PARAMETER_HAS_DEFAULT: EdgeKind = EdgeKind(10);
    pub const ASSIGN_HAS_TARGET: EdgeKind = EdgeKind(11);
    pub const ASSIGN_HAS_EXPRESSION: EdgeKind = EdgeKind(12);
    pub const RETURN_HAS_EXPRESSION: EdgeKind = EdgeKind(13);
    pub const IF_HAS_TEST: EdgeKind = EdgeKind(14);
    pub const IF_HAS_BODY: EdgeKind = EdgeKind(15);
    pub const IF_HAS_ELSE: EdgeKind = EdgeKind(16);
    pub const BASE_SPECIFIER_HAS_NAME: EdgeKind = EdgeKind(17);
    pub const BASE_SPECIFIER_DERIVES_FROM: EdgeKind = EdgeKind(18);
    pub const IDENTIFIER_REFERS_TO: EdgeKind = EdgeKind(19);
    pub const ARITHMETIC_HAS_LEFT: EdgeKind = EdgeKind(20);
    pub const ARITHMETIC_HAS_RIGHT: EdgeKind = EdgeKind(21);
    pub const CALL_HAS_CALLEE: EdgeKind = EdgeKind(22);
    pub const CALL_HAS_ARGUMENT: EdgeKind = EdgeKind(23);
    pub const CALL_REFERS_TO: EdgeKind = EdgeKind(24);
}

pub const PARAMETER_KINDS: &[&str] = &["positional", "keyword", "varargs", "kwargs"];
pub const ARITHMETIC_KINDS: &[&str] = &["add", "sub", "mul", "div", "mod", "pow"];

/// Builds a fresh copy of the catalogue.
pub fn build() -> Result<Schema, SchemaError> {
    use self::attr as a;
    use self::edge as e;
    use self::kind as k;
    use EdgeRole::{Containment, Reference};
    use EdgeShape::{Multi, Single};

    let mut b = SchemaBuilder::new(NAME, VERSION);
    b.abstract_kind(k::BASE, "Base", &[])
        .abstract_kind(k::POSITIONED, "Positioned", &[k::BASE])
        .abstract_kind(k::NAMED, "Named", &[k::BASE])
        .abstract_kind(k::DOCSTRING, "Docstring", &[k::BASE])
        .concrete_kind(k::PACKAGE, "Package", &[k::NAMED])
        .concrete_kind(k::MODULE, "Module", &[k::NAMED, k::POSITIONED, k::DOCSTRING])
        .special_kind(k::OBJECT, "Object", &[k::NAMED])
        .abstract_kind(k::STATEMENT, "Statement", &[k::POSITIONED])
        .abstract_kind(k::COMPOUND_STATEMENT, "CompoundStatement", &[k::STATEMENT])
        .abstract_kind(k::SIMPLE_STATEMENT, "SimpleStatement", &[k::STATEMENT])
        .concrete_kind(k::SUITE, "Suite", &[k::POSITIONED])
        .concrete_kind(k::CLASS_DEF, "ClassDef", &[k::COMPOUND_STATEMENT, k::NAMED, k::DOCSTRING])
        .concrete_kind(k::FUNCTION_DEF, "FunctionDef", &[k::COMPOUND_STATEMENT, k::NAMED, k::DOCSTRING])
        .concrete_kind(k::PARAMETER, "Parameter", &[k::POSITIONED, k::NAMED])
        .concrete_kind(k::ASSIGN, "Assign", &[k::SIMPLE_STATEMENT])
        .concrete_kind(k::RETURN, "Return", &[k::SIMPLE_STATEMENT])
        .concrete_kind(k::IF, "If", &[k::COMPOUND_STATEMENT])
        .concrete_kind(k::BASE_SPECIFIER, "BaseSpecifier", &[k::POSITIONED])
        .abstract_kind(k::EXPRESSION, "Expression", &[k::POSITIONED])
        .concrete_kind(k::IDENTIFIER, "Identifier", &[k::EXPRESSION, k::NAMED])
        .concrete_kind(k::INTEGER_LITERAL, "IntegerLiteral", &[k::EXPRESSION])
        .concrete_kind(k::STRING_LITERAL, "StringLiteral", &[k::EXPRESSION])
        .concrete_kind(k::BINARY_ARITHMETIC, "BinaryArithmetic", &[k::EXPRESSION])
        .concrete_kind(k::CALL, "Call", &[k::EXPRESSION]);

    b.attr(a::PATH, k::POSITIONED, "path", AttrType::Str)
        .attr(a::LINE, k::POSITIONED, "line", AttrType::Int)
        .attr(a::COL, k::POSITIONED, "col", AttrType::Int)
        .attr(a::END_LINE, k::POSITIONED, "endLine", AttrType::Int)
        .attr(a::END_COL, k::POSITIONED, "endCol", AttrType::Int)
        .attr(a::NAME, k::NAMED, "name", AttrType::Str)
        .attr(a::DOCSTRING, k::DOCSTRING, "docstring", AttrType::Str)
        .attr(a::IS_GENERATOR, k::FUNCTION_DEF, "isGenerator", AttrType::Bool)
        .attr(a::IS_ASYNC, k::FUNCTION_DEF, "isAsync", AttrType::Bool)
        .attr(a::PARAMETER_KIND, k::PARAMETER, "kind", AttrType::Enum(PARAMETER_KINDS))
        .attr(a::INTEGER_VALUE, k::INTEGER_LITERAL, "value", AttrType::Int)
        .attr(a::STRING_VALUE, k::STRING_LITERAL, "value", AttrType::Str)
        .attr(a::ARITHMETIC_KIND, k::BINARY_ARITHMETIC, "kind", AttrType::Enum(ARITHMETIC_KINDS));

    b.edge(e::PACKAGE_HAS_MODULE, k::PACKAGE, "hasModule", Multi, Containment, k::MODULE)
        .edge(e::PACKAGE_HAS_SUB_PACKAGE, k::PACKAGE, "hasSubPackage", Multi, Containment, k::PACKAGE)
        .edge(e::MODULE_HAS_STATEMENT, k::MODULE, "hasStatement", Multi, Containment, k::STATEMENT)
        .edge(e::MODULE_HAS_OBJECT, k::MODULE, "hasObject", Multi, Reference, k::OBJECT)
        .edge(e::OBJECT_REFERS_TO, k::OBJECT, "refersTo", Multi, Reference, k::POSITIONED)
        .edge(e::SUITE_HAS_STATEMENT, k::SUITE, "hasStatement", Multi, Containment, k::STATEMENT)
        .edge(e::CLASS_HAS_BASE, k::CLASS_DEF, "hasBase", Multi, Containment, k::BASE_SPECIFIER)
        .edge(e::CLASS_HAS_BODY, k::CLASS_DEF, "hasBody", Single, Containment, k::SUITE)
        .edge(e::FUNCTION_HAS_PARAMETER, k::FUNCTION_DEF, "hasParameter", Multi, Containment, k::PARAMETER)
        .edge(e::FUNCTION_HAS_BODY, k::FUNCTION_DEF, "hasBody", Single, Containment, k::SUITE)
        .edge(e::PARAMETER_HAS_DEFAULT, k::PARAMETER, "hasDefault", Single, Containment, k::EXPRESSION)
        .edge(e::ASSIGN_HAS_TARGET, k::ASSIGN, "hasTarget", Multi, Containment, k::EXPRESSION)
        .edge(e::ASSIGN_HAS_EXPRESSION, k::ASSIGN, "hasExpression", Single, Containment, k::EXPRESSION)
        .edge(e::RETURN_HAS_EXPRESSION, k::RETURN, "hasExpression", Single, Containment, k::EXPRESSION)
        .edge(e::IF_HAS_TEST, k::IF, "hasTest", Single, Containment, k::EXPRESSION)
        .edge(e::IF_HAS_BODY, k::IF, "hasBody", Single, Containment, k::SUITE)
        .edge(e::IF_HAS_ELSE, k::IF, "hasElse", Single, Containment, k::SUITE)
        .edge(e::BASE_SPECIFIER_HAS_NAME, k::BASE_SPECIFIER, "hasName", Single, Containment, k::EXPRESSION)
        .edge(e::BASE_SPECIFIER_DERIVES_FROM, k::BASE_SPECIFIER, "derivesFrom", Single, Reference, k::CLASS_DEF)
        .edge(e::IDENTIFIER_REFERS_TO, k::IDENTIFIER, "refersTo", Single, Reference, k::OBJECT)
        .edge(e::ARITHMETIC_HAS_LEFT, k::BINARY_ARITHMETIC, "hasLeftExpression", Single, Containment, k::EXPRESSION)
        .edge(e::ARITHMETIC_HAS_RIGHT, k::BINARY_ARITHMETIC, "hasRightExpression", Single, Containment, k::EXPRESSION)
        .edge(e::CALL_HAS_CALLEE, k::CALL, "hasCallee", Single, Containment, k::EXPRESSION)
        .edge(e::CALL_HAS_ARGUMENT, k::CALL, "hasArgument", Multi, Containment, k::EXPRESSION)
        .edge(e::CALL_REFERS_TO, k::CALL, "refersTo", Single, Reference, k::FUNCTION_DEF);

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
        .get_or_init(|| Arc::new(build().expect("python catalogue is well-formed")))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_builds() {
        let schema = build().unwrap();
        assert_eq!(schema.kind_count(), 24);
        assert_eq!(schema.edge_count(), 25);
    }

    #[test]
    fn identifier_is_an_expression() {
        let schema = schema();
        assert!(schema.is_a(kind::IDENTIFIER, kind::EXPRESSION));
        assert!(schema.is_a(kind::IDENTIFIER, kind::NAMED));
        assert!(!schema.is_a(kind::ASSIGN, kind::EXPRESSION));
    }

    #[test]
    fn function_layout_is_base_first() {
        let schema = schema();
        let layout = schema.layout(kind::FUNCTION_DEF).unwrap();
        let names: Vec<_> = layout.ancestors.iter().map(|&k| schema.kind_name(k)).collect();
        assert_eq!(
            names,
            vec![
                "Base",
                "Positioned",
                "Statement",
                "CompoundStatement",
                "Named",
                "Docstring",
                "FunctionDef"
            ]
        );
        assert_eq!(layout.attrs.first(), Some(&attr::PATH));
        assert_eq!(layout.attrs.last(), Some(&attr::IS_ASYNC));
    }

    #[test]
    fn object_is_special() {
        let schema = schema();
        assert!(schema.is_special(kind::OBJECT));
        assert!(!schema.is_special(kind::MODULE));
    }
}
