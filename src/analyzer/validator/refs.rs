use super::{expect_color, is_top_level, BodyRule, ElementValidator, HeaderRules, NameRule, Validator};
use crate::analyzer::utils::{endpoint_parts, relationship_op};
use crate::ast::{ElementKind, NodeId, SyntaxNodeKind, SyntaxTree};
use crate::error::CompileErrorCode;

pub(crate) struct RefValidator;

const REF_HEADER: HeaderRules = HeaderRules::new(NameRule::Optional, BodyRule::Any).dotted();

pub(crate) const REF_SETTINGS: [&str; 3] = ["delete", "update", "color"];

pub(crate) const REF_ACTIONS: [&str; 5] =
    ["cascade", "restrict", "set null", "set default", "no action"];

impl ElementValidator for RefValidator {
    fn validate(&self, v: &mut Validator<'_>, element: NodeId, parent: Option<ElementKind>) {
        v.check_context(
            is_top_level(parent),
            CompileErrorCode::InvalidRefContext,
            "A Ref must appear at the top level or inside a Project",
            element,
        );
        v.check_header(element, ElementKind::Ref, REF_HEADER);

        let Some(body) = v.tree.element(element).and_then(|d| d.body) else {
            return;
        };
        let relationship = match v.tree.kind(body).clone() {
            SyntaxNodeKind::BlockExpression { body: statements, .. } => {
                if statements.len() != 1 {
                    v.error(
                        CompileErrorCode::InvalidRefField,
                        "A Ref block must contain exactly one relationship",
                        body,
                    );
                    return;
                }
                statements[0]
            }
            _ => body,
        };
        validate_relationship(v, relationship);
    }
}

/// `a.x > b.y [delete: cascade]`
fn validate_relationship(v: &mut Validator<'_>, statement: NodeId) {
    if v.tree.element(statement).is_some() {
        v.error(
            CompileErrorCode::InvalidRefField,
            "Expect a relationship such as 'a.id < b.a_id'",
            statement,
        );
        return;
    }
    let (callee, args) = v.tree.statement_parts(statement);
    let args = args.to_vec();

    let SyntaxNodeKind::InfixExpression { op, left, right } = v.tree.kind(callee).clone() else {
        v.error(
            CompileErrorCode::InvalidRefField,
            "Expect a relationship such as 'a.id < b.a_id'",
            callee,
        );
        return;
    };
    if relationship_op(v.tree, op).is_none() {
        v.error(
            CompileErrorCode::InvalidRefField,
            "A relationship operator must be one of '<', '>', '-' or '<>'",
            callee,
        );
        return;
    }

    let mut arity = Vec::new();
    for endpoint in [left, right] {
        match endpoint_parts(v.tree, endpoint) {
            Some((_, columns)) => arity.push(columns.len()),
            None => v.error(
                CompileErrorCode::InvalidRefField,
                "A ref endpoint must be 'table.column', 'schema.table.column' or 'table.(c1, c2)'",
                endpoint,
            ),
        }
    }
    if arity.len() == 2 && arity[0] != arity[1] {
        v.error(
            CompileErrorCode::UnequalFieldsBinaryRef,
            "Both endpoints of a ref must list the same number of columns",
            callee,
        );
    }

    let list = args.first().copied();
    if args.len() > 1
        || list.is_some_and(|l| !matches!(v.tree.kind(l), SyntaxNodeKind::ListExpression { .. }))
    {
        v.error(
            CompileErrorCode::InvalidRefField,
            "A relationship can only be followed by a setting list",
            statement,
        );
        return;
    }
    v.check_settings(
        list,
        "ref",
        &REF_SETTINGS,
        &[],
        check_ref_setting,
    );
}

fn check_ref_setting(tree: &SyntaxTree, name: &str, value: Option<NodeId>) -> Option<String> {
    if name == "color" {
        return expect_color(tree, name, value);
    }
    let action = value.and_then(|v| {
        tree.identifier_stream_text(v)
            .or_else(|| tree.variable_name(v).map(|n| n.to_ascii_lowercase()))
    });
    match action {
        Some(a) if REF_ACTIONS.contains(&a.as_str()) => None,
        _ => Some(format!(
            "'{}' must be one of cascade, restrict, set null, set default or no action",
            name
        )),
    }
}
