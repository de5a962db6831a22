//! Template expressions.
//!
//! `{...}` bindings are parsed with oxc and lowered into [`Expr`], a small
//! tree covering the subset templates may use: identifiers, member access
//! (optional or not, literal computed keys only), literals, `!`, `&&`, `||`,
//! `??`, `?:` and `+`. Anything else is rejected at compile time.

use oxc_allocator::Allocator;
use oxc_ast::ast::{ChainElement, ComputedMemberExpression, Expression, StaticMemberExpression};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    /// Reference resolved against the component instance.
    Identifier { name: String },
    /// Reference to a loop item/index, iterator or slot-data local.
    Scoped { name: String },
    Member {
        object: Box<Expr>,
        property: MemberProperty,
        optional: bool,
    },
    Literal { value: Literal },
    Not { argument: Box<Expr> },
    Logical {
        operator: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Left-to-right `+` chain.
    Concat { parts: Vec<Expr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum MemberProperty {
    Name(String),
    Index(Literal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogicalOp {
    And,
    Or,
    Coalesce,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Coalesce => "??",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    /// Source is not a JavaScript expression.
    Syntax(String),
    /// Valid JavaScript outside the template subset.
    Disallowed(String),
}

impl Expr {
    pub fn identifier(name: &str) -> Self {
        Expr::Identifier {
            name: name.to_string(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal { .. })
    }

    /// Rewrites root identifiers that name a local in `scope` into `Scoped`.
    pub fn resolve(&self, scope: &[String]) -> Expr {
        match self {
            Expr::Identifier { name } if scope.iter().any(|local| local == name) => {
                Expr::Scoped { name: name.clone() }
            }
            Expr::Identifier { .. } | Expr::Scoped { .. } | Expr::Literal { .. } => self.clone(),
            Expr::Member {
                object,
                property,
                optional,
            } => Expr::Member {
                object: Box::new(object.resolve(scope)),
                property: property.clone(),
                optional: *optional,
            },
            Expr::Not { argument } => Expr::Not {
                argument: Box::new(argument.resolve(scope)),
            },
            Expr::Logical {
                operator,
                left,
                right,
            } => Expr::Logical {
                operator: *operator,
                left: Box::new(left.resolve(scope)),
                right: Box::new(right.resolve(scope)),
            },
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => Expr::Conditional {
                test: Box::new(test.resolve(scope)),
                consequent: Box::new(consequent.resolve(scope)),
                alternate: Box::new(alternate.resolve(scope)),
            },
            Expr::Concat { parts } => Expr::Concat {
                parts: parts.iter().map(|p| p.resolve(scope)).collect(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_expression(source: &str) -> Result<Expr, ExpressionError> {
    if source.trim().is_empty() {
        return Err(ExpressionError::Syntax("Empty expression".to_string()));
    }
    let allocator = Allocator::default();
    let source_type = SourceType::default();
    let parsed = Parser::new(&allocator, source, source_type).parse_expression();

    match parsed {
        Ok(expr) => lower(&expr),
        Err(errors) => {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            Err(ExpressionError::Syntax(message))
        }
    }
}

fn disallowed(what: &str) -> ExpressionError {
    ExpressionError::Disallowed(format!("{} is not allowed in template expressions", what))
}

fn lower(expr: &Expression<'_>) -> Result<Expr, ExpressionError> {
    match expr {
        Expression::Identifier(id) => Ok(Expr::Identifier {
            name: id.name.to_string(),
        }),
        Expression::StringLiteral(lit) => Ok(Expr::Literal {
            value: Literal::String(lit.value.to_string()),
        }),
        Expression::NumericLiteral(lit) => Ok(Expr::Literal {
            value: Literal::Number(lit.value),
        }),
        Expression::BooleanLiteral(lit) => Ok(Expr::Literal {
            value: Literal::Boolean(lit.value),
        }),
        Expression::NullLiteral(_) => Ok(Expr::Literal {
            value: Literal::Null,
        }),
        Expression::ParenthesizedExpression(paren) => lower(&paren.expression),
        Expression::StaticMemberExpression(member) => lower_static_member(member),
        Expression::ComputedMemberExpression(member) => lower_computed_member(member),
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::StaticMemberExpression(member) => lower_static_member(member),
            ChainElement::ComputedMemberExpression(member) => lower_computed_member(member),
            ChainElement::CallExpression(_) => Err(disallowed("Function call")),
            _ => Err(disallowed("This optional chain")),
        },
        Expression::UnaryExpression(unary) if unary.operator == UnaryOperator::LogicalNot => {
            Ok(Expr::Not {
                argument: Box::new(lower(&unary.argument)?),
            })
        }
        Expression::UnaryExpression(_) => Err(disallowed("Unary operator other than '!'")),
        Expression::LogicalExpression(logical) => {
            let operator = match logical.operator {
                LogicalOperator::And => LogicalOp::And,
                LogicalOperator::Or => LogicalOp::Or,
                LogicalOperator::Coalesce => LogicalOp::Coalesce,
            };
            Ok(Expr::Logical {
                operator,
                left: Box::new(lower(&logical.left)?),
                right: Box::new(lower(&logical.right)?),
            })
        }
        Expression::ConditionalExpression(cond) => Ok(Expr::Conditional {
            test: Box::new(lower(&cond.test)?),
            consequent: Box::new(lower(&cond.consequent)?),
            alternate: Box::new(lower(&cond.alternate)?),
        }),
        Expression::BinaryExpression(binary) if binary.operator == BinaryOperator::Addition => {
            let mut parts = match lower(&binary.left)? {
                Expr::Concat { parts } => parts,
                left => vec![left],
            };
            parts.push(lower(&binary.right)?);
            Ok(Expr::Concat { parts })
        }
        Expression::BinaryExpression(_) => Err(disallowed("Binary operator other than '+'")),
        Expression::CallExpression(_) | Expression::NewExpression(_) => {
            Err(disallowed("Function call"))
        }
        Expression::AssignmentExpression(_) | Expression::UpdateExpression(_) => {
            Err(disallowed("Assignment"))
        }
        Expression::TemplateLiteral(_) | Expression::TaggedTemplateExpression(_) => {
            Err(disallowed("Template literal"))
        }
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
            Err(disallowed("Function expression"))
        }
        Expression::ThisExpression(_) => Err(disallowed("'this'")),
        Expression::ArrayExpression(_) | Expression::ObjectExpression(_) => {
            Err(disallowed("Array or object literal"))
        }
        _ => Err(disallowed("This expression")),
    }
}

fn lower_static_member(member: &StaticMemberExpression<'_>) -> Result<Expr, ExpressionError> {
    Ok(Expr::Member {
        object: Box::new(lower(&member.object)?),
        property: MemberProperty::Name(member.property.name.to_string()),
        optional: member.optional,
    })
}

fn lower_computed_member(member: &ComputedMemberExpression<'_>) -> Result<Expr, ExpressionError> {
    let property = match &member.expression {
        Expression::NumericLiteral(lit) => MemberProperty::Index(Literal::Number(lit.value)),
        Expression::StringLiteral(lit) => {
            MemberProperty::Index(Literal::String(lit.value.to_string()))
        }
        _ => return Err(disallowed("Computed member access with a non-literal key")),
    };
    Ok(Expr::Member {
        object: Box::new(lower(&member.object)?),
        property,
        optional: member.optional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        assert_eq!(parse_expression("greeting"), Ok(Expr::identifier("greeting")));
    }

    #[test]
    fn test_parentheses_are_transparent() {
        assert_eq!(parse_expression("(greeting)"), Ok(Expr::identifier("greeting")));
    }

    #[test]
    fn test_resolve_scoped_roots_only() {
        let expr = parse_expression("item.item").unwrap();
        let resolved = expr.resolve(&["item".to_string()]);
        match resolved {
            Expr::Member {
                object, property, ..
            } => {
                assert_eq!(*object, Expr::Scoped { name: "item".to_string() });
                assert_eq!(property, MemberProperty::Name("item".to_string()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
