use super::Visit;
use hcl::{
    template::{Directive, Element},
    Expression, Identifier, Operation, Template, Traversal, TraversalOperator,
};

/// Something an expression needs from its evaluation context
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    /// `root`, `root.attribute` or `root["attribute"]`
    Variable {
        root: String,
        attribute: Option<String>,
    },
    /// `name(arg, ...)`
    Function {
        name: String,
        arguments: usize,
        expand_final: bool,
    },
}

/// Recursively visit all [Reference]s
///
/// Names bound by `for` expressions and directives are local: references to them are not visited.
pub trait VisitReferences {
    fn visit_references(&self, visitor: &mut dyn Visit<Reference>);
}

impl VisitReferences for Expression {
    fn visit_references(&self, visitor: &mut dyn Visit<Reference>) {
        match self {
            Expression::Variable(variable) => visitor.visit(Reference::Variable {
                root: variable.as_str().to_string(),
                attribute: None,
            }),
            Expression::Traversal(traversal) => traversal.visit_references(visitor),
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_references(visitor);
                }
            }
            Expression::Object(object) => {
                for value in object.values() {
                    value.visit_references(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                // unparsable templates are reported by the evaluation itself
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_references(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                visitor.visit(Reference::Function {
                    name: func_call.name.to_string(),
                    arguments: func_call.args.len(),
                    expand_final: func_call.expand_final,
                });
                for arg in &func_call.args {
                    arg.visit_references(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_references(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_references(visitor);
                cond.true_expr.visit_references(visitor);
                cond.false_expr.visit_references(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_references(visitor);
                    binop.rhs_expr.visit_references(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_references(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_references(visitor);

                let bound = bound_names(forexpr.key_var.as_ref(), &forexpr.value_var);
                visit_scoped(&bound, visitor, |visitor| {
                    if let Some(key_expr) = &forexpr.key_expr {
                        key_expr.visit_references(visitor);
                    }
                    forexpr.value_expr.visit_references(visitor);
                    if let Some(cond_expr) = &forexpr.cond_expr {
                        cond_expr.visit_references(visitor);
                    }
                });
            }
            _ => {}
        }
    }
}

impl VisitReferences for Traversal {
    fn visit_references(&self, visitor: &mut dyn Visit<Reference>) {
        if let Expression::Variable(variable) = &self.expr {
            let attribute = match self.operators.first() {
                Some(TraversalOperator::GetAttr(ident)) => Some(ident.to_string()),
                Some(TraversalOperator::Index(Expression::String(key))) => Some(key.clone()),
                _ => None,
            };
            visitor.visit(Reference::Variable {
                root: variable.as_str().to_string(),
                attribute,
            });
        } else {
            self.expr.visit_references(visitor);
        }

        for operator in &self.operators {
            if let TraversalOperator::Index(expr) = operator {
                expr.visit_references(visitor);
            }
        }
    }
}

impl VisitReferences for Template {
    fn visit_references(&self, visitor: &mut dyn Visit<Reference>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_references(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_references(visitor);
                        ifdir.true_template.visit_references(visitor);
                        if let Some(false_template) = &ifdir.false_template {
                            false_template.visit_references(visitor);
                        }
                    }
                    Directive::For(fordir) => {
                        fordir.collection_expr.visit_references(visitor);

                        let bound = bound_names(fordir.key_var.as_ref(), &fordir.value_var);
                        visit_scoped(&bound, visitor, |visitor| {
                            fordir.template.visit_references(visitor);
                        });
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

fn bound_names(key_var: Option<&Identifier>, value_var: &Identifier) -> Vec<String> {
    key_var
        .into_iter()
        .chain([value_var])
        .map(|ident| ident.to_string())
        .collect()
}

/// Runs `walk` with a visitor that skips variables named in `bound`
fn visit_scoped(
    bound: &[String],
    visitor: &mut dyn Visit<Reference>,
    walk: impl FnOnce(&mut dyn Visit<Reference>),
) {
    let mut scoped = |reference: Reference| {
        let is_bound =
            matches!(&reference, Reference::Variable { root, .. } if bound.contains(root));
        if !is_bound {
            visitor.visit(reference);
        }
    };
    walk(&mut scoped);
}
