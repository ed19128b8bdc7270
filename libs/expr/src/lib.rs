mod ast;
mod env;
mod error;
mod eval;
mod parser;
mod value;

pub use ast::{Program, ProgramKind};
pub use env::{Env, LinkRecord, DEFAULT_STEP_BUDGET};
pub use error::{CompileError, EvalError};
pub use eval::{evaluate_predicate, evaluate_template};
pub use value::Value;

use ast::ProgramAst;

/// Compile a predicate or summary-template source string into a reusable
/// [`Program`]. Predicate programs are statically shape-checked: the root
/// expression must be one of the boolean-producing forms (`==`, `!=`,
/// `in`, `&&`, `||`, `!`, a boolean literal) so a rule author cannot write
/// a predicate that can only ever evaluate to a string or number.
pub fn compile(kind: ProgramKind, source: &str) -> Result<Program, CompileError> {
    let ast = match kind {
        ProgramKind::Predicate => {
            let expr = parser::parse_expr(source)?;
            if !is_boolean_shaped(&expr) {
                return Err(CompileError::NotBoolean);
            }
            ProgramAst::Predicate(expr)
        }
        ProgramKind::Template => ProgramAst::Template(parser::parse_template(source)?),
    };
    Ok(Program {
        kind,
        source: source.to_string(),
        ast,
    })
}

fn is_boolean_shaped(expr: &ast::Expr) -> bool {
    matches!(
        expr,
        ast::Expr::BoolLit(_)
            | ast::Expr::Eq(_, _)
            | ast::Expr::Ne(_, _)
            | ast::Expr::In(_, _)
            | ast::Expr::And(_, _)
            | ast::Expr::Or(_, _)
            | ast::Expr::Not(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_boolean_predicate() {
        let err = compile(ProgramKind::Predicate, "audit.verb").unwrap_err();
        assert_eq!(err, CompileError::NotBoolean);
    }

    #[test]
    fn accepts_boolean_predicate() {
        assert!(compile(ProgramKind::Predicate, r#"audit.verb == "create""#).is_ok());
    }

    #[test]
    fn template_does_not_require_boolean_shape() {
        assert!(compile(ProgramKind::Template, "{{ audit.verb }}").is_ok());
    }
}
