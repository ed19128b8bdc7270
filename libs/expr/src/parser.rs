use crate::ast::{Expr, TemplatePart, MAX_EXPR_DEPTH};
use crate::error::CompileError;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_until},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of},
    combinator::{all_consuming, cut, map, opt, recognize, value},
    multi::{many0, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

type PResult<'a, O> = IResult<&'a str, O, nom::error::VerboseError<&'a str>>;

fn ws(input: &str) -> PResult<'_, ()> {
    map(multispace0, |_| ())(input)
}

fn identifier(input: &str) -> PResult<'_, String> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            nom::multi::many0_count(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| s.to_string(),
    )(input)
}

fn string_lit(input: &str) -> PResult<'_, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\"\\"),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('\n', char('n')),
                    value('\t', char('t')),
                )),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char('"'),
    )(input)
}

fn number_lit(input: &str) -> PResult<'_, f64> {
    double(input)
}

fn bool_lit(input: &str) -> PResult<'_, bool> {
    alt((value(true, tag("true")), value(false, tag("false"))))(input)
}

fn field_path(input: &str) -> PResult<'_, Expr> {
    let (input, head) = identifier(input)?;
    let (input, tail) = many0(preceded(tuple((ws, char('.'), ws)), identifier))(input)?;
    let mut expr = Expr::Ident(head);
    for field in tail {
        expr = Expr::Field(Box::new(expr), field);
    }
    Ok((input, expr))
}

fn call_expr(input: &str) -> PResult<'_, Expr> {
    let (input, name) = identifier(input)?;
    let (input, _) = tuple((ws, char('(')))(input)?;
    let (input, args) = separated_list0(tuple((ws, char(','), ws)), or_expr)(input)?;
    let (input, _) = tuple((ws, char(')')))(input)?;
    Ok((input, Expr::Call(name, args)))
}

fn primary(input: &str) -> PResult<'_, Expr> {
    alt((
        delimited(
            tuple((char('('), ws)),
            or_expr,
            cut(tuple((ws, char(')')))),
        ),
        map(bool_lit, Expr::BoolLit),
        call_expr,
        field_path,
        map(number_lit, Expr::NumberLit),
        map(string_lit, Expr::StringLit),
    ))(input)
}

fn add_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = primary(input)?;
    let (input, rest) = many0(preceded(tuple((ws, char('+'), ws)), primary))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, next| Expr::Concat(Box::new(acc), Box::new(next))),
    ))
}

fn compare_expr(input: &str) -> PResult<'_, Expr> {
    let (input, lhs) = add_expr(input)?;
    let (input, op) = opt(preceded(
        ws,
        alt((tag("=="), tag("!="), tag("in"))),
    ))(input)?;
    match op {
        Some("==") => {
            let (input, rhs) = preceded(ws, cut(add_expr))(input)?;
            Ok((input, Expr::Eq(Box::new(lhs), Box::new(rhs))))
        }
        Some("!=") => {
            let (input, rhs) = preceded(ws, cut(add_expr))(input)?;
            Ok((input, Expr::Ne(Box::new(lhs), Box::new(rhs))))
        }
        Some("in") => {
            let (input, rhs) = preceded(ws, cut(add_expr))(input)?;
            Ok((input, Expr::In(Box::new(lhs), Box::new(rhs))))
        }
        _ => Ok((input, lhs)),
    }
}

fn not_expr(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(pair(char('!'), ws), not_expr), |e| {
            Expr::Not(Box::new(e))
        }),
        compare_expr,
    ))(input)
}

fn and_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(tuple((ws, tag("&&"), ws)), not_expr))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, next| Expr::And(Box::new(acc), Box::new(next))),
    ))
}

fn or_expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(tuple((ws, tag("||"), ws)), and_expr))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, next| Expr::Or(Box::new(acc), Box::new(next))),
    ))
}

fn full_expr(input: &str) -> PResult<'_, Expr> {
    delimited(ws, or_expr, ws)(input)
}

fn check_depth(expr: &Expr) -> Result<(), CompileError> {
    if expr.depth() > MAX_EXPR_DEPTH {
        return Err(CompileError::TooDeep {
            max_depth: MAX_EXPR_DEPTH,
        });
    }
    Ok(())
}

fn into_compile_error(input: &str, err: nom::Err<nom::error::VerboseError<&str>>) -> CompileError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = e
                .errors
                .first()
                .map(|(rest, _)| input.len() - rest.len())
                .unwrap_or(0);
            CompileError::Syntax {
                offset,
                detail: nom::error::convert_error(input, e),
            }
        }
        nom::Err::Incomplete(_) => CompileError::Syntax {
            offset: input.len(),
            detail: "incomplete expression".to_string(),
        },
    }
}

/// Parse a full predicate or template-interpolation expression, e.g.
/// `audit.verb == "create"`.
pub fn parse_expr(input: &str) -> Result<Expr, CompileError> {
    match all_consuming(full_expr)(input) {
        Ok((_, expr)) => {
            check_depth(&expr)?;
            Ok(expr)
        }
        Err(e) => Err(into_compile_error(input, e)),
    }
}

/// Parse a `summary` template: literal text interspersed with `{{ expr }}`
/// interpolations.
pub fn parse_template(input: &str) -> Result<Vec<TemplatePart>, CompileError> {
    let mut parts = Vec::new();
    let mut rest = input;
    loop {
        if rest.is_empty() {
            break;
        }
        match take_until::<_, _, nom::error::VerboseError<&str>>("{{")(rest) {
            Ok((after, literal)) => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(literal.to_string()));
                }
                let (after, _) = tag::<_, _, nom::error::VerboseError<&str>>("{{")(after)
                    .map_err(|e| into_compile_error(rest, e))?;
                let (after, expr_src) = take_until::<_, _, nom::error::VerboseError<&str>>("}}")(
                    after,
                )
                .map_err(|e| into_compile_error(rest, e))?;
                let (after, _) = tag::<_, _, nom::error::VerboseError<&str>>("}}")(after)
                    .map_err(|e| into_compile_error(rest, e))?;
                let expr = parse_expr(expr_src)?;
                parts.push(TemplatePart::Interp(expr));
                rest = after;
            }
            Err(_) => {
                parts.push(TemplatePart::Literal(rest.to_string()));
                rest = "";
            }
        }
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_equality() {
        let expr = parse_expr(r#"audit.verb == "create""#).unwrap();
        assert_eq!(
            expr,
            Expr::Eq(
                Box::new(Expr::Field(Box::new(Expr::Ident("audit".into())), "verb".into())),
                Box::new(Expr::StringLit("create".into()))
            )
        );
    }

    #[test]
    fn parses_and_or_precedence() {
        let expr = parse_expr(r#"a == "x" && b == "y" || c == "z""#).unwrap();
        // && binds tighter than ||
        match expr {
            Expr::Or(lhs, _) => assert!(matches!(*lhs, Expr::And(_, _))),
            other => panic!("expected Or at top level, got {other:?}"),
        }
    }

    #[test]
    fn parses_call_with_nested_field_access() {
        let expr = parse_expr(r#"link(audit.objectRef.name, audit.responseObject)"#).unwrap();
        match expr {
            Expr::Call(name, args) => {
                assert_eq!(name, "link");
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn parses_in_operator() {
        let expr = parse_expr(r#""admin" in audit.user.groups"#).unwrap();
        assert!(matches!(expr, Expr::In(_, _)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(parse_expr(r#"audit.verb == "create" )"#).is_err());
    }

    #[test]
    fn template_splits_literal_and_interpolation() {
        let parts = parse_template("{{ actor }} created {{ audit.objectRef.name }}").unwrap();
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0], TemplatePart::Interp(_)));
        assert_eq!(parts[1], TemplatePart::Literal(" created ".to_string()));
        assert!(matches!(parts[2], TemplatePart::Interp(_)));
    }

    #[test]
    fn template_with_no_interpolation_is_one_literal() {
        let parts = parse_template("plain text").unwrap();
        assert_eq!(parts, vec![TemplatePart::Literal("plain text".to_string())]);
    }
}
