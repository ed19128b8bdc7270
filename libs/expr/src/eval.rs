use activity_models::ResourceRef;
use serde_json::Value as Json;

use crate::ast::{Expr, ProgramAst, TemplatePart};
use crate::env::{Env, LinkRecord};
use crate::error::EvalError;
use crate::value::Value;
use crate::Program;

fn step(env: &Env) -> Result<(), EvalError> {
    let mut steps = env.steps().borrow_mut();
    *steps += 1;
    if *steps > env.step_budget() {
        return Err(EvalError::StepBudgetExceeded {
            budget: env.step_budget(),
        });
    }
    Ok(())
}

fn eval_expr(expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    step(env)?;
    match expr {
        Expr::StringLit(s) => Ok(Value::String(s.clone())),
        Expr::NumberLit(n) => Ok(Value::Number(*n)),
        Expr::BoolLit(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => env
            .lookup(name)
            .map(Value::from_json)
            .ok_or_else(|| EvalError::UnknownBinding(name.clone())),
        Expr::Field(base, field) => {
            let base_value = eval_field_target(base, env)?;
            match base_value {
                Json::Object(map) => map.get(field).map(Value::from_json).ok_or_else(|| {
                    EvalError::NoSuchField {
                        on: describe(base),
                        field: field.clone(),
                    }
                }),
                Json::Null => Ok(Value::Null),
                other => Err(EvalError::NoSuchField {
                    on: describe_json(&other),
                    field: field.clone(),
                }),
            }
        }
        Expr::Call(name, args) => eval_call(name, args, env),
        Expr::In(needle, haystack) => {
            let needle = eval_expr(needle, env)?.as_str()?.to_string();
            let haystack = eval_expr(haystack, env)?;
            match haystack {
                Value::List(items) => Ok(Value::Bool(items.iter().any(|item| match item {
                    Value::String(s) => *s == needle,
                    _ => false,
                }))),
                other => Err(EvalError::TypeError {
                    expected: "list".to_string(),
                    found: format!("{other:?}"),
                }),
            }
        }
        Expr::Eq(a, b) => Ok(Value::Bool(eval_expr(a, env)? == eval_expr(b, env)?)),
        Expr::Ne(a, b) => Ok(Value::Bool(eval_expr(a, env)? != eval_expr(b, env)?)),
        Expr::And(a, b) => {
            let lhs = eval_expr(a, env)?.as_bool()?;
            if !lhs {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_expr(b, env)?.as_bool()?))
        }
        Expr::Or(a, b) => {
            let lhs = eval_expr(a, env)?.as_bool()?;
            if lhs {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_expr(b, env)?.as_bool()?))
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval_expr(inner, env)?.as_bool()?)),
        Expr::Concat(a, b) => {
            let lhs = eval_expr(a, env)?.stringify()?;
            let rhs = eval_expr(b, env)?.stringify()?;
            Ok(Value::String(lhs + &rhs))
        }
    }
}

/// Evaluate an expression used purely as a field-access target, returning
/// the raw JSON so nested `Field` lookups can keep descending into
/// objects the `Value` conversion would otherwise have flattened.
fn eval_field_target(expr: &Expr, env: &Env) -> Result<Json, EvalError> {
    step(env)?;
    match expr {
        Expr::Ident(name) => env
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownBinding(name.clone())),
        Expr::Field(base, field) => {
            let base_value = eval_field_target(base, env)?;
            match base_value {
                Json::Object(map) => Ok(map.get(field).cloned().unwrap_or(Json::Null)),
                Json::Null => Ok(Json::Null),
                other => Err(EvalError::NoSuchField {
                    on: describe_json(&other),
                    field: field.clone(),
                }),
            }
        }
        other => Ok(value_to_json(eval_expr(other, env)?)),
    }
}

fn value_to_json(value: Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(b),
        Value::String(s) => Json::String(s),
        Value::Number(n) => serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::List(items) => Json::Array(items.into_iter().map(value_to_json).collect()),
        Value::Object(json) => json,
        Value::Null => Json::Null,
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Field(base, field) => format!("{}.{}", describe(base), field),
        other => format!("{other:?}"),
    }
}

fn describe_json(json: &Json) -> String {
    match json {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "bool".to_string(),
        Json::Number(_) => "number".to_string(),
        Json::String(_) => "string".to_string(),
        Json::Array(_) => "array".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}

fn eval_call(name: &str, args: &[Expr], env: &Env) -> Result<Value, EvalError> {
    match name {
        "link" => {
            expect_arity(name, args, 2)?;
            let marker = eval_expr(&args[0], env)?.as_str()?.to_string();
            if marker.is_empty() {
                return Err(EvalError::EmptyLinkMarker);
            }
            let resource_json = eval_field_target(&args[1], env)?;
            let resource = extract_resource_ref(&resource_json)?;
            env.record_link(LinkRecord {
                marker: marker.clone(),
                resource,
            });
            Ok(Value::String(marker))
        }
        "startsWith" => {
            expect_arity(name, args, 2)?;
            let s = eval_expr(&args[0], env)?.as_str()?.to_string();
            let prefix = eval_expr(&args[1], env)?.as_str()?.to_string();
            Ok(Value::Bool(s.starts_with(&prefix)))
        }
        "contains" => {
            expect_arity(name, args, 2)?;
            let s = eval_expr(&args[0], env)?.as_str()?.to_string();
            let needle = eval_expr(&args[1], env)?.as_str()?.to_string();
            Ok(Value::Bool(s.contains(&needle)))
        }
        "lower" => {
            expect_arity(name, args, 1)?;
            let s = eval_expr(&args[0], env)?.as_str()?.to_string();
            Ok(Value::String(s.to_lowercase()))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn expect_arity(name: &str, args: &[Expr], expected: usize) -> Result<(), EvalError> {
    if args.len() != expected {
        return Err(EvalError::ArityMismatch {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Best-effort extraction of a `ResourceRef` from whatever JSON shape a
/// policy author points `link()`'s second argument at: a `objectRef`-style
/// object with flat `apiGroup`/`kind`/`name` fields, or a full Kubernetes
/// object with `apiVersion`/`kind`/`metadata.{name,namespace,uid}`.
fn extract_resource_ref(json: &Json) -> Result<ResourceRef, EvalError> {
    let obj = json.as_object().ok_or_else(|| EvalError::TypeError {
        expected: "object".to_string(),
        found: describe_json(json),
    })?;

    let str_field = |key: &str| obj.get(key).and_then(Json::as_str).map(str::to_string);

    let metadata = obj.get("metadata").and_then(Json::as_object);
    let meta_str = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Json::as_str)
            .map(str::to_string)
    };

    let (api_group, api_version) = match str_field("apiGroup") {
        Some(group) => (Some(group), str_field("apiVersion")),
        None => match str_field("apiVersion") {
            Some(version) => match version.split_once('/') {
                Some((group, _)) => (Some(group.to_string()), Some(version.clone())),
                None => (None, Some(version)),
            },
            None => (None, None),
        },
    };

    let kind = str_field("kind").ok_or_else(|| EvalError::NoSuchField {
        on: "link() resource".to_string(),
        field: "kind".to_string(),
    })?;
    let name = str_field("name")
        .or_else(|| meta_str("name"))
        .ok_or_else(|| EvalError::NoSuchField {
            on: "link() resource".to_string(),
            field: "name".to_string(),
        })?;
    let namespace = str_field("namespace").or_else(|| meta_str("namespace"));
    let uid = str_field("uid").or_else(|| meta_str("uid"));

    Ok(ResourceRef {
        api_group,
        api_version,
        kind,
        name,
        namespace,
        uid,
    })
}

pub fn evaluate_predicate(program: &Program, env: &Env) -> Result<bool, EvalError> {
    match &program.ast {
        ProgramAst::Predicate(expr) => eval_expr(expr, env)?.as_bool(),
        ProgramAst::Template(_) => Err(EvalError::TypeError {
            expected: "predicate".to_string(),
            found: "template".to_string(),
        }),
    }
}

pub fn evaluate_template(program: &Program, env: &Env) -> Result<String, EvalError> {
    match &program.ast {
        ProgramAst::Template(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(lit) => out.push_str(lit),
                    TemplatePart::Interp(expr) => out.push_str(&eval_expr(expr, env)?.stringify()?),
                }
            }
            Ok(out)
        }
        ProgramAst::Predicate(_) => Err(EvalError::TypeError {
            expected: "template".to_string(),
            found: "predicate".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use crate::ast::ProgramKind;

    fn audit_env() -> Env {
        Env::new().bind(
            "audit",
            serde_json::json!({
                "verb": "update",
                "objectRef": {"name": "api-gateway"},
                "responseObject": {
                    "apiVersion": "apps/v1",
                    "kind": "Deployment",
                    "metadata": {"name": "api-gateway", "namespace": "default"}
                },
                "user": {"groups": ["admin", "platform"]}
            }),
        )
    }

    #[test]
    fn evaluates_field_equality() {
        let program = compile(ProgramKind::Predicate, r#"audit.verb == "update""#).unwrap();
        assert!(evaluate_predicate(&program, &audit_env()).unwrap());
    }

    #[test]
    fn in_operator_checks_string_list_membership() {
        let program =
            compile(ProgramKind::Predicate, r#""admin" in audit.user.groups"#).unwrap();
        assert!(evaluate_predicate(&program, &audit_env()).unwrap());
    }

    #[test]
    fn link_records_resource_and_returns_marker() {
        let program = compile(
            ProgramKind::Template,
            "{{ link(audit.objectRef.name, audit.responseObject) }} updated",
        )
        .unwrap();
        let env = audit_env();
        let summary = evaluate_template(&program, &env).unwrap();
        assert_eq!(summary, "api-gateway updated");
        let links = env.into_links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].marker, "api-gateway");
        assert_eq!(links[0].resource.kind, "Deployment");
        assert_eq!(links[0].resource.api_group.as_deref(), Some("apps"));
        assert_eq!(links[0].resource.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn link_rejects_empty_marker() {
        let program = compile(
            ProgramKind::Template,
            r#"{{ link(lower(""), audit.responseObject) }}"#,
        )
        .unwrap();
        let err = evaluate_template(&program, &audit_env()).unwrap_err();
        assert_eq!(err, EvalError::EmptyLinkMarker);
    }

    #[test]
    fn unknown_binding_is_an_error() {
        let program = compile(ProgramKind::Predicate, "missing.field == \"x\"").unwrap();
        let err = evaluate_predicate(&program, &Env::new()).unwrap_err();
        assert_eq!(err, EvalError::UnknownBinding("missing".to_string()));
    }

    #[test]
    fn step_budget_is_enforced() {
        let program = compile(
            ProgramKind::Predicate,
            "a == a && a == a && a == a && a == a",
        )
        .unwrap();
        let env = Env::new()
            .bind("a", serde_json::json!(1))
            .with_step_budget(3);
        let err = evaluate_predicate(&program, &env).unwrap_err();
        assert_eq!(err, EvalError::StepBudgetExceeded { budget: 3 });
    }
}
