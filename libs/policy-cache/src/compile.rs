use activity_expr::{compile as compile_expr, Program, ProgramKind};
use activity_models::{ActivityPolicy, RuleSource};
use sha2::{Digest, Sha256};

use crate::status::{CompileCause, RuleList};

/// One translation rule with both its predicate and template already
/// parsed into reusable [`Program`]s.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub match_program: Program,
    pub summary_program: Program,
}

/// A fully-compiled policy: every rule in both lists compiled
/// successfully, or this value is never constructed.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub policy_name: String,
    pub policy_version: String,
    pub audit_rules: Vec<CompiledRule>,
    pub event_rules: Vec<CompiledRule>,
}

/// Content hash of the canonical rule source, used as `policyVersion` for
/// bus-level dedup and newest-wins conflict resolution.
pub fn policy_version(policy: &ActivityPolicy) -> String {
    let mut hasher = Sha256::new();
    for rule in &policy.audit_rules {
        hasher.update(rule.match_expr.as_bytes());
        hasher.update(b"\0");
        hasher.update(rule.summary.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(b"--events--");
    for rule in &policy.event_rules {
        hasher.update(rule.match_expr.as_bytes());
        hasher.update(b"\0");
        hasher.update(rule.summary.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

fn compile_rule(source: &RuleSource) -> Result<CompiledRule, String> {
    let match_program = compile_expr(ProgramKind::Predicate, &source.match_expr)
        .map_err(|e| format!("match: {e}"))?;
    let summary_program =
        compile_expr(ProgramKind::Template, &source.summary).map_err(|e| format!("summary: {e}"))?;
    Ok(CompiledRule {
        match_program,
        summary_program,
    })
}

/// Compile every rule in both lists. Returns every offending rule's cause
/// rather than stopping at the first failure, so `Upsert` can report a
/// complete `NotReady` cause list in one pass.
pub fn compile_policy(policy: &ActivityPolicy) -> Result<CompiledPolicy, Vec<CompileCause>> {
    let mut causes = Vec::new();
    let mut audit_rules = Vec::with_capacity(policy.audit_rules.len());
    for (index, rule) in policy.audit_rules.iter().enumerate() {
        match compile_rule(rule) {
            Ok(compiled) => audit_rules.push(compiled),
            Err(detail) => causes.push(CompileCause {
                list: RuleList::Audit,
                rule_index: index,
                detail,
            }),
        }
    }
    let mut event_rules = Vec::with_capacity(policy.event_rules.len());
    for (index, rule) in policy.event_rules.iter().enumerate() {
        match compile_rule(rule) {
            Ok(compiled) => event_rules.push(compiled),
            Err(detail) => causes.push(CompileCause {
                list: RuleList::Event,
                rule_index: index,
                detail,
            }),
        }
    }

    if !causes.is_empty() {
        return Err(causes);
    }

    Ok(CompiledPolicy {
        policy_name: policy.name.clone(),
        policy_version: policy_version(policy),
        audit_rules,
        event_rules,
    })
}
