//! Variable substitution for step arguments and environment values.
//!
//! Gantry resolves substitution tokens at dispatch time, per step, never
//! at parse time.
//!
//! # Syntax
//!
//! - `${variable_name}` - replaced with the variable's value
//! - `$variable_name` - bare form, same resolution
//! - `$$` - escapes a literal `$` (so `$${FOO}` produces `${FOO}`)
//!
//! # Example
//!
//! ```yaml
//! args: [assemble, "-Pbranch=${BRANCH_NAME}"]
//! # With BRANCH_NAME=main, produces: assemble -Pbranch=main
//! ```

use crate::error::{GantryError, Result};
use std::collections::{HashMap, HashSet};

/// A segment of a templated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Variable reference: ${name} or $name
    Variable(String),
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse a string containing `${var}` / `$var` substitution tokens.
///
/// # Returns
///
/// Vec of segments representing the parsed string
pub fn parse_template(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = input.chars().peekable();
    let mut current_literal = String::new();

    while let Some(c) = chars.next() {
        if c != '$' {
            current_literal.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some('$') => {
                // Escaped: $$ becomes $
                chars.next();
                if chars.peek() == Some(&'{') {
                    // $${...} -> literal ${...}
                    chars.next();
                    current_literal.push('$');
                    current_literal.push('{');
                    while let Some(&c) = chars.peek() {
                        chars.next();
                        current_literal.push(c);
                        if c == '}' {
                            break;
                        }
                    }
                } else {
                    current_literal.push('$');
                }
            }
            Some('{') => {
                chars.next();

                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next();
                        break;
                    }
                    var_name.push(c);
                    chars.next();
                }

                segments.push(Segment::Variable(var_name));
            }
            Some(c) if is_ident_start(c) => {
                // Bare form: $NAME up to the first non-identifier char
                if !current_literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut current_literal)));
                }

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    var_name.push(c);
                    chars.next();
                }

                segments.push(Segment::Variable(var_name));
            }
            _ => {
                current_literal.push(c);
            }
        }
    }

    if !current_literal.is_empty() {
        segments.push(Segment::Literal(current_literal));
    }

    segments
}

/// Extract all unique variable names referenced by a templated string.
pub fn extract_variables(input: &str) -> HashSet<String> {
    parse_template(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Variable(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Check if a string contains any substitution token.
pub fn has_placeholders(input: &str) -> bool {
    parse_template(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Variable(_)))
}

/// Variable set a pipeline run resolves against.
///
/// Resolution order:
/// 1. User-supplied substitutions (highest priority)
/// 2. Built-in run identifiers (BRANCH_NAME, BUILD_ID, PROJECT_ID, ...)
///
/// The context is immutable once the run starts; data produced by steps
/// flows through shared volumes, not through variables.
#[derive(Debug)]
pub struct SubstitutionContext {
    /// Substitution values supplied externally (config + CLI flags)
    pub substitutions: HashMap<String, String>,

    /// Built-in run identifiers
    pub builtins: HashMap<String, String>,
}

impl SubstitutionContext {
    /// Create a new context with built-in variables.
    pub fn new() -> Self {
        let mut builtins = HashMap::new();
        builtins.insert(
            "GANTRY_VERSION".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );

        Self {
            substitutions: HashMap::new(),
            builtins,
        }
    }

    /// Add the per-run identifiers to the builtins.
    pub fn with_build(mut self, branch: &str, build_id: &str, project_id: &str) -> Self {
        self.builtins
            .insert("BRANCH_NAME".to_string(), branch.to_string());
        self.builtins
            .insert("BUILD_ID".to_string(), build_id.to_string());
        self.builtins
            .insert("PROJECT_ID".to_string(), project_id.to_string());
        self
    }

    /// Add user-supplied substitution values.
    pub fn with_substitutions(mut self, substitutions: HashMap<String, String>) -> Self {
        self.substitutions.extend(substitutions);
        self
    }

    /// Resolve a variable name to its value.
    ///
    /// Resolution order: substitutions > builtins
    pub fn resolve(&self, name: &str) -> Option<String> {
        self.substitutions
            .get(name)
            .or_else(|| self.builtins.get(name))
            .cloned()
    }
}

impl Default for SubstitutionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve all substitution tokens in a templated string.
///
/// # Errors
///
/// Returns `UnresolvedVariable` if any token is not found in the context.
pub fn resolve_string(input: &str, context: &SubstitutionContext) -> Result<String> {
    let segments = parse_template(input);
    let mut result = String::new();

    for segment in segments {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value = context
                    .resolve(&name)
                    .ok_or(GantryError::UnresolvedVariable { name })?;
                result.push_str(&value);
            }
        }
    }

    Ok(result)
}

/// Resolve with a fallback for missing variables.
///
/// Unlike `resolve_string`, this never fails - missing variables are
/// replaced with the provided default.
pub fn resolve_string_lossy(input: &str, context: &SubstitutionContext, default: &str) -> String {
    let segments = parse_template(input);
    let mut result = String::new();

    for segment in segments {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Variable(name) => {
                let value = context
                    .resolve(&name)
                    .unwrap_or_else(|| default.to_string());
                result.push_str(&value);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_literal_only() {
        let result = parse_template("gradle assemble");
        assert_eq!(result, vec![Segment::Literal("gradle assemble".to_string())]);
    }

    #[test]
    fn parse_braced_variable() {
        let result = parse_template("${BRANCH_NAME}");
        assert_eq!(result, vec![Segment::Variable("BRANCH_NAME".to_string())]);
    }

    #[test]
    fn parse_bare_variable() {
        let result = parse_template("$BUILD_ID");
        assert_eq!(result, vec![Segment::Variable("BUILD_ID".to_string())]);
    }

    #[test]
    fn parse_bare_variable_stops_at_non_identifier() {
        let result = parse_template("$BUCKET/artifacts");
        assert_eq!(
            result,
            vec![
                Segment::Variable("BUCKET".to_string()),
                Segment::Literal("/artifacts".to_string()),
            ]
        );
    }

    #[test]
    fn parse_variable_with_surrounding_text() {
        let result = parse_template("-Pbranch=${BRANCH_NAME}!");
        assert_eq!(
            result,
            vec![
                Segment::Literal("-Pbranch=".to_string()),
                Segment::Variable("BRANCH_NAME".to_string()),
                Segment::Literal("!".to_string()),
            ]
        );
    }

    #[test]
    fn parse_multiple_variables() {
        let result = parse_template("${A} and $B");
        assert_eq!(
            result,
            vec![
                Segment::Variable("A".to_string()),
                Segment::Literal(" and ".to_string()),
                Segment::Variable("B".to_string()),
            ]
        );
    }

    #[test]
    fn parse_escaped_dollar_brace() {
        let result = parse_template("$${NOT_SUBSTITUTED}");
        assert_eq!(
            result,
            vec![Segment::Literal("${NOT_SUBSTITUTED}".to_string())]
        );
    }

    #[test]
    fn parse_escaped_bare_form() {
        let result = parse_template("$$HOME");
        assert_eq!(result, vec![Segment::Literal("$HOME".to_string())]);
    }

    #[test]
    fn parse_dollar_before_non_identifier_is_literal() {
        let result = parse_template("price is $100");
        assert_eq!(result, vec![Segment::Literal("price is $100".to_string())]);
    }

    #[test]
    fn parse_underscore_prefixed_variable() {
        // User substitutions conventionally start with '_'
        let result = parse_template("${_BUCKET}");
        assert_eq!(result, vec![Segment::Variable("_BUCKET".to_string())]);

        let result = parse_template("$_BUCKET");
        assert_eq!(result, vec![Segment::Variable("_BUCKET".to_string())]);
    }

    #[test]
    fn parse_adjacent_variables() {
        let result = parse_template("${A}${B}");
        assert_eq!(
            result,
            vec![
                Segment::Variable("A".to_string()),
                Segment::Variable("B".to_string()),
            ]
        );
    }

    #[test]
    fn parse_empty_string() {
        assert!(parse_template("").is_empty());
    }

    #[test]
    fn extract_variables_returns_unique_names() {
        let vars = extract_variables("${A} $B ${A}");
        assert!(vars.contains("A"));
        assert!(vars.contains("B"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn has_placeholders_detects_both_forms() {
        assert!(has_placeholders("x ${VAR}"));
        assert!(has_placeholders("x $VAR"));
        assert!(!has_placeholders("no variables here"));
        assert!(!has_placeholders("$${escaped}"));
    }

    #[test]
    fn resolve_string_replaces_variables() {
        let mut ctx = SubstitutionContext::new();
        ctx.substitutions
            .insert("_BUCKET".to_string(), "gs://artifacts".to_string());

        let result = resolve_string("cp out ${_BUCKET}/app.apk", &ctx).unwrap();
        assert_eq!(result, "cp out gs://artifacts/app.apk");
    }

    #[test]
    fn resolve_string_prefers_substitutions_over_builtins() {
        let mut ctx = SubstitutionContext::new().with_build("main", "b-1", "demo");
        ctx.substitutions
            .insert("BRANCH_NAME".to_string(), "override".to_string());

        assert_eq!(resolve_string("${BRANCH_NAME}", &ctx).unwrap(), "override");

        ctx.substitutions.clear();
        assert_eq!(resolve_string("${BRANCH_NAME}", &ctx).unwrap(), "main");
    }

    #[test]
    fn resolve_string_fails_on_missing_variable() {
        let ctx = SubstitutionContext::new();
        let result = resolve_string("${MISSING}", &ctx);
        assert!(matches!(
            result,
            Err(GantryError::UnresolvedVariable { .. })
        ));
    }

    #[test]
    fn resolve_string_lossy_uses_default() {
        let ctx = SubstitutionContext::new();
        assert_eq!(resolve_string_lossy("${MISSING}", &ctx, ""), "");
        assert_eq!(resolve_string_lossy("${MISSING}", &ctx, "?"), "?");
    }

    #[test]
    fn resolve_preserves_escaped() {
        let ctx = SubstitutionContext::new();
        let result = resolve_string("$${KEEP}", &ctx).unwrap();
        assert_eq!(result, "${KEEP}");
    }

    #[test]
    fn context_includes_builtin_version() {
        let ctx = SubstitutionContext::new();
        assert!(ctx.builtins.contains_key("GANTRY_VERSION"));
    }

    #[test]
    fn with_build_seeds_run_identifiers() {
        let ctx = SubstitutionContext::new().with_build("release", "20260806-abc", "demo-app");

        assert_eq!(ctx.resolve("BRANCH_NAME").as_deref(), Some("release"));
        assert_eq!(ctx.resolve("BUILD_ID").as_deref(), Some("20260806-abc"));
        assert_eq!(ctx.resolve("PROJECT_ID").as_deref(), Some("demo-app"));
    }
}
