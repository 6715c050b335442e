//! `Template` — a bidirectional path pattern: parse a concrete path into
//! named fields, or solve a set of fields back into a concrete path.
//!
//! # Architecture
//!
//! Grounded field-for-field on
//! `original_source/FolderStructure/templates.py`, itself derived from
//! the Lucidity path-template library: a template's raw pattern contains
//! `{name}` (or `{name:pattern}`) placeholders; `parse` compiles an
//! anchored regex from it and matches a concrete path against that regex,
//! while `solve` walks the same raw pattern and substitutes supplied
//! values, validating each against its field's pattern.
//!
//! A placeholder name that repeats within one template (e.g. a shot
//! version baked into both a directory and a file name) is numbered
//! internally when building the regex (`version` -> `version1`,
//! `version2`, ...) so the underlying `regex` crate — which requires
//! unique capture-group names — can still express it. `parse` then
//! verifies every repeated occurrence captured the same text before
//! folding them back into one field; `solve` fills every occurrence from
//! the one value supplied for that field's name.
//!
//! A `{@other}` placeholder doesn't capture a field at all: it references
//! another template by name, and is replaced by that template's own
//! (recursively expanded) pattern text before the regex is built or the
//! path is solved. Both `parse` and `solve` therefore take the full
//! registered template set, not just this template's own pattern.
//!
//! # Invariants
//!
//! - A template with no placeholders is legal: it matches (and solves to)
//!   a single fixed path.
//! - `parse` never returns partial fields: either every placeholder's
//!   value is extracted and mutually consistent, or the call fails.
//! - `solve` never emits a path containing a literal `{`/`}`: every
//!   placeholder in the raw pattern is substituted or the call fails.
//! - A `{@other}` reference to an unregistered template, or a cycle of
//!   `{@...}` references, fails the call rather than recursing forever.

use std::collections::HashMap;

use regex::Regex;

use crate::pathengine::error::PathEngineError;
use crate::pathengine::token::{Token, DEFAULT_PATTERN};

/// Which end(s) of the path a template's regex must anchor to.
///
/// Mirrors the source's anchor bitfield: a template normally anchors at
/// both ends (`ANCHOR_BOTH`, the default), but a template meant to match
/// a path *prefix* (used for discovering which template a deeply nested
/// path belongs to) can relax to `ANCHOR_START` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor(u8);

impl Anchor {
    pub const NONE: Anchor = Anchor(0);
    pub const START: Anchor = Anchor(1 << 0);
    pub const END: Anchor = Anchor(1 << 1);
    pub const BOTH: Anchor = Anchor(Anchor::START.0 | Anchor::END.0);

    pub fn contains(self, other: Anchor) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::BOTH
    }
}

/// A bidirectional path pattern.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    pattern: String,
    anchor: Anchor,
}

struct Placeholder {
    full_match: (usize, usize),
    field: String,
    inline_pattern: Option<String>,
}

/// Finds every `{name}`/`{name:pattern}` placeholder in `pattern`.
///
/// An inline pattern may itself contain braces (e.g. a regex quantifier
/// like `{1,2}`), so the closing brace of a placeholder is found by
/// depth-counting rather than a naive search for the next `}` — the
/// first `}` inside `{version:v[0-9]{1,2}}` belongs to the quantifier,
/// not the placeholder.
fn find_placeholders(pattern: &str) -> Result<Vec<Placeholder>, String> {
    let chars: Vec<(usize, char)> = pattern.char_indices().collect();
    let mut placeholders = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].1 == '{' {
            let start = chars[i].0;
            let mut depth = 1;
            let mut j = i + 1;
            while j < chars.len() && depth > 0 {
                match chars[j].1 {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                j += 1;
            }
            if depth != 0 {
                return Err("unterminated placeholder (missing '}')".to_string());
            }
            let end = chars[j - 1].0;
            let inner = &pattern[start + 1..end];
            let (field, inline_pattern) = match inner.split_once(':') {
                Some((field, pat)) => (field.to_string(), Some(pat.to_string())),
                None => (inner.to_string(), None),
            };
            if field.is_empty() {
                return Err("placeholder name must not be empty".to_string());
            }
            placeholders.push(Placeholder {
                full_match: (start, end + 1),
                field,
                inline_pattern,
            });
            i = j;
        } else {
            i += 1;
        }
    }
    Ok(placeholders)
}

/// Inlines every `{@name}` reference in `pattern` with the (recursively
/// expanded) pattern text of the template named `name` registered in
/// `templates`, leaving ordinary `{field}`/`{field:pattern}` placeholders
/// untouched. `visiting` carries the chain of template names expanded so
/// far so a reference cycle is reported instead of recursing forever.
fn expand_template_references(
    template_name: &str,
    pattern: &str,
    templates: &HashMap<String, Template>,
    visiting: &mut Vec<String>,
) -> Result<String, PathEngineError> {
    if visiting.iter().any(|name| name == template_name) {
        let mut chain = visiting.clone();
        chain.push(template_name.to_string());
        return Err(PathEngineError::TemplateReferenceCycle { chain });
    }
    visiting.push(template_name.to_string());

    let placeholders = find_placeholders(pattern).map_err(|reason| PathEngineError::InvalidTemplatePattern {
        template: template_name.to_string(),
        reason,
    })?;

    let mut result = String::new();
    let mut cursor = 0;
    for p in &placeholders {
        result.push_str(&pattern[cursor..p.full_match.0]);
        match p.field.strip_prefix('@') {
            Some(referenced) => {
                let target = templates
                    .get(referenced)
                    .ok_or_else(|| PathEngineError::UnknownTemplate(referenced.to_string()))?;
                result.push_str(&expand_template_references(referenced, target.pattern(), templates, visiting)?);
            }
            None => {
                result.push_str(&pattern[p.full_match.0..p.full_match.1]);
            }
        }
        cursor = p.full_match.1;
    }
    result.push_str(&pattern[cursor..]);

    visiting.pop();
    Ok(result)
}

/// Per-field bookkeeping shared by `build_regex` and `solve`: the group
/// name(s) a field was numbered into, in order of appearance.
fn number_fields(placeholders: &[Placeholder]) -> HashMap<String, Vec<String>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for p in placeholders {
        *counts.entry(p.field.clone()).or_insert(0) += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for p in placeholders {
        let total = counts[&p.field];
        let group_name = if total > 1 {
            let n = seen.entry(p.field.clone()).or_insert(0);
            *n += 1;
            format!("{}{}", p.field, n)
        } else {
            p.field.clone()
        };
        groups.entry(p.field.clone()).or_default().push(group_name);
    }
    groups
}

impl Template {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            anchor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn build_regex(
        &self,
        tokens: &HashMap<String, Token>,
        templates: &HashMap<String, Template>,
    ) -> Result<(Regex, HashMap<String, Vec<String>>), PathEngineError> {
        let expanded = expand_template_references(&self.name, &self.pattern, templates, &mut Vec::new())?;
        let placeholders = find_placeholders(&expanded).map_err(|reason| PathEngineError::InvalidTemplatePattern {
            template: self.name.clone(),
            reason,
        })?;
        let groups = number_fields(&placeholders);

        let mut regex_source = String::new();
        let mut cursor = 0;
        let mut group_index_per_field: HashMap<String, usize> = HashMap::new();
        for p in &placeholders {
            regex_source.push_str(&regex::escape(&expanded[cursor..p.full_match.0]));
            let field_pattern = match &p.inline_pattern {
                Some(pat) => pat.clone(),
                None => tokens
                    .get(&p.field)
                    .map(|t| t.matching_pattern())
                    .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            };
            let idx = group_index_per_field.entry(p.field.clone()).or_insert(0);
            let group_name = groups[&p.field][*idx].clone();
            *idx += 1;
            regex_source.push_str(&format!("(?P<{group_name}>{field_pattern})"));
            cursor = p.full_match.1;
        }
        regex_source.push_str(&regex::escape(&expanded[cursor..]));

        if self.anchor.contains(Anchor::START) {
            regex_source.insert(0, '^');
        }
        if self.anchor.contains(Anchor::END) {
            regex_source.push('$');
        }

        let regex = Regex::new(&regex_source).map_err(|err| PathEngineError::InvalidTemplatePattern {
            template: self.name.clone(),
            reason: err.to_string(),
        })?;
        Ok((regex, groups))
    }

    /// Matches `path` against this template, returning one value per
    /// distinct field name. A field that appears multiple times in the
    /// pattern must capture the same text at every occurrence. Any
    /// `{@other}` reference in the pattern is expanded against `templates`
    /// first.
    pub fn parse(
        &self,
        path: &str,
        tokens: &HashMap<String, Token>,
        templates: &HashMap<String, Template>,
    ) -> Result<HashMap<String, String>, PathEngineError> {
        let (regex, groups) = self.build_regex(tokens, templates)?;
        let captures = regex.captures(path).ok_or_else(|| PathEngineError::NoMatch {
            template: self.name.clone(),
        })?;

        let mut fields = HashMap::new();
        for (field, group_names) in &groups {
            let mut value: Option<&str> = None;
            for group_name in group_names {
                let captured = captures.name(group_name).map(|m| m.as_str()).unwrap_or("");
                match value {
                    None => value = Some(captured),
                    Some(existing) if existing != captured => {
                        return Err(PathEngineError::FieldMismatch {
                            template: self.name.clone(),
                            field: field.clone(),
                            first: existing.to_string(),
                            second: captured.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
            let raw = value.unwrap_or_default();
            let decoded = match tokens.get(field) {
                Some(token) if token.has_options() => token.decode(raw).to_string(),
                _ => raw.to_string(),
            };
            fields.insert(field.clone(), decoded);
        }
        Ok(fields)
    }

    /// Builds a concrete path from `data`, validating each value against
    /// its field's pattern (inline override, else a registered token,
    /// else [`DEFAULT_PATTERN`]). Any `{@other}` reference in the pattern
    /// is expanded against `templates` first.
    pub fn solve(
        &self,
        data: &HashMap<String, String>,
        tokens: &HashMap<String, Token>,
        templates: &HashMap<String, Template>,
    ) -> Result<String, PathEngineError> {
        let expanded = expand_template_references(&self.name, &self.pattern, templates, &mut Vec::new())?;
        let placeholders = find_placeholders(&expanded).map_err(|reason| PathEngineError::InvalidTemplatePattern {
            template: self.name.clone(),
            reason,
        })?;

        let mut result = String::new();
        let mut cursor = 0;
        for p in &placeholders {
            result.push_str(&expanded[cursor..p.full_match.0]);
            let friendly_value = data.get(&p.field).ok_or_else(|| PathEngineError::MissingField {
                template: self.name.clone(),
                field: p.field.clone(),
            })?;
            let token = tokens.get(&p.field);
            let encoded = match token {
                Some(t) if p.inline_pattern.is_none() && t.has_options() => t.encode(friendly_value).to_string(),
                _ => friendly_value.clone(),
            };
            let field_pattern = match &p.inline_pattern {
                Some(pat) => pat.clone(),
                None => token.map(|t| t.matching_pattern()).unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            };
            let anchored = format!("^{field_pattern}$");
            let value_regex = Regex::new(&anchored).map_err(|err| PathEngineError::InvalidTemplatePattern {
                template: self.name.clone(),
                reason: err.to_string(),
            })?;
            if !value_regex.is_match(&encoded) {
                return Err(PathEngineError::ValueDoesNotMatchPattern {
                    template: self.name.clone(),
                    field: p.field.clone(),
                    value: friendly_value.clone(),
                });
            }
            result.push_str(&encoded);
            cursor = p.full_match.1;
        }
        result.push_str(&expanded[cursor..]);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> HashMap<String, Token> {
        let mut tokens = HashMap::new();
        tokens.insert("version".to_string(), Token::new("version", r"v\d+"));
        tokens
    }

    fn no_templates() -> HashMap<String, Template> {
        HashMap::new()
    }

    #[test]
    fn parse_extracts_simple_fields() {
        let template = Template::new("shot", "/proj/{project}/{shot}/{version}", Anchor::BOTH);
        let fields = template
            .parse("/proj/alpha/sh010/v003", &tokens(), &no_templates())
            .unwrap();
        assert_eq!(fields.get("project").unwrap(), "alpha");
        assert_eq!(fields.get("shot").unwrap(), "sh010");
        assert_eq!(fields.get("version").unwrap(), "v003");
    }

    #[test]
    fn parse_rejects_path_that_does_not_match() {
        let template = Template::new("shot", "/proj/{project}/{shot}/{version}", Anchor::BOTH);
        let result = template.parse("/proj/alpha/sh010", &tokens(), &no_templates());
        assert!(matches!(result, Err(PathEngineError::NoMatch { .. })));
    }

    #[test]
    fn repeated_field_must_match_consistently() {
        let template = Template::new(
            "publish",
            "/proj/{shot}/{version}/{shot}_{version}.ma",
            Anchor::BOTH,
        );
        let fields = template
            .parse("/proj/sh010/v003/sh010_v003.ma", &tokens(), &no_templates())
            .unwrap();
        assert_eq!(fields.get("shot").unwrap(), "sh010");
        assert_eq!(fields.get("version").unwrap(), "v003");
    }

    #[test]
    fn repeated_field_with_conflicting_values_is_rejected() {
        let template = Template::new(
            "publish",
            "/proj/{shot}/{version}/{shot}_{version}.ma",
            Anchor::BOTH,
        );
        let result = template.parse("/proj/sh010/v003/sh020_v003.ma", &tokens(), &no_templates());
        assert!(matches!(result, Err(PathEngineError::FieldMismatch { .. })));
    }

    #[test]
    fn solve_fills_every_occurrence_of_a_repeated_field() {
        let template = Template::new(
            "publish",
            "/proj/{shot}/{version}/{shot}_{version}.ma",
            Anchor::BOTH,
        );
        let mut data = HashMap::new();
        data.insert("shot".to_string(), "sh010".to_string());
        data.insert("version".to_string(), "v003".to_string());
        let path = template.solve(&data, &tokens(), &no_templates()).unwrap();
        assert_eq!(path, "/proj/sh010/v003/sh010_v003.ma");
    }

    #[test]
    fn solve_rejects_value_not_matching_token_pattern() {
        let template = Template::new("shot", "/proj/{shot}/{version}", Anchor::BOTH);
        let mut data = HashMap::new();
        data.insert("shot".to_string(), "sh010".to_string());
        data.insert("version".to_string(), "not-a-version".to_string());
        let result = template.solve(&data, &tokens(), &no_templates());
        assert!(matches!(result, Err(PathEngineError::ValueDoesNotMatchPattern { .. })));
    }

    #[test]
    fn solve_rejects_missing_field() {
        let template = Template::new("shot", "/proj/{shot}/{version}", Anchor::BOTH);
        let mut data = HashMap::new();
        data.insert("shot".to_string(), "sh010".to_string());
        let result = template.solve(&data, &tokens(), &no_templates());
        assert!(matches!(result, Err(PathEngineError::MissingField { .. })));
    }

    #[test]
    fn inline_pattern_overrides_registered_token() {
        let template = Template::new("shot", "/proj/{version:v[0-9]{1,2}}", Anchor::BOTH);
        let fields = template.parse("/proj/v12", &HashMap::new(), &no_templates()).unwrap();
        assert_eq!(fields.get("version").unwrap(), "v12");
    }

    #[test]
    fn option_token_solves_friendly_value_to_its_code() {
        let mut options = HashMap::new();
        options.insert("modeling".to_string(), "mdl".to_string());
        options.insert("rigging".to_string(), "rig".to_string());
        let mut tokens = HashMap::new();
        tokens.insert("step".to_string(), Token::with_options("step", options));

        let template = Template::new("step_path", "{root}/{project}/{step}", Anchor::BOTH);
        let mut data = HashMap::new();
        data.insert("root".to_string(), "Y:".to_string());
        data.insert("project".to_string(), "K".to_string());
        data.insert("step".to_string(), "modeling".to_string());
        let path = template.solve(&data, &tokens, &no_templates()).unwrap();
        assert_eq!(path, "Y:/K/mdl");
    }

    #[test]
    fn option_token_parses_code_back_to_friendly_value() {
        let mut options = HashMap::new();
        options.insert("modeling".to_string(), "mdl".to_string());
        options.insert("rigging".to_string(), "rig".to_string());
        let mut tokens = HashMap::new();
        tokens.insert("step".to_string(), Token::with_options("step", options));

        let template = Template::new("step_path", "{root}/{project}/{step}", Anchor::BOTH);
        let fields = template.parse("Y:/K/mdl", &tokens, &no_templates()).unwrap();
        assert_eq!(fields.get("root").unwrap(), "Y:");
        assert_eq!(fields.get("project").unwrap(), "K");
        assert_eq!(fields.get("step").unwrap(), "modeling");
    }

    #[test]
    fn template_reference_is_expanded_recursively_for_parse() {
        let mut templates = HashMap::new();
        templates.insert(
            "project_root".to_string(),
            Template::new("project_root", "/proj/{project}", Anchor::NONE),
        );
        let shot = Template::new("shot", "{@project_root}/{shot}/{version}", Anchor::BOTH);

        let fields = shot.parse("/proj/alpha/sh010/v003", &tokens(), &templates).unwrap();
        assert_eq!(fields.get("project").unwrap(), "alpha");
        assert_eq!(fields.get("shot").unwrap(), "sh010");
        assert_eq!(fields.get("version").unwrap(), "v003");
    }

    #[test]
    fn template_reference_is_expanded_recursively_for_solve() {
        let mut templates = HashMap::new();
        templates.insert(
            "project_root".to_string(),
            Template::new("project_root", "/proj/{project}", Anchor::NONE),
        );
        let shot = Template::new("shot", "{@project_root}/{shot}/{version}", Anchor::BOTH);

        let mut data = HashMap::new();
        data.insert("project".to_string(), "alpha".to_string());
        data.insert("shot".to_string(), "sh010".to_string());
        data.insert("version".to_string(), "v003".to_string());
        let path = shot.solve(&data, &tokens(), &templates).unwrap();
        assert_eq!(path, "/proj/alpha/sh010/v003");
    }

    #[test]
    fn nested_template_references_expand_transitively() {
        let mut templates = HashMap::new();
        templates.insert("root".to_string(), Template::new("root", "/proj", Anchor::NONE));
        templates.insert(
            "project_root".to_string(),
            Template::new("project_root", "{@root}/{project}", Anchor::NONE),
        );
        let shot = Template::new("shot", "{@project_root}/{shot}", Anchor::BOTH);

        let fields = shot.parse("/proj/alpha/sh010", &tokens(), &templates).unwrap();
        assert_eq!(fields.get("project").unwrap(), "alpha");
        assert_eq!(fields.get("shot").unwrap(), "sh010");
    }

    #[test]
    fn reference_to_unregistered_template_is_rejected() {
        let shot = Template::new("shot", "{@missing}/{shot}", Anchor::BOTH);
        let result = shot.parse("/proj/sh010", &tokens(), &no_templates());
        assert!(matches!(result, Err(PathEngineError::UnknownTemplate(_))));
    }

    #[test]
    fn template_reference_cycle_is_rejected_instead_of_recursing_forever() {
        let mut templates = HashMap::new();
        templates.insert("a".to_string(), Template::new("a", "{@b}/x", Anchor::NONE));
        templates.insert("b".to_string(), Template::new("b", "{@a}/y", Anchor::NONE));

        let result = templates["a"].parse("anything", &tokens(), &templates);
        assert!(matches!(result, Err(PathEngineError::TemplateReferenceCycle { .. })));
    }
}
