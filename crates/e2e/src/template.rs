//! Placeholder templates for fixture files
//!
//! A template is plain text with `{{.Name}}` placeholders. Whitespace
//! inside the braces is allowed (`{{ .Name }}`) and `{{/* ... */}}` is a
//! comment that renders to nothing. Rendering is strict: a placeholder
//! naming a parameter that is not defined is an error.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("line {line}: unclosed action")]
    Unclosed { line: usize },

    #[error("line {line}: malformed placeholder '{text}'")]
    Malformed { line: usize, text: String },

    #[error("line {line}: no parameter named '{name}'")]
    Undefined { line: usize, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, line: usize },
}

/// A parsed template, ready to render against any parameter map
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = text;
        let mut line = 1;

        while let Some(open) = rest.find("{{") {
            let (literal, after_open) = rest.split_at(open);
            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }
            line += literal.matches('\n').count();

            let body_start = &after_open[2..];
            let close = body_start
                .find("}}")
                .ok_or(TemplateError::Unclosed { line })?;
            let raw = &body_start[..close];
            let action = raw.trim();

            if !(action.starts_with("/*") && action.ends_with("*/")) {
                let name = action
                    .strip_prefix('.')
                    .filter(|name| is_identifier(name))
                    .ok_or_else(|| TemplateError::Malformed {
                        line,
                        text: format!("{{{{{}}}}}", raw),
                    })?;
                segments.push(Segment::Placeholder {
                    name: name.to_string(),
                    line,
                });
            }

            line += raw.matches('\n').count();
            rest = &body_start[close + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn render(&self, params: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { name, line } => {
                    let value = params.get(name).ok_or_else(|| TemplateError::Undefined {
                        line: *line,
                        name: name.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("DbVersion".to_string(), "8.0.29".to_string()),
            ("DbPathVer".to_string(), "8_0_29".to_string()),
        ])
    }

    #[test]
    fn test_render_placeholders() {
        let tmpl = Template::parse("deploy {{.DbVersion}} into msb_{{ .DbPathVer }}\n").unwrap();
        assert_eq!(
            tmpl.render(&params()).unwrap(),
            "deploy 8.0.29 into msb_8_0_29\n"
        );
    }

    #[test]
    fn test_text_without_actions_is_unchanged() {
        let text = "exec true\n# a comment with { braces }\n";
        let tmpl = Template::parse(text).unwrap();
        assert_eq!(tmpl.render(&BTreeMap::new()).unwrap(), text);
    }

    #[test]
    fn test_comment_renders_to_nothing() {
        let tmpl = Template::parse("a{{/* note */}}b").unwrap();
        assert_eq!(tmpl.render(&params()).unwrap(), "ab");
    }

    #[test]
    fn test_undefined_parameter_is_an_error() {
        let tmpl = Template::parse("line one\nuses {{.Missing}}\n").unwrap();
        let err = tmpl.render(&params()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::Undefined {
                line: 2,
                name: "Missing".to_string()
            }
        );
    }

    #[test]
    fn test_unclosed_action() {
        let err = Template::parse("ok\n{{.DbVersion").unwrap_err();
        assert_eq!(err, TemplateError::Unclosed { line: 2 });
    }

    #[test]
    fn test_malformed_placeholder() {
        let err = Template::parse("{{DbVersion}}").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { line: 1, .. }));

        let err = Template::parse("{{.Db Version}}").unwrap_err();
        assert!(matches!(err, TemplateError::Malformed { .. }));
    }
}
