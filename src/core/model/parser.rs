//! INI-like model text
//!
//! ```text
//! [request_definition]
//! r = sub, obj, act
//!
//! [policy_definition]
//! p = sub, obj, act
//!
//! [role_definition]
//! g = _, _
//!
//! [policy_effect]
//! e = some(where (p.eft == allow))
//!
//! [matchers]
//! m = g(r.sub, p.sub) && r.obj == p.obj \
//!     && r.act == p.act
//! ```
//!
//! Lines starting with `#` or `;` are comments, a trailing `\` joins the
//! next line.

use crate::error::{Result, WardenError};

/// One `key = value` definition under a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Definition {
    pub section: &'static str,
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Map an INI section header to its short section name
pub(crate) fn section_name(header: &str) -> Option<&'static str> {
    match header {
        "request_definition" => Some("r"),
        "policy_definition" => Some("p"),
        "role_definition" => Some("g"),
        "policy_effect" => Some("e"),
        "matchers" => Some("m"),
        _ => None,
    }
}

/// Long header for a short section name
pub(crate) fn section_header(section: &str) -> Option<&'static str> {
    match section {
        "r" => Some("request_definition"),
        "p" => Some("policy_definition"),
        "g" => Some("role_definition"),
        "e" => Some("policy_effect"),
        "m" => Some("matchers"),
        _ => None,
    }
}

pub(crate) fn parse_model_text(text: &str) -> Result<Vec<Definition>> {
    let mut defs = Vec::new();
    let mut section: Option<&'static str> = None;
    let mut pending: Option<(String, usize)> = None;

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();

        let (line, start) = match pending.take() {
            Some((mut acc, start)) => {
                acc.push(' ');
                acc.push_str(line);
                (acc, start)
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                    continue;
                }
                (line.to_string(), line_no)
            }
        };

        if let Some(stripped) = line.strip_suffix('\\') {
            pending = Some((stripped.trim_end().to_string(), start));
            continue;
        }

        if line.starts_with('[') {
            let header = line
                .strip_prefix('[')
                .and_then(|l| l.strip_suffix(']'))
                .ok_or_else(|| WardenError::ModelParse {
                    line: start,
                    message: format!("malformed section header '{}'", line),
                })?;
            section = Some(section_name(header.trim()).ok_or_else(|| WardenError::ModelParse {
                line: start,
                message: format!("unknown section '{}'", header),
            })?);
            continue;
        }

        let Some(current) = section else {
            return Err(WardenError::ModelParse {
                line: start,
                message: "definition outside of any section".to_string(),
            });
        };

        let (key, value) = line.split_once('=').ok_or_else(|| WardenError::ModelParse {
            line: start,
            message: format!("expected 'key = value', got '{}'", line),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(WardenError::ModelParse {
                line: start,
                message: "empty key".to_string(),
            });
        }

        defs.push(Definition {
            section: current,
            key: key.to_string(),
            value: value.trim().to_string(),
            line: start,
        });
    }

    if let Some((_, start)) = pending {
        return Err(WardenError::ModelParse {
            line: start,
            message: "line continuation at end of input".to_string(),
        });
    }

    Ok(defs)
}
