//! SQL rendering with positional parameters.
//!
//! Builders feed fragments into a [`Renderer`] in clause order. Every `?` in a
//! condition template becomes the next `$n` marker, and the matching argument
//! is appended to the output list, so numbering stays monotonic across SET,
//! WHERE and HAVING no matter how the clauses were accumulated.
//!
//! `?` inside quoted text is left alone: `'...'` literals, `E'...'` escape
//! strings, `"..."` identifiers and `$tag$...$tag$` bodies. PostgreSQL's jsonb
//! `?` operators therefore cannot be written in a template; use
//! `jsonb_exists(col, ?)` instead.

use crate::clause::Conditions;
use crate::error::{SqlError, SqlResult};
use crate::value::Value;
use std::fmt::Write;

/// A rendered statement: SQL text and arguments in marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Append the dialect's marker for the `n`th (1-based) parameter.
///
/// This is the only place that knows about `$n`.
pub fn write_placeholder(out: &mut String, n: usize) {
    let _ = write!(out, "${n}");
}

/// Count `?` tokens outside quoted sections.
pub fn count_placeholders(template: &str) -> usize {
    let mut count = 0;
    scan_template(template, |piece| {
        if let Piece::Token = piece {
            count += 1;
        }
    });
    count
}

enum Piece<'a> {
    Text(&'a str),
    Token,
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// If a quoted section starts at byte `i`, the index just past its end.
///
/// Handles `'...'` (with `''` doubling), `E'...'` backslash escapes,
/// `"..."` identifiers and `$tag$...$tag$` bodies. An unterminated section
/// runs to the end of the text.
fn quoted_end(text: &str, i: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    match bytes[i] {
        b'\'' => {
            let escapes = i > 0
                && matches!(bytes[i - 1], b'E' | b'e')
                && (i < 2 || !is_word_byte(bytes[i - 2]));
            let mut j = i + 1;
            while j < bytes.len() {
                match bytes[j] {
                    b'\\' if escapes => j += 2,
                    b'\'' => return Some(j + 1),
                    _ => j += 1,
                }
            }
            Some(bytes.len())
        }
        b'"' => Some(text[i + 1..].find('"').map_or(bytes.len(), |p| i + p + 2)),
        b'$' => {
            let close = text[i + 1..].find('$')?;
            let tag = &text[i + 1..i + 1 + close];
            let valid = tag.bytes().all(is_word_byte)
                && !tag.bytes().next().is_some_and(|b| b.is_ascii_digit());
            if !valid {
                return None;
            }
            let delimiter = &text[i..i + close + 2];
            let body = i + delimiter.len();
            Some(
                text[body..]
                    .find(delimiter)
                    .map_or(bytes.len(), |p| body + p + delimiter.len()),
            )
        }
        _ => None,
    }
}

fn scan_template<'a>(template: &'a str, mut f: impl FnMut(Piece<'a>)) {
    let bytes = template.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'?' {
            if start < i {
                f(Piece::Text(&template[start..i]));
            }
            f(Piece::Token);
            i += 1;
            start = i;
            continue;
        }
        i = quoted_end(template, i).unwrap_or(i + 1);
    }
    if start < template.len() {
        f(Piece::Text(&template[start..]));
    }
}

/// True when `template` has an `OR` outside parentheses and quotes.
fn has_top_level_or(template: &str) -> bool {
    let bytes = template.as_bytes();
    let mut depth = 0i32;
    let mut word: Option<usize> = None;
    let mut i = 0;
    while i <= bytes.len() {
        let b = bytes.get(i).copied();
        if let Some(b) = b
            && is_word_byte(b)
        {
            word.get_or_insert(i);
            i += 1;
            continue;
        }
        if let Some(w) = word.take()
            && depth == 0
            && template[w..i].eq_ignore_ascii_case("or")
        {
            return true;
        }
        match b {
            Some(b'(') => depth += 1,
            Some(b')') => depth -= 1,
            Some(_) => {
                if let Some(end) = quoted_end(template, i) {
                    i = end;
                    continue;
                }
            }
            None => {}
        }
        i += 1;
    }
    false
}

/// Incremental SQL writer that owns the parameter counter.
#[derive(Debug, Default)]
pub(crate) struct Renderer {
    sql: String,
    args: Vec<Value>,
}

impl Renderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    /// Bind one argument at the current position.
    pub(crate) fn bind(&mut self, value: Value) {
        self.args.push(value);
        write_placeholder(&mut self.sql, self.args.len());
    }

    /// Append a template, numbering its `?` tokens from the current counter.
    pub(crate) fn template(&mut self, template: &str, args: &[Value]) -> SqlResult<()> {
        let placeholders = count_placeholders(template);
        if placeholders != args.len() {
            return Err(SqlError::ArgumentCountMismatch {
                template: template.to_string(),
                placeholders,
                args: args.len(),
            });
        }

        let mut next = args.iter();
        scan_template(template, |piece| match piece {
            Piece::Text(text) => self.sql.push_str(text),
            Piece::Token => {
                if let Some(value) = next.next() {
                    self.bind(value.clone());
                }
            }
        });
        Ok(())
    }

    /// Append ` KEYWORD cond1 AND cond2 OR cond3 ...`; nothing when empty.
    pub(crate) fn conditions(&mut self, keyword: &str, conditions: &Conditions) -> SqlResult<()> {
        if conditions.is_empty() {
            return Ok(());
        }
        self.push(" ");
        self.push(keyword);
        self.push(" ");

        let many = conditions.len() > 1;
        for (i, cond) in conditions.iter().enumerate() {
            if i > 0 {
                self.push(if cond.or { " OR " } else { " AND " });
            }
            let wrap = many && has_top_level_or(&cond.template);
            if wrap {
                self.push("(");
            }
            self.template(&cond.template, &cond.args)?;
            if wrap {
                self.push(")");
            }
        }
        Ok(())
    }

    pub(crate) fn finish(self) -> Rendered {
        Rendered {
            sql: self.sql,
            args: self.args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::Condition;

    fn conds(items: &[(&str, Vec<Value>, bool)]) -> Conditions {
        let mut c = Conditions::new();
        for (t, a, or) in items {
            c.push(Condition::new(*t, a.clone(), *or));
        }
        c
    }

    #[test]
    fn counter_continues_across_clauses() {
        let where_ = conds(&[
            ("a = ?", vec![Value::Int(1)], false),
            ("b = ?", vec![Value::Int(2)], false),
        ]);
        let having = conds(&[("COUNT(*) > ?", vec![Value::Int(3)], false)]);

        let mut r = Renderer::new();
        r.push("SELECT * FROM t");
        r.conditions("WHERE", &where_).unwrap();
        r.push(" GROUP BY a");
        r.conditions("HAVING", &having).unwrap();
        let out = r.finish();

        assert_eq!(
            out.sql,
            "SELECT * FROM t WHERE a = $1 AND b = $2 GROUP BY a HAVING COUNT(*) > $3"
        );
        assert_eq!(out.args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn first_or_flag_is_ignored() {
        let c = conds(&[
            ("a = ?", vec![Value::Int(1)], true),
            ("b = ?", vec![Value::Int(2)], true),
        ]);
        let mut r = Renderer::new();
        r.conditions("WHERE", &c).unwrap();
        assert_eq!(r.finish().sql, " WHERE a = $1 OR b = $2");
    }

    #[test]
    fn quoted_question_marks_are_literal() {
        assert_eq!(count_placeholders("note = 'why?' AND id = ?"), 1);
        assert_eq!(count_placeholders(r#""odd?col" = ?"#), 1);

        let mut r = Renderer::new();
        r.template("note = 'why?' AND id = ?", &[Value::Int(9)]).unwrap();
        assert_eq!(r.finish().sql, "note = 'why?' AND id = $1");
    }

    #[test]
    fn escape_strings_and_dollar_quotes_are_literal() {
        assert_eq!(count_placeholders(r"note = E'it\'s ?' AND id = ?"), 1);
        assert_eq!(count_placeholders("body = $$ why ? $$ AND id = ?"), 1);
        assert_eq!(count_placeholders("body = $fn$ a ? $ b $fn$ || ?"), 1);
        assert_eq!(count_placeholders("a = 'x''?' AND b = ?"), 1);

        let mut r = Renderer::new();
        r.template("body = $$ ? $$ AND id = ?", &[Value::Int(4)]).unwrap();
        assert_eq!(r.finish().sql, "body = $$ ? $$ AND id = $1");

        assert!(!has_top_level_or("note = 'a OR b'"));
        assert!(!has_top_level_or("note = $$ a OR b $$"));
    }

    #[test]
    fn mismatched_argument_count_fails() {
        let mut r = Renderer::new();
        let err = r.template("a = ? AND b = ?", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            SqlError::ArgumentCountMismatch {
                placeholders: 2,
                args: 1,
                ..
            }
        ));
    }

    #[test]
    fn or_templates_are_grouped_when_combined() {
        let c = conds(&[
            ("a = ? OR b = ?", vec![Value::Int(1), Value::Int(2)], false),
            ("c = ?", vec![Value::Int(3)], false),
        ]);
        let mut r = Renderer::new();
        r.conditions("WHERE", &c).unwrap();
        assert_eq!(r.finish().sql, " WHERE (a = $1 OR b = $2) AND c = $3");

        assert!(!has_top_level_or("color = ?"));
        assert!(!has_top_level_or("coalesce(a OR b)"));
        assert!(has_top_level_or("a OR b"));
    }

    #[test]
    fn placeholders_use_dollar_markers() {
        let mut s = String::new();
        write_placeholder(&mut s, 12);
        assert_eq!(s, "$12");
    }
}
