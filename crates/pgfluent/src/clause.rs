//! WHERE/HAVING predicate accumulation.
//!
//! A [`Conditions`] list holds predicates in insertion order. Each one is a
//! template with `?` placeholders plus its own arguments; `$n` numbering is
//! assigned later by the renderer so independently built clauses share one
//! counter.
//!
//! [`Filter`] exposes the WHERE-family methods on every builder that has a
//! WHERE clause (select, update, delete).

use crate::error::SqlResult;
use crate::validate::validate_field_expression;
use crate::value::{IntoArgs, Value};

/// One predicate fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// SQL with `?` placeholders.
    pub template: String,
    /// Arguments, one per placeholder.
    pub args: Vec<Value>,
    /// Joined to the previous condition with OR instead of AND.
    pub or: bool,
}

impl Condition {
    pub fn new(template: impl Into<String>, args: Vec<Value>, or: bool) -> Self {
        Self {
            template: template.into(),
            args,
            or,
        }
    }
}

/// An ordered list of conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    items: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, condition: Condition) {
        self.items.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.items.iter()
    }

    /// Total number of bound arguments across all conditions.
    pub fn arg_count(&self) -> usize {
        self.items.iter().map(|c| c.args.len()).sum()
    }

    pub(crate) fn and(&mut self, template: &str, args: Vec<Value>) {
        self.push(Condition::new(template, args, false));
    }

    pub(crate) fn or(&mut self, template: &str, args: Vec<Value>) {
        self.push(Condition::new(template, args, true));
    }

    pub(crate) fn list(&mut self, field: &str, op: &str, values: Vec<Value>) -> SqlResult<()> {
        validate_field_expression(field)?;
        // Empty lists are dropped rather than rendered as an always-false predicate.
        if values.is_empty() {
            return Ok(());
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.and(&format!("{} {} ({})", field.trim(), op, marks), values);
        Ok(())
    }

    pub(crate) fn range(&mut self, field: &str, op: &str, lo: Value, hi: Value) -> SqlResult<()> {
        validate_field_expression(field)?;
        self.and(&format!("{} {} ? AND ?", field.trim(), op), vec![lo, hi]);
        Ok(())
    }

    pub(crate) fn unary(&mut self, field: &str, suffix: &str) -> SqlResult<()> {
        validate_field_expression(field)?;
        self.and(&format!("{} {}", field.trim(), suffix), Vec::new());
        Ok(())
    }

    pub(crate) fn binary(&mut self, field: &str, op: &str, value: Value) -> SqlResult<()> {
        validate_field_expression(field)?;
        self.and(&format!("{} {} ?", field.trim(), op), vec![value]);
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// WHERE-clause methods shared by every builder that filters rows.
///
/// Template methods (`where_`, `or_where`) take caller SQL verbatim and are
/// infallible; methods that take a `field` validate it and return the
/// validation failure immediately.
pub trait Filter: Sized {
    #[doc(hidden)]
    fn conditions(&self) -> &Conditions;

    #[doc(hidden)]
    fn conditions_mut(&mut self) -> &mut Conditions;

    /// Add `template` joined with AND.
    fn where_(mut self, template: &str, args: impl IntoArgs) -> Self {
        self.conditions_mut().and(template, args.into_args());
        self
    }

    /// Add `template` joined with OR.
    fn or_where(mut self, template: &str, args: impl IntoArgs) -> Self {
        self.conditions_mut().or(template, args.into_args());
        self
    }

    /// Add `field = value`.
    fn where_eq(mut self, field: &str, value: impl Into<Value>) -> SqlResult<Self> {
        self.conditions_mut().binary(field, "=", value.into())?;
        Ok(self)
    }

    /// Add `field IN (...)`; an empty list adds nothing.
    fn where_in<T: Into<Value>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = T>,
    ) -> SqlResult<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions_mut().list(field, "IN", values)?;
        Ok(self)
    }

    /// Add `field NOT IN (...)`; an empty list adds nothing.
    fn where_not_in<T: Into<Value>>(
        mut self,
        field: &str,
        values: impl IntoIterator<Item = T>,
    ) -> SqlResult<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.conditions_mut().list(field, "NOT IN", values)?;
        Ok(self)
    }

    /// Add `field BETWEEN lo AND hi`.
    fn where_between(
        mut self,
        field: &str,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> SqlResult<Self> {
        self.conditions_mut()
            .range(field, "BETWEEN", lo.into(), hi.into())?;
        Ok(self)
    }

    /// Add `field NOT BETWEEN lo AND hi`.
    fn where_not_between(
        mut self,
        field: &str,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> SqlResult<Self> {
        self.conditions_mut()
            .range(field, "NOT BETWEEN", lo.into(), hi.into())?;
        Ok(self)
    }

    /// Add `field IS NULL`.
    fn where_null(mut self, field: &str) -> SqlResult<Self> {
        self.conditions_mut().unary(field, "IS NULL")?;
        Ok(self)
    }

    /// Add `field IS NOT NULL`.
    fn where_not_null(mut self, field: &str) -> SqlResult<Self> {
        self.conditions_mut().unary(field, "IS NOT NULL")?;
        Ok(self)
    }

    /// Add `field LIKE pattern`.
    fn where_like(mut self, field: &str, pattern: impl Into<Value>) -> SqlResult<Self> {
        self.conditions_mut().binary(field, "LIKE", pattern.into())?;
        Ok(self)
    }

    /// Add `field ILIKE pattern` (case-insensitive).
    fn where_ilike(mut self, field: &str, pattern: impl Into<Value>) -> SqlResult<Self> {
        self.conditions_mut().binary(field, "ILIKE", pattern.into())?;
        Ok(self)
    }

    /// Whether any WHERE condition has been added.
    fn has_conditions(&self) -> bool {
        !self.conditions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch(Conditions);

    impl Filter for Scratch {
        fn conditions(&self) -> &Conditions {
            &self.0
        }
        fn conditions_mut(&mut self) -> &mut Conditions {
            &mut self.0
        }
    }

    #[test]
    fn where_and_or_flags_follow_call_order() {
        let p = Scratch::default()
            .where_("a = ?", [1])
            .or_where("b = ?", [2])
            .where_("c = ?", [3]);
        let flags: Vec<bool> = p.0.iter().map(|c| c.or).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(p.0.arg_count(), 3);
    }

    #[test]
    fn empty_in_lists_are_dropped() {
        let p = Scratch::default()
            .where_in("id", Vec::<i64>::new())
            .unwrap()
            .where_not_in("id", Vec::<i64>::new())
            .unwrap();
        assert!(!p.has_conditions());
    }

    #[test]
    fn in_list_expands_one_token_per_value() {
        let p = Scratch::default().where_in("id", [1, 2, 3]).unwrap();
        let c = p.0.iter().next().unwrap();
        assert_eq!(c.template, "id IN (?, ?, ?)");
        assert_eq!(c.args.len(), 3);
    }

    #[test]
    fn fixed_shapes() {
        let p = Scratch::default()
            .where_between("age", 18, 65)
            .unwrap()
            .where_not_between("score", 0, 10)
            .unwrap()
            .where_null("deleted_at")
            .unwrap()
            .where_not_null("email")
            .unwrap()
            .where_like("name", "a%")
            .unwrap();
        let templates: Vec<&str> = p.0.iter().map(|c| c.template.as_str()).collect();
        assert_eq!(
            templates,
            vec![
                "age BETWEEN ? AND ?",
                "score NOT BETWEEN ? AND ?",
                "deleted_at IS NULL",
                "email IS NOT NULL",
                "name LIKE ?",
            ]
        );
    }

    #[test]
    fn field_methods_validate() {
        assert!(Scratch::default().where_null("id; DROP TABLE t").is_err());
        assert!(Scratch::default().where_in("x' OR 1=1", [1]).is_err());
        // validation also applies to empty lists
        assert!(Scratch::default().where_in("bad name;", Vec::<i32>::new()).is_err());
    }
}
