//! Filter operators and the operator registry.
//!
//! A filter key names its operator after the last `__`:
//!
//! ```text
//! created_at__gte
//! ─────┬──── ─┬─
//!      │      └── operator suffix
//!      └── field path
//! ```
//!
//! Keys with no `__`, or with a suffix no operator answers to, fall back to
//! equality on the whole key.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{QfilterError, QfilterResult};

/// Separates the field path from the operator suffix.
pub const DELIMITER: &str = "__";

/// One `where` predicate, without its leading `and`, plus the value to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub value: Value,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, value: Value) -> Self {
        Self {
            sql: sql.into(),
            value,
        }
    }
}

/// Builds a predicate for one filter key.
///
/// `column` is the already rendered field (quoted or not, per options),
/// `bind` is the bind-parameter name without its `:` and `value` is the
/// caller's value for the key.
pub trait Operator: Send + Sync {
    fn build(&self, column: &str, bind: &str, value: &Value) -> QfilterResult<Predicate>;
}

impl<F> Operator for F
where
    F: Fn(&str, &str, &Value) -> QfilterResult<Predicate> + Send + Sync,
{
    fn build(&self, column: &str, bind: &str, value: &Value) -> QfilterResult<Predicate> {
        self(column, bind, value)
    }
}

/// A filter key split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterKey<'a> {
    /// The full key, also used as the bind name.
    pub key: &'a str,
    /// Field path with the operator suffix removed.
    pub field: &'a str,
    /// Text after the last delimiter, if any.
    pub suffix: Option<&'a str>,
}

impl<'a> FilterKey<'a> {
    pub fn parse(key: &'a str) -> Self {
        match key.rsplit_once(DELIMITER) {
            Some((field, suffix)) => Self {
                key,
                field,
                suffix: Some(suffix),
            },
            None => Self {
                key,
                field: key,
                suffix: None,
            },
        }
    }
}

/// String form of a bind value, as used by pattern operators.
///
/// `null` renders as the empty string.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How an operator rewrites the bind value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueTransform {
    /// Bind the value as given.
    #[default]
    None,
    /// `abc` → `abc%`
    Starts,
    /// `abc` → `%abc`
    Ends,
    /// `abc` → `%abc%`
    Contains,
    /// `a,b` → `["a", "b"]`
    Split,
}

impl ValueTransform {
    pub fn apply(self, value: &Value) -> Value {
        match self {
            ValueTransform::None => value.clone(),
            ValueTransform::Starts => Value::String(format!("{}%", value_text(value))),
            ValueTransform::Ends => Value::String(format!("%{}", value_text(value))),
            ValueTransform::Contains => Value::String(format!("%{}%", value_text(value))),
            ValueTransform::Split => Value::Array(
                value_text(value)
                    .split(',')
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
        }
    }
}

static BUILTINS: [Builtin; 13] = Builtin::ALL;

/// The operators every translation knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Not,
    Any,
    Starts,
    IStarts,
    Ends,
    IEnds,
    Cont,
    ICont,
}

impl Builtin {
    pub const ALL: [Builtin; 13] = [
        Builtin::Eq,
        Builtin::Gt,
        Builtin::Gte,
        Builtin::Lt,
        Builtin::Lte,
        Builtin::Not,
        Builtin::Any,
        Builtin::Starts,
        Builtin::IStarts,
        Builtin::Ends,
        Builtin::IEnds,
        Builtin::Cont,
        Builtin::ICont,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Eq => "eq",
            Builtin::Gt => "gt",
            Builtin::Gte => "gte",
            Builtin::Lt => "lt",
            Builtin::Lte => "lte",
            Builtin::Not => "not",
            Builtin::Any => "any",
            Builtin::Starts => "starts",
            Builtin::IStarts => "istarts",
            Builtin::Ends => "ends",
            Builtin::IEnds => "iends",
            Builtin::Cont => "cont",
            Builtin::ICont => "icont",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// This operator as a `'static` trait object.
    pub fn as_operator(self) -> &'static dyn Operator {
        &BUILTINS[self as usize]
    }

    fn comparison(self) -> &'static str {
        match self {
            Builtin::Eq => "=",
            Builtin::Gt => ">",
            Builtin::Gte => ">=",
            Builtin::Lt => "<",
            Builtin::Lte => "<=",
            Builtin::Not => "<>",
            Builtin::Any => "in",
            _ => "like",
        }
    }

    pub fn transform(self) -> ValueTransform {
        match self {
            Builtin::Any => ValueTransform::Split,
            Builtin::Starts | Builtin::IStarts => ValueTransform::Starts,
            Builtin::Ends | Builtin::IEnds => ValueTransform::Ends,
            Builtin::Cont | Builtin::ICont => ValueTransform::Contains,
            _ => ValueTransform::None,
        }
    }

    fn case_insensitive(self) -> bool {
        matches!(self, Builtin::IStarts | Builtin::IEnds | Builtin::ICont)
    }

    /// The predicate shape with placeholder names, for listings.
    pub fn shape(self) -> String {
        self.render("field", "key")
    }

    fn render(self, column: &str, bind: &str) -> String {
        if self.case_insensitive() {
            format!("upper({}) {} upper(:{})", column, self.comparison(), bind)
        } else {
            format!("{} {} :{}", column, self.comparison(), bind)
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Operator for Builtin {
    fn build(&self, column: &str, bind: &str, value: &Value) -> QfilterResult<Predicate> {
        Ok(Predicate::new(
            self.render(column, bind),
            self.transform().apply(value),
        ))
    }
}

/// An operator described by a SQL template.
///
/// `{column}` expands to the rendered field and `{bind}` to the
/// placeholder (`:key`).
///
/// ```
/// use qfilter::operators::{Operator, TemplateOperator, ValueTransform};
/// use serde_json::json;
///
/// let ne = TemplateOperator::new("{column} != {bind}", ValueTransform::None);
/// let p = ne.build("\"age\"", "age__ne", &json!(3)).unwrap();
/// assert_eq!(p.sql, "\"age\" != :age__ne");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateOperator {
    pub template: String,
    #[serde(default)]
    pub transform: ValueTransform,
}

impl TemplateOperator {
    pub fn new(template: impl Into<String>, transform: ValueTransform) -> Self {
        Self {
            template: template.into(),
            transform,
        }
    }
}

impl Operator for TemplateOperator {
    fn build(&self, column: &str, bind: &str, value: &Value) -> QfilterResult<Predicate> {
        let sql = self
            .template
            .replace("{column}", column)
            .replace("{bind}", &format!(":{}", bind));
        Ok(Predicate::new(sql, self.transform.apply(value)))
    }
}

/// Check that a name can appear as an operator suffix.
pub fn validate_name(name: &str) -> QfilterResult<()> {
    let usable = !name.is_empty()
        && !name.contains(DELIMITER)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if usable {
        Ok(())
    } else {
        Err(QfilterError::InvalidOperator(name.to_string()))
    }
}

/// Where a resolved operator came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSource {
    Custom,
    Builtin,
}

impl fmt::Display for OperatorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorSource::Custom => f.write_str("custom"),
            OperatorSource::Builtin => f.write_str("built-in"),
        }
    }
}

/// Custom operators by name. Entries shadow built-ins of the same name.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    ops: BTreeMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an operator.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        op: impl Operator + 'static,
    ) -> QfilterResult<&mut Self> {
        let name = name.into();
        validate_name(&name)?;
        self.ops.insert(name, Arc::new(op));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Find the operator for a suffix: a registered entry first, then the
    /// built-in of that name.
    pub fn resolve(&self, name: &str) -> Option<(&dyn Operator, OperatorSource)> {
        if let Some(op) = self.ops.get(name) {
            return Some((op.as_ref(), OperatorSource::Custom));
        }
        Builtin::from_name(name).map(|op| (op.as_operator(), OperatorSource::Builtin))
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ops.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_key_split_on_last_delimiter() {
        let key = FilterKey::parse("created_at__gte");
        assert_eq!(key.field, "created_at");
        assert_eq!(key.suffix, Some("gte"));

        let key = FilterKey::parse("meta__tags__any");
        assert_eq!(key.field, "meta__tags");
        assert_eq!(key.suffix, Some("any"));
    }

    #[test]
    fn test_filter_key_without_delimiter() {
        let key = FilterKey::parse("user_id");
        assert_eq!(key.field, "user_id");
        assert_eq!(key.suffix, None);
    }

    #[test]
    fn test_builtin_names_round_trip() {
        for op in Builtin::ALL {
            assert_eq!(Builtin::from_name(op.name()), Some(op));
        }
        assert_eq!(Builtin::from_name("between"), None);
    }

    #[test]
    fn test_builtin_shapes() {
        assert_eq!(Builtin::Not.shape(), "field <> :key");
        assert_eq!(Builtin::Any.shape(), "field in :key");
        assert_eq!(Builtin::ICont.shape(), "upper(field) like upper(:key)");
    }

    #[test]
    fn test_transforms() {
        assert_eq!(ValueTransform::Starts.apply(&json!(2)), json!("2%"));
        assert_eq!(ValueTransform::Ends.apply(&json!("abc")), json!("%abc"));
        assert_eq!(ValueTransform::Contains.apply(&json!("abc")), json!("%abc%"));
        assert_eq!(ValueTransform::Split.apply(&json!("2, 3,2")), json!(["2", " 3", "2"]));
        assert_eq!(ValueTransform::None.apply(&json!(7)), json!(7));
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("between").is_ok());
        assert!(validate_name("not_null").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a__b").is_err());
        assert!(validate_name("has space").is_err());
    }

    #[test]
    fn test_resolve_prefers_custom() {
        let mut registry = OperatorRegistry::new();
        registry
            .register("eq", TemplateOperator::new("{column} is {bind}", ValueTransform::None))
            .unwrap();

        let (op, source) = registry.resolve("eq").unwrap();
        assert_eq!(source, OperatorSource::Custom);
        let p = op.build("\"a\"", "a__eq", &json!(1)).unwrap();
        assert_eq!(p.sql, "\"a\" is :a__eq");

        let (op, source) = registry.resolve("gte").unwrap();
        assert_eq!(source, OperatorSource::Builtin);
        let p = op.build("\"a\"", "a__gte", &json!(1)).unwrap();
        assert_eq!(p.sql, "\"a\" >= :a__gte");
    }

    #[test]
    fn test_resolve_unknown_suffix() {
        assert!(OperatorRegistry::new().resolve("between").is_none());
        assert!(OperatorRegistry::new().resolve("").is_none());
    }

    #[test]
    fn test_builtin_as_operator_matches_variant() {
        for op in Builtin::ALL {
            let p = op.as_operator().build("f", "k", &json!("v")).unwrap();
            assert_eq!(p, op.build("f", "k", &json!("v")).unwrap());
        }
    }

    #[test]
    fn test_closure_operator() {
        let between = |column: &str, bind: &str, value: &Value| -> QfilterResult<Predicate> {
            Ok(Predicate::new(
                format!("{} between :{}", column, bind),
                value.clone(),
            ))
        };
        let mut registry = OperatorRegistry::new();
        registry.register("between", between).unwrap();
        let (op, _) = registry.resolve("between").unwrap();
        let p = op.build("\"n\"", "n__between", &json!("1")).unwrap();
        assert_eq!(p.sql, "\"n\" between :n__between");
    }
}
