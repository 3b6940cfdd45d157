//! Parameter map to SQL translation.
//!
//! Translation runs in two phases. The control keys `_select`, `_from` and
//! `_order` are taken out of a private copy of the parameters first, then
//! every remaining key is read as a filter:
//!
//! ```text
//! {_select: "id,name", _from: "users", name__icont: "ann", _order: "-id"}
//!
//! select "id", "name" from "users"
//!     where upper("name") like upper(:name__icont)
//!     order by "id" desc
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::error::QfilterResult;
use crate::ident;
use crate::operators::{value_text, Builtin, FilterKey, Operator, OperatorRegistry};

/// Ordered parameter map, as decoded from a query string or JSON object.
pub type Params = serde_json::Map<String, Value>;

pub const SELECT_KEY: &str = "_select";
pub const FROM_KEY: &str = "_from";
pub const ORDER_KEY: &str = "_order";

/// Translation options.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Operators consulted before the built-ins.
    pub custom_operators: OperatorRegistry,
    /// Sanitize and quote `_from`. Turn off to pass `schema.table` or joins.
    pub quote_identifiers_in_from: bool,
    /// Only read keys shaped `<prefix>.<key>`, with the prefix removed.
    pub key_prefix: Option<String>,
    /// Quote field paths in `where` and `order by`.
    pub quote_field_identifiers: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            custom_operators: OperatorRegistry::new(),
            quote_identifiers_in_from: true,
            key_prefix: None,
            quote_field_identifiers: true,
        }
    }
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a custom operator.
    pub fn operator(mut self, name: impl Into<String>, op: impl Operator + 'static) -> QfilterResult<Self> {
        self.custom_operators.register(name, op)?;
        Ok(self)
    }

    pub fn quote_from(mut self, quote: bool) -> Self {
        self.quote_identifiers_in_from = quote;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn quote_fields(mut self, quote: bool) -> Self {
        self.quote_field_identifiers = quote;
        self
    }
}

/// The translated clauses. Empty clauses are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterQuery {
    pub select: String,
    pub from: String,
    #[serde(rename = "where")]
    pub where_: String,
    pub order: String,
    /// All non-empty clauses joined with single spaces.
    pub sql: String,
    /// Bind name to bind value.
    pub data: Params,
}

/// Control values and filters, split apart.
struct Scoped {
    select: Option<Value>,
    from: Option<Value>,
    order: Option<Value>,
    filters: Vec<(String, Value)>,
}

impl Scoped {
    fn split(params: &Params, prefix: Option<&str>) -> Self {
        let mut scoped = Scoped {
            select: None,
            from: None,
            order: None,
            filters: Vec::new(),
        };

        for (key, value) in params {
            let key = match prefix {
                Some(prefix) => match key.strip_prefix(prefix).and_then(|k| k.strip_prefix('.')) {
                    Some(stripped) => stripped,
                    None => {
                        tracing::trace!("Dropping '{}' outside prefix '{}'", key, prefix);
                        continue;
                    }
                },
                None => key.as_str(),
            };

            match key {
                SELECT_KEY => scoped.select = Some(value.clone()),
                FROM_KEY => scoped.from = Some(value.clone()),
                ORDER_KEY => scoped.order = Some(value.clone()),
                _ => scoped.filters.push((key.to_string(), value.clone())),
            }
        }

        scoped
    }
}

/// Translate a parameter map into SQL clauses and bind data.
///
/// # Example
///
/// ```
/// use qfilter::{translate, FilterOptions, Params};
/// use serde_json::json;
///
/// let params: Params = serde_json::from_value(json!({
///     "_select": "a", "_from": "t", "_order": "a", "a__eq": 1
/// })).unwrap();
///
/// let q = translate(&params, &FilterOptions::default()).unwrap();
/// assert_eq!(q.sql, r#"select "a" from "t" where "a" = :a__eq order by "a" asc"#);
/// assert_eq!(q.data["a__eq"], json!(1));
/// ```
pub fn translate(params: &Params, options: &FilterOptions) -> QfilterResult<FilterQuery> {
    let scoped = Scoped::split(params, options.key_prefix.as_deref());

    let select = select_clause(scoped.select.as_ref());
    let from = from_clause(scoped.from.as_ref(), options.quote_identifiers_in_from);
    let order = order_clause(scoped.order.as_ref(), options.quote_field_identifiers);

    let mut predicates: Vec<String> = Vec::new();
    let mut data = Params::new();

    for (key, value) in scoped.filters {
        if value_text(&value).is_empty() {
            tracing::debug!("Skipping '{}': empty value", key);
            continue;
        }

        let parsed = FilterKey::parse(&key);
        let column = |field: &str| ident::field(field, options.quote_field_identifiers);

        let resolved = parsed.suffix.and_then(|s| options.custom_operators.resolve(s));

        let predicate = match resolved {
            Some((op, _)) => op.build(&column(parsed.field), &key, &value)?,
            None => {
                tracing::debug!("No operator for '{}', using equality on the whole key", key);
                Builtin::Eq.build(&column(&key), &key, &value)?
            }
        };

        tracing::trace!("Predicate for '{}': {}", key, predicate.sql);
        predicates.push(predicate.sql);
        data.insert(key, predicate.value);
    }

    let where_ = if predicates.is_empty() {
        String::new()
    } else {
        format!("where {}", predicates.join(" and "))
    };

    let sql = [&select, &from, &where_, &order]
        .into_iter()
        .filter(|clause| !clause.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    Ok(FilterQuery {
        select,
        from,
        where_,
        order,
        sql,
        data,
    })
}

fn select_clause(value: Option<&Value>) -> String {
    let text = value.map(value_text).unwrap_or_else(|| "*".to_string());
    let mut fields: Vec<String> = text.split(',').filter_map(ident::sanitize).collect();
    if fields.is_empty() {
        fields.push("*".to_string());
    }
    format!("select {}", fields.join(", "))
}

fn from_clause(value: Option<&Value>, quote: bool) -> String {
    let text = value.map(value_text).unwrap_or_default();
    let source = if quote {
        ident::sanitize(&text)
    } else if text.trim().is_empty() {
        None
    } else {
        Some(text)
    };
    source.map(|s| format!("from {}", s)).unwrap_or_default()
}

fn order_clause(value: Option<&Value>, quote_fields: bool) -> String {
    let text = value.map(value_text).unwrap_or_default();
    let fields: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter_map(|f| match f.strip_prefix('-') {
            Some(name) if !name.is_empty() => Some(format!("{} desc", ident::field(name, quote_fields))),
            Some(_) => None,
            None if f.is_empty() => None,
            None => Some(format!("{} asc", ident::field(f, quote_fields))),
        })
        .collect();

    if fields.is_empty() {
        String::new()
    } else {
        format!("order by {}", fields.join(", "))
    }
}
