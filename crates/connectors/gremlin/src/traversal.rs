//! Structured Gremlin traversals and their Groovy rendering.
//!
//! Compiled predicates are assembled as [`Step`]s and only turned into text
//! at the end, so every literal goes through [`Literal::render`].

use chrono::SecondsFormat;
use floe_connector::Value;
use std::fmt;

/// Which element stream a traversal starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "vertex",
            ElementKind::Edge => "edge",
        }
    }

    fn source(&self) -> &'static str {
        match self {
            ElementKind::Vertex => "g.V()",
            ElementKind::Edge => "g.E()",
        }
    }
}

impl std::str::FromStr for ElementKind {
    type Err = floe_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertex" | "vertices" => Ok(ElementKind::Vertex),
            "edge" | "edges" => Ok(ElementKind::Edge),
            other => Err(floe_common::Error::malformed(format!("unknown graph type '{other}'"))),
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Groovy literal, already escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal(String);

impl Literal {
    pub fn string(text: &str) -> Self {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('\'');
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c => out.push(c),
            }
        }
        out.push('\'');
        Literal(out)
    }

    pub fn render(value: &Value) -> Self {
        let text = match value {
            Value::Boolean(v) => v.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => format!("{v}L"),
            Value::Float32(v) if v.is_finite() => format!("{v}f"),
            Value::Float64(v) if v.is_finite() => format!("{v}d"),
            Value::Float32(v) => non_finite("Float", f64::from(*v)),
            Value::Float64(v) => non_finite("Double", *v),
            Value::Decimal(v) => format!("{v}G"),
            Value::Date(_) | Value::Timestamp(_) => {
                let instant = match value {
                    Value::Date(_) => value.as_date().and_then(|d| d.and_hms_opt(0, 0, 0)).map(|d| d.and_utc()),
                    _ => value.as_datetime(),
                };
                match instant {
                    Some(instant) => {
                        let iso = instant.to_rfc3339_opts(SecondsFormat::AutoSi, true);
                        format!("datetime({})", Literal::string(&iso))
                    }
                    None => return Literal::string(&value.to_string()),
                }
            }
            Value::Utf8(s) => return Literal::string(s),
            Value::Binary(_) => return Literal::string(&value.to_string()),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|item| Literal::render(item).0).collect();
                format!("[{}]", rendered.join(", "))
            }
        };
        Literal(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn non_finite(class: &str, v: f64) -> String {
    if v.is_nan() {
        format!("{class}.NaN")
    } else if v > 0.0 {
        format!("{class}.POSITIVE_INFINITY")
    } else {
        format!("{class}.NEGATIVE_INFINITY")
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A `P` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Literal),
    Gt(Literal),
    Gte(Literal),
    Lt(Literal),
    Lte(Literal),
    Within(Vec<Literal>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Joins alternatives with `.or(..)`; a single alternative stays as is.
    pub fn any_of(mut alternatives: Vec<Predicate>) -> Option<Predicate> {
        match alternatives.len() {
            0 => None,
            1 => alternatives.pop(),
            _ => Some(Predicate::Or(alternatives)),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Eq(v) => write!(f, "eq({v})"),
            Predicate::Gt(v) => write!(f, "gt({v})"),
            Predicate::Gte(v) => write!(f, "gte({v})"),
            Predicate::Lt(v) => write!(f, "lt({v})"),
            Predicate::Lte(v) => write!(f, "lte({v})"),
            Predicate::Within(values) => write!(f, "within({})", join(values)),
            Predicate::And(left, right) => write!(f, "{left}.and({right})"),
            Predicate::Or(alternatives) => {
                let (first, rest) = alternatives.split_first().ok_or(fmt::Error)?;
                write!(f, "{first}")?;
                for alternative in rest {
                    write!(f, ".or({alternative})")?;
                }
                Ok(())
            }
        }
    }
}

/// Edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    fn step(&self) -> &'static str {
        match self {
            Direction::In => "inV()",
            Direction::Out => "outV()",
        }
    }
}

/// What one `order().by(..)` modulator sorts on.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderKey {
    /// 0 when the property is absent, 1 when present.
    Presence(String),
    /// The property value, with absent elements mapped to a constant.
    Property(String),
    Id,
    Label,
    Endpoint(Direction),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub key: OrderKey,
    pub ascending: bool,
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = if self.ascending { "asc" } else { "desc" };
        match &self.key {
            OrderKey::Presence(key) => {
                write!(f, "by(coalesce(values({}).constant(1), constant(0)), {order})", Literal::string(key))
            }
            OrderKey::Property(key) => {
                write!(f, "by(coalesce(values({}), constant('')), {order})", Literal::string(key))
            }
            OrderKey::Id => write!(f, "by(T.id, {order})"),
            OrderKey::Label => write!(f, "by(T.label, {order})"),
            OrderKey::Endpoint(direction) => write!(f, "by({}.id(), {order})", direction.step()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    HasLabel(Predicate),
    Has(String),
    HasValue(String, Predicate),
    HasNot(String),
    HasId(Predicate),
    EndpointId(Direction, Predicate),
    /// Keeps an element when any of the anonymous traversals matches it.
    Or(Vec<Vec<Step>>),
    /// Filters out every element.
    Nothing,
    Order(Vec<OrderTerm>),
    Limit(u64),
    ValueMapWithTokens,
    ElementMap,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::HasLabel(Predicate::Eq(label)) => write!(f, "hasLabel({label})"),
            Step::HasLabel(predicate) => write!(f, "hasLabel({predicate})"),
            Step::Has(key) => write!(f, "has({})", Literal::string(key)),
            Step::HasValue(key, Predicate::Eq(value)) => write!(f, "has({}, {value})", Literal::string(key)),
            Step::HasValue(key, predicate) => write!(f, "has({}, {predicate})", Literal::string(key)),
            Step::HasNot(key) => write!(f, "hasNot({})", Literal::string(key)),
            Step::HasId(Predicate::Eq(id)) => write!(f, "hasId({id})"),
            Step::HasId(predicate) => write!(f, "hasId({predicate})"),
            Step::EndpointId(direction, predicate) => {
                let inner = Step::HasId(predicate.clone());
                write!(f, "where(__.{}.{inner})", direction.step())
            }
            Step::Or(alternatives) => {
                let rendered: Vec<String> = alternatives.iter().map(|steps| anonymous(steps)).collect();
                write!(f, "or({})", rendered.join(", "))
            }
            Step::Nothing => f.write_str("not(identity())"),
            Step::Order(terms) => {
                f.write_str("order()")?;
                for term in terms {
                    write!(f, ".{term}")?;
                }
                Ok(())
            }
            Step::Limit(n) => write!(f, "limit({n})"),
            Step::ValueMapWithTokens => f.write_str("valueMap().with(WithOptions.tokens)"),
            Step::ElementMap => f.write_str("elementMap()"),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn anonymous(steps: &[Step]) -> String {
    let mut out = String::from("__");
    for step in steps {
        out.push('.');
        out.push_str(&step.to_string());
    }
    out
}

/// A traversal from `g.V()` or `g.E()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    pub kind: ElementKind,
    pub steps: Vec<Step>,
}

impl Traversal {
    pub fn new(kind: ElementKind) -> Self {
        Self { kind, steps: Vec::new() }
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.source())?;
        for step in &self.steps {
            write!(f, ".{step}")?;
        }
        Ok(())
    }
}
