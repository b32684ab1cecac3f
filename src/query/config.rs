//! Accumulated query configuration
//!
//! Every builder state carries one `QueryConfig`. The builder decides which
//! fields may still change; the engine reads the finished configuration and
//! never mutates it.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::store::{KeyRange, StoreError, StoreResult};

/// Record predicate used by function filters
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Per-record projection applied just before a value joins the result
pub type Mapper = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Field computation used by modify queries
pub type FieldFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Range restriction requested by the caller
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RangeSpec {
    /// Whole table or index
    #[default]
    All,
    /// Exactly one key
    Only(Value),
    /// Both endpoints
    Bound {
        lower: Value,
        upper: Value,
        lower_open: bool,
        upper_open: bool,
    },
    /// Lower endpoint only
    LowerBound { value: Value, open: bool },
    /// Upper endpoint only
    UpperBound { value: Value, open: bool },
}

impl RangeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            RangeSpec::All => "all",
            RangeSpec::Only(_) => "only",
            RangeSpec::Bound { .. } => "bound",
            RangeSpec::LowerBound { .. } => "lowerBound",
            RangeSpec::UpperBound { .. } => "upperBound",
        }
    }

    /// Converts to the store's primitive range. `All` has none.
    pub fn to_key_range(&self) -> StoreResult<Option<KeyRange>> {
        let range = match self {
            RangeSpec::All => return Ok(None),
            RangeSpec::Only(value) => KeyRange::only(value)?,
            RangeSpec::Bound {
                lower,
                upper,
                lower_open,
                upper_open,
            } => KeyRange::bound(lower, upper, *lower_open, *upper_open)?,
            RangeSpec::LowerBound { value, open } => KeyRange::lower_bound(value, *open)?,
            RangeSpec::UpperBound { value, open } => KeyRange::upper_bound(value, *open)?,
        };
        Ok(Some(range))
    }
}

/// What the cursor yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    /// Records
    #[default]
    Values,
    /// Keys (index keys on an index, primary keys otherwise)
    Keys,
    /// A single count; no iteration
    Count,
}

/// Skip/take window over filtered matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub skip: usize,
    pub take: usize,
}

/// One filter entry
#[derive(Clone)]
pub enum Filter {
    /// Field equals value
    Equals { field: String, value: Value },
    /// Arbitrary predicate over the candidate
    Predicate(Predicate),
    /// Entry that is neither a pair nor a predicate; ignored when matching
    Malformed(Value),
}

impl Filter {
    /// Builds a filter from a JSON `[field, value]` pair.
    ///
    /// Anything else becomes `Malformed` and never excludes a record.
    pub fn from_spec(spec: Value) -> Self {
        match spec {
            Value::Array(mut pair) if pair.len() == 2 && pair[0].is_string() => {
                let value = pair.pop().unwrap_or(Value::Null);
                match pair.pop() {
                    Some(Value::String(field)) => Filter::Equals { field, value },
                    _ => Filter::Malformed(Value::Null),
                }
            }
            other => Filter::Malformed(other),
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Filter::Malformed(_))
    }

    /// Tests a candidate value
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Filter::Equals { field, value } => candidate.get(field) == Some(value),
            Filter::Predicate(predicate) => predicate(candidate),
            Filter::Malformed(_) => true,
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equals { field, value } => write!(f, "Equals({} = {})", field, value),
            Filter::Predicate(_) => write!(f, "Predicate(<fn>)"),
            Filter::Malformed(spec) => write!(f, "Malformed({})", spec),
        }
    }
}

/// New value for one field of a modified record
#[derive(Clone)]
pub enum FieldUpdate {
    Literal(Value),
    Computed(FieldFn),
}

/// Field assignments applied by a modify query
#[derive(Clone, Default)]
pub struct ModifySpec {
    updates: Vec<(String, FieldUpdate)>,
}

impl ModifySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns a literal value to a field
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.updates.push((field.into(), FieldUpdate::Literal(value.into())));
        self
    }

    /// Assigns the result of a function of the pre-modification record
    pub fn compute<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.updates.push((field.into(), FieldUpdate::Computed(Arc::new(f))));
        self
    }

    /// Builds a literal-only spec from a JSON object
    pub fn from_object(object: &serde_json::Map<String, Value>) -> Self {
        object
            .iter()
            .fold(Self::new(), |spec, (field, value)| spec.set(field.clone(), value.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.updates.iter().map(|(field, _)| field.as_str()).collect()
    }

    /// Produces the modified record.
    ///
    /// Every computed field sees the original record, never a partially
    /// modified one.
    pub fn apply(&self, original: &Value) -> StoreResult<Value> {
        let mut updated = original.clone();
        let object = updated.as_object_mut().ok_or_else(|| {
            StoreError::Data(format!("cannot modify non-object record {}", original))
        })?;
        for (field, update) in &self.updates {
            let value = match update {
                FieldUpdate::Literal(value) => value.clone(),
                FieldUpdate::Computed(f) => f(original),
            };
            object.insert(field.clone(), value);
        }
        Ok(updated)
    }
}

impl fmt::Debug for ModifySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifySpec").field("fields", &self.fields()).finish()
    }
}

/// Everything a single execution needs
#[derive(Clone)]
pub struct QueryConfig {
    pub(crate) table: String,
    pub(crate) index: Option<String>,
    pub(crate) range: RangeSpec,
    pub(crate) cursor_mode: CursorMode,
    pub(crate) descending: bool,
    pub(crate) unique: bool,
    pub(crate) filters: Vec<Filter>,
    pub(crate) window: Option<Window>,
    pub(crate) modify: Option<ModifySpec>,
    pub(crate) mapper: Option<Mapper>,
}

impl QueryConfig {
    pub(crate) fn new(table: impl Into<String>, index: Option<String>, range: RangeSpec) -> Self {
        Self {
            table: table.into(),
            index,
            range,
            cursor_mode: CursorMode::Values,
            descending: false,
            unique: false,
            filters: Vec::new(),
            window: None,
            modify: None,
            mapper: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn range(&self) -> &RangeSpec {
        &self.range
    }

    pub fn cursor_mode(&self) -> CursorMode {
        self.cursor_mode
    }

    pub fn is_descending(&self) -> bool {
        self.descending
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn modify(&self) -> Option<&ModifySpec> {
        self.modify.as_ref()
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper.is_some()
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("table", &self.table)
            .field("index", &self.index)
            .field("range", &self.range)
            .field("cursor_mode", &self.cursor_mode)
            .field("descending", &self.descending)
            .field("unique", &self.unique)
            .field("filters", &self.filters)
            .field("window", &self.window)
            .field("modify", &self.modify)
            .field("mapper", &self.mapper.is_some())
            .finish()
    }
}
