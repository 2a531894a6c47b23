//! Sample plugins for tests and benchmarks.

use crate::context::StageContext;
use crate::core::{PluginCategory, Record};
use crate::errors::PluginResult;
use crate::plugin::{Aggregator, Emitter, PluginRegistry, Transform};
use anyhow::{anyhow, bail, Context as _};
use serde_json::{json, Map, Number};

/// Property naming the field records are grouped by.
pub const GROUP_BY_FIELD: &str = "groupByField";

/// Property naming the numeric field a sum aggregator adds up.
pub const SUM_FIELD: &str = "sumField";

/// Emits every input record unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySource;

impl Transform for MemorySource {
    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        emitter.emit(input);
        Ok(())
    }
}

/// Emits every record it writes, so the executor can collect it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySink;

impl Transform for MemorySink {
    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        emitter.emit(input);
        Ok(())
    }
}

/// Keeps only the fields listed in the `fields` property.
#[derive(Debug, Clone, Default)]
pub struct ProjectionTransform {
    fields: Vec<String>,
}

impl Transform for ProjectionTransform {
    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.fields = ctx
            .require("fields")?
            .split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect();
        Ok(())
    }

    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        let Record::Object(mut object) = input else {
            bail!("projection expects an object record");
        };
        let projected: Map<String, Record> = self
            .fields
            .iter()
            .filter_map(|field| object.remove(field).map(|value| (field.clone(), value)))
            .collect();
        emitter.emit(Record::Object(projected));
        Ok(())
    }
}

/// Fails on records carrying the field named by the `field` property
/// (default `fail`) and passes every other record through.
#[derive(Debug, Clone)]
pub struct FailingTransform {
    field: String,
}

impl Default for FailingTransform {
    fn default() -> Self {
        Self {
            field: "fail".to_string(),
        }
    }
}

impl Transform for FailingTransform {
    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        if let Some(field) = ctx.property("field") {
            self.field = field.to_string();
        }
        Ok(())
    }

    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        if input.get(&self.field).is_some() {
            bail!("record flagged with '{}'", self.field);
        }
        emitter.emit(input);
        Ok(())
    }
}

/// Groups records by one field and sums another, emitting `{key: total}`.
#[derive(Debug, Clone)]
pub struct FieldSumAggregator {
    group_field: String,
    sum_field: String,
}

impl Default for FieldSumAggregator {
    fn default() -> Self {
        Self {
            group_field: "category".to_string(),
            sum_field: "count".to_string(),
        }
    }
}

impl Aggregator for FieldSumAggregator {
    type Key = Record;
    type Value = Record;
    type Output = Record;

    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.group_field = ctx.config().get_or(GROUP_BY_FIELD, &self.group_field).to_string();
        self.sum_field = ctx.config().get_or(SUM_FIELD, &self.sum_field).to_string();
        Ok(())
    }

    fn group_by(&mut self, input: &Record, keys: &mut dyn Emitter<Record>) -> PluginResult {
        keys.emit(field(input, &self.group_field)?.clone());
        Ok(())
    }

    fn aggregate(
        &mut self,
        key: &Record,
        values: &mut dyn Iterator<Item = Record>,
        emitter: &mut dyn Emitter<Record>,
    ) -> PluginResult {
        let mut total = Sum::default();
        for value in values {
            let number = field(&value, &self.sum_field)?
                .as_number()
                .ok_or_else(|| anyhow!("field '{}' is not numeric", self.sum_field))?;
            total.add(number);
        }
        emitter.emit(keyed(key, total.into_record()));
        Ok(())
    }
}

/// Groups records by one field and counts each group, emitting `{key: n}`.
#[derive(Debug, Clone)]
pub struct CountAggregator {
    group_field: String,
}

impl Default for CountAggregator {
    fn default() -> Self {
        Self {
            group_field: "category".to_string(),
        }
    }
}

impl Aggregator for CountAggregator {
    type Key = Record;
    type Value = Record;
    type Output = Record;

    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.group_field = ctx.config().get_or(GROUP_BY_FIELD, &self.group_field).to_string();
        Ok(())
    }

    fn group_by(&mut self, input: &Record, keys: &mut dyn Emitter<Record>) -> PluginResult {
        keys.emit(field(input, &self.group_field)?.clone());
        Ok(())
    }

    fn aggregate(
        &mut self,
        key: &Record,
        values: &mut dyn Iterator<Item = Record>,
        emitter: &mut dyn Emitter<Record>,
    ) -> PluginResult {
        emitter.emit(keyed(key, json!(values.count())));
        Ok(())
    }
}

/// Integer sum that widens to floating point on the first non-integer.
#[derive(Debug, Default)]
enum Sum {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
}

impl Sum {
    #[allow(clippy::cast_precision_loss)]
    fn add(&mut self, number: &Number) {
        *self = match (&*self, number.as_i64()) {
            (Self::Empty, Some(n)) => Self::Int(n),
            (Self::Int(total), Some(n)) => match total.checked_add(n) {
                Some(sum) => Self::Int(sum),
                None => Self::Float(*total as f64 + n as f64),
            },
            (Self::Int(total), None) => Self::Float(*total as f64 + number.as_f64().unwrap_or(0.0)),
            (Self::Float(total), _) => Self::Float(total + number.as_f64().unwrap_or(0.0)),
            (Self::Empty, None) => Self::Float(number.as_f64().unwrap_or(0.0)),
        };
    }

    fn into_record(self) -> Record {
        match self {
            Self::Empty => json!(0),
            Self::Int(total) => json!(total),
            Self::Float(total) => json!(total),
        }
    }
}

fn field<'a>(record: &'a Record, name: &str) -> anyhow::Result<&'a Record> {
    record
        .get(name)
        .with_context(|| format!("record has no field '{name}'"))
}

fn keyed(key: &Record, value: Record) -> Record {
    let name = key.as_str().map_or_else(|| key.to_string(), str::to_string);
    let mut object = Map::new();
    object.insert(name, value);
    Record::Object(object)
}

/// A registry with every sample plugin registered:
///
/// | type | name |
/// |---|---|
/// | `batchsource` | `memory` |
/// | `transform` | `project`, `fail` |
/// | `batchaggregator` | `sum`, `count` |
/// | `batchsink` | `memory` |
#[must_use]
pub fn sample_registry() -> PluginRegistry {
    let registry = PluginRegistry::new();
    registry.register_transform(PluginCategory::Source, "memory", |_| Ok(MemorySource));
    registry.register_transform(PluginCategory::Transform, "project", |_| {
        Ok(ProjectionTransform::default())
    });
    registry.register_transform(PluginCategory::Transform, "fail", |_| {
        Ok(FailingTransform::default())
    });
    registry.register_aggregator("sum", |_| Ok(FieldSumAggregator::default()));
    registry.register_aggregator("count", |_| Ok(CountAggregator::default()));
    registry.register_transform(PluginCategory::Sink, "memory", |_| Ok(MemorySink));
    registry
}
