//! Stage capabilities.

use super::Emitter;
use crate::context::StageContext;
use crate::core::Record;
use crate::errors::PluginResult;

/// A record-at-a-time stage: sources, transforms and sinks.
///
/// `initialize` runs exactly once per task, before the first record.
pub trait Transform: Send {
    /// Prepares the stage from its context.
    fn initialize(&mut self, _ctx: &StageContext) -> PluginResult {
        Ok(())
    }

    /// Transforms one record into zero or more records.
    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult;
}

/// A grouping stage, split across the map and reduce sides of a task pair.
///
/// Both operations are required: a stage is an aggregator or it is not.
pub trait Aggregator: Send {
    /// The key records are grouped by.
    type Key;
    /// The records being grouped.
    type Value;
    /// What aggregating a group produces.
    type Output;

    /// Prepares the stage from its context.
    fn initialize(&mut self, _ctx: &StageContext) -> PluginResult {
        Ok(())
    }

    /// Emits the keys `input` belongs to. Zero keys drops the record; several
    /// keys place it in several groups.
    fn group_by(&mut self, input: &Self::Value, keys: &mut dyn Emitter<Self::Key>) -> PluginResult;

    /// Aggregates every value of one group in a single forward pass.
    fn aggregate(
        &mut self,
        key: &Self::Key,
        values: &mut dyn Iterator<Item = Self::Value>,
        emitter: &mut dyn Emitter<Self::Output>,
    ) -> PluginResult;
}

/// An aggregator over type-erased records, as the compiler instantiates them.
pub type RecordAggregator = dyn Aggregator<Key = Record, Value = Record, Output = Record>;

impl<A: Aggregator + ?Sized> Aggregator for Box<A> {
    type Key = A::Key;
    type Value = A::Value;
    type Output = A::Output;

    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        (**self).initialize(ctx)
    }

    fn group_by(&mut self, input: &Self::Value, keys: &mut dyn Emitter<Self::Key>) -> PluginResult {
        (**self).group_by(input, keys)
    }

    fn aggregate(
        &mut self,
        key: &Self::Key,
        values: &mut dyn Iterator<Item = Self::Value>,
        emitter: &mut dyn Emitter<Self::Output>,
    ) -> PluginResult {
        (**self).aggregate(key, values, emitter)
    }
}

impl<T: Transform + ?Sized> Transform for Box<T> {
    fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        (**self).initialize(ctx)
    }

    fn transform(&mut self, input: Record, emitter: &mut dyn Emitter<Record>) -> PluginResult {
        (**self).transform(input, emitter)
    }
}
