//! The two halves of an aggregator.

use super::Transformation;
use crate::context::StageContext;
use crate::errors::{PluginResult, StageOperation};
use crate::plugin::{Aggregator, Emitter, GroupKeyEmitter};

/// Map-side half of an aggregator.
///
/// Each record is paired with every key the aggregator's `group_by` emits
/// for it. The key buffer is owned by this transformation and reset before
/// every record, so keys never leak from one record to the next.
pub struct PreGroupTransform<A: Aggregator> {
    aggregator: A,
    keys: GroupKeyEmitter<A::Key>,
}

impl<A: Aggregator> PreGroupTransform<A> {
    /// Wraps an initialized aggregator.
    pub fn new(aggregator: A) -> Self {
        Self {
            aggregator,
            keys: GroupKeyEmitter::new(),
        }
    }

    /// Initializes the aggregator.
    pub fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.aggregator.initialize(ctx)
    }

    /// Returns the wrapped aggregator.
    pub const fn aggregator(&self) -> &A {
        &self.aggregator
    }
}

impl<A> Transformation<A::Value, (A::Key, A::Value)> for PreGroupTransform<A>
where
    A: Aggregator,
    A::Key: Send,
    A::Value: Clone,
{
    fn transform(
        &mut self,
        input: A::Value,
        emitter: &mut dyn Emitter<(A::Key, A::Value)>,
    ) -> PluginResult {
        self.keys.reset();
        self.aggregator.group_by(&input, &mut self.keys)?;

        let mut keys = self.keys.drain().peekable();
        while let Some(key) = keys.next() {
            if keys.peek().is_none() {
                emitter.emit((key, input));
                break;
            }
            emitter.emit((key, input.clone()));
        }
        Ok(())
    }

    fn operation(&self) -> StageOperation {
        StageOperation::GroupBy
    }
}

/// Reduce-side half of an aggregator.
///
/// Receives one group at a time: its key and a single-pass iterator over
/// the group's values.
pub struct PostGroupTransform<A: Aggregator> {
    aggregator: A,
}

impl<A: Aggregator> PostGroupTransform<A> {
    /// Wraps an initialized aggregator.
    pub const fn new(aggregator: A) -> Self {
        Self { aggregator }
    }

    /// Initializes the aggregator.
    pub fn initialize(&mut self, ctx: &StageContext) -> PluginResult {
        self.aggregator.initialize(ctx)
    }

    /// Returns the wrapped aggregator.
    pub const fn aggregator(&self) -> &A {
        &self.aggregator
    }
}

impl<A, I> Transformation<(A::Key, I), A::Output> for PostGroupTransform<A>
where
    A: Aggregator,
    I: Iterator<Item = A::Value>,
{
    fn transform(
        &mut self,
        (key, mut values): (A::Key, I),
        emitter: &mut dyn Emitter<A::Output>,
    ) -> PluginResult {
        self.aggregator.aggregate(&key, &mut values, emitter)
    }

    fn operation(&self) -> StageOperation {
        StageOperation::Aggregate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Groups words by every distinct character; fails on empty words.
    #[derive(Default)]
    struct ByCharacter {
        groups: usize,
    }

    impl Aggregator for ByCharacter {
        type Key = char;
        type Value = String;
        type Output = (char, usize);

        fn group_by(&mut self, input: &String, keys: &mut dyn Emitter<char>) -> PluginResult {
            let mut seen = Vec::new();
            for c in input.chars() {
                if !seen.contains(&c) {
                    seen.push(c);
                    keys.emit(c);
                }
            }
            anyhow::ensure!(!input.is_empty(), "empty word");
            Ok(())
        }

        fn aggregate(
            &mut self,
            key: &char,
            values: &mut dyn Iterator<Item = String>,
            emitter: &mut dyn Emitter<(char, usize)>,
        ) -> PluginResult {
            self.groups += 1;
            emitter.emit((*key, values.count()));
            Ok(())
        }
    }

    /// Emits a key on every record, then fails on "bad".
    struct LeakProbe;

    impl Aggregator for LeakProbe {
        type Key = String;
        type Value = String;
        type Output = String;

        fn group_by(&mut self, input: &String, keys: &mut dyn Emitter<String>) -> PluginResult {
            keys.emit(format!("key-{input}"));
            anyhow::ensure!(input != "bad", "bad record");
            Ok(())
        }

        fn aggregate(
            &mut self,
            _key: &String,
            _values: &mut dyn Iterator<Item = String>,
            _emitter: &mut dyn Emitter<String>,
        ) -> PluginResult {
            Ok(())
        }
    }

    #[test]
    fn test_pairs_per_key() {
        let mut pre = PreGroupTransform::new(ByCharacter::default());
        let mut out: Vec<(char, String)> = Vec::new();
        pre.transform("abca".to_string(), &mut out).unwrap();

        assert_eq!(
            out,
            vec![
                ('a', "abca".to_string()),
                ('b', "abca".to_string()),
                ('c', "abca".to_string()),
            ]
        );
    }

    #[test]
    fn test_zero_keys_drop_record() {
        struct NoKeys;
        impl Aggregator for NoKeys {
            type Key = u8;
            type Value = u8;
            type Output = u8;
            fn group_by(&mut self, _input: &u8, _keys: &mut dyn Emitter<u8>) -> PluginResult {
                Ok(())
            }
            fn aggregate(
                &mut self,
                _key: &u8,
                _values: &mut dyn Iterator<Item = u8>,
                _emitter: &mut dyn Emitter<u8>,
            ) -> PluginResult {
                Ok(())
            }
        }

        let mut pre = PreGroupTransform::new(NoKeys);
        let mut out: Vec<(u8, u8)> = Vec::new();
        pre.transform(1, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_keys_do_not_leak_across_records() {
        let mut pre = PreGroupTransform::new(LeakProbe);
        let mut out: Vec<(String, String)> = Vec::new();

        assert!(pre.transform("bad".to_string(), &mut out).is_err());
        assert!(out.is_empty());

        pre.transform("good".to_string(), &mut out).unwrap();
        assert_eq!(out, vec![("key-good".to_string(), "good".to_string())]);
    }

    #[test]
    fn test_failure_propagates() {
        let mut pre = PreGroupTransform::new(ByCharacter::default());
        let mut out: Vec<(char, String)> = Vec::new();
        let err = pre.transform(String::new(), &mut out).unwrap_err();
        assert_eq!(err.to_string(), "empty word");
        assert_eq!(
            Transformation::<String, (char, String)>::operation(&pre),
            StageOperation::GroupBy
        );
    }

    #[test]
    fn test_post_group_aggregates_one_group() {
        let mut post = PostGroupTransform::new(ByCharacter::default());
        let mut out: Vec<(char, usize)> = Vec::new();
        let values = vec!["ab".to_string(), "ba".to_string(), "a".to_string()];
        post.transform(('a', values.into_iter()), &mut out).unwrap();

        assert_eq!(out, vec![('a', 3)]);
        assert_eq!(post.aggregator().groups, 1);
    }
}
