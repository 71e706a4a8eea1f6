//! Identifier generation strategies for newly created records.

use std::fmt::Debug;
use bson::Bson;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use uuid::Uuid;

/// Strategy producing a fresh identifier for a record of the given type.
///
/// Implementations must be safe to call concurrently and must not rely on the
/// order of calls. Any `Fn(&str) -> Bson` closure is a valid strategy.
pub trait IdGenerator: Send + Sync + Debug {
    fn generate(&self, record_type: &str) -> Bson;
}

/// Random alphanumeric string identifiers of a fixed length.
#[derive(Debug, Clone, Copy)]
pub struct ShortIdGenerator {
    length: usize,
}

impl ShortIdGenerator {
    pub const DEFAULT_LENGTH: usize = 10;

    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for ShortIdGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl IdGenerator for ShortIdGenerator {
    fn generate(&self, _record_type: &str) -> Bson {
        Bson::String(
            thread_rng()
                .sample_iter(&Alphanumeric)
                .take(self.length)
                .map(char::from)
                .collect(),
        )
    }
}

/// Hyphenated UUID v4 string identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self, _record_type: &str) -> Bson {
        Bson::String(Uuid::new_v4().to_string())
    }
}

/// Wraps a closure as an [`IdGenerator`].
pub struct FnIdGenerator<F>(pub F);

impl<F> Debug for FnIdGenerator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnIdGenerator")
    }
}

impl<F> IdGenerator for FnIdGenerator<F>
where
    F: Fn(&str) -> Bson + Send + Sync,
{
    fn generate(&self, record_type: &str) -> Bson {
        (self.0)(record_type)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn short_ids_have_fixed_length() {
        let generator = ShortIdGenerator::default();

        for _ in 0..100 {
            match generator.generate("vocabulary") {
                Bson::String(id) => {
                    assert_eq!(id.len(), ShortIdGenerator::DEFAULT_LENGTH);
                    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
                }
                other => panic!("unexpected identifier {other:?}"),
            }
        }
    }

    #[test]
    fn short_ids_are_practically_unique() {
        let generator = ShortIdGenerator::default();
        let ids = (0..1000)
            .map(|_| generator.generate("vocabulary").to_string())
            .collect::<HashSet<_>>();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn uuid_ids_parse() {
        let Bson::String(id) = UuidGenerator.generate("user") else {
            panic!("expected a string identifier");
        };

        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn closures_act_as_generators() {
        let generator = FnIdGenerator(|record_type: &str| Bson::String(format!("{record_type}-1")));

        assert_eq!(generator.generate("user"), Bson::String("user-1".into()));
    }
}
