//! JSON has no literal for infinity, so every temporal value that may
//! be unbounded crosses serialization as the string `"Infinity"`.
//! This is the single conversion boundary for the sentinel; in memory
//! everything is a plain `f64` with `f64::INFINITY`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaybeInfinite {
    Number(f64),
    Text(String),
}

impl MaybeInfinite {
    fn pack(value: f64) -> Self {
        if value.is_infinite() {
            MaybeInfinite::Text("Infinity".to_string())
        } else {
            MaybeInfinite::Number(value)
        }
    }

    fn unpack<E: serde::de::Error>(self) -> Result<f64, E> {
        match self {
            MaybeInfinite::Number(value) => Ok(value),
            MaybeInfinite::Text(text) if text == "Infinity" => Ok(f64::INFINITY),
            MaybeInfinite::Text(text) => {
                Err(E::custom(format!("invalid temporal value '{text}'")))
            }
        }
    }
}

/// A single possibly-infinite value, e.g. a bid metric.
pub mod float {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        MaybeInfinite::pack(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        MaybeInfinite::deserialize(deserializer)?.unpack()
    }
}

/// An `[lower, upper]` interval; the upper bound may be unbounded.
pub mod interval {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &(f64, f64),
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        (MaybeInfinite::pack(value.0), MaybeInfinite::pack(value.1)).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<(f64, f64), D::Error> {
        let (lower, upper) = <(MaybeInfinite, MaybeInfinite)>::deserialize(deserializer)?;
        Ok((lower.unpack()?, upper.unpack()?))
    }
}

/// A full distance matrix, as stored in a dispatchable graph.
pub mod matrix {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &[Vec<f64>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let packed: Vec<Vec<MaybeInfinite>> = value
            .iter()
            .map(|row| row.iter().map(|&cell| MaybeInfinite::pack(cell)).collect())
            .collect();
        packed.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<f64>>, D::Error> {
        let packed = <Vec<Vec<MaybeInfinite>>>::deserialize(deserializer)?;
        packed
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.unpack()).collect())
            .collect()
    }
}
