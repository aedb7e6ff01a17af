//! Serde helpers for on-the-wire amounts.
//!
//! Token amounts exceed `u64` (18-decimal tokens), so they travel as decimal
//! strings and live in memory as [`BigUint`]. Upstream producers are not
//! consistent about quoting, so numeric JSON values are accepted as well.

use std::fmt;

use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Serialize a [`BigUint`] as a decimal string.
pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_str_radix(10))
}

/// Deserialize a [`BigUint`] from a decimal string or an unsigned integer.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
    deserializer.deserialize_any(BigUintVisitor)
}

struct BigUintVisitor;

impl Visitor<'_> for BigUintVisitor {
    type Value = BigUint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
        Ok(BigUint::from(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
        v.trim()
            .parse::<BigUint>()
            .map_err(|e| E::custom(format!("invalid amount {v:?}: {e}")))
    }
}

/// Same encoding for `Option<BigUint>`; `null` or a missing field is `None`.
pub mod option {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<BigUint>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<BigUint>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "crate::amount")] BigUint);

        Option::<Wrapper>::deserialize(deserializer).map(|w| w.map(|Wrapper(v)| v))
    }
}

/// Deserialize an `f64` that may be encoded as a JSON number or a numeric string.
pub fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    struct F64Visitor;

    impl Visitor<'_> for F64Visitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number or a numeric string")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            v.trim()
                .parse::<f64>()
                .map_err(|e| E::custom(format!("invalid number {v:?}: {e}")))
        }
    }

    deserializer.deserialize_any(F64Visitor)
}
