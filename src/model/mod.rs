//! Demo domain model: a tiny `House` record used by the end-to-end
//! scenarios (specification §8, S1-S5) and the demo binary.
//!
//! Not part of the generic engine — it is the one concrete instantiation
//! of "assume a per-type codec exists" that the core is otherwise
//! agnostic to.

use crate::delta::{Codec, Delta, Effects};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// `{name: String, number: i64}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct House {
    /// Street name.
    pub name: String,
    /// House number.
    pub number: i64,
}

impl House {
    /// Build a house record.
    pub fn new(name: impl Into<String>, number: i64) -> Self {
        Self { name: name.into(), number }
    }
}

/// Deltas over [`House`]: set the house number, or capitalize the street name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum HouseDelta {
    /// Overwrite `number`.
    SetNumber {
        /// The new number.
        number: i64,
    },
    /// Overwrite `name` with its ASCII-titlecased form.
    Capitalize,
}

impl Delta<House> for HouseDelta {
    fn run(&self, _effects: &mut Effects, model: &House) -> House {
        match self {
            HouseDelta::SetNumber { number } => House { number: *number, ..model.clone() },
            HouseDelta::Capitalize => House {
                name: titlecase(&model.name),
                ..model.clone()
            },
        }
    }
}

fn titlecase(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// JSON codec for [`HouseDelta`], used both to fill `DeltaEnvelope::encoded`
/// and to decode inbound commits / remote wire deltas.
pub struct HouseDeltaCodec;

impl Codec<HouseDelta> for HouseDeltaCodec {
    fn encode(&self, value: &HouseDelta) -> Json {
        serde_json::to_value(value).expect("HouseDelta is always serializable")
    }

    fn decode(&self, json: &Json) -> Result<HouseDelta, String> {
        serde_json::from_value(json.clone()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{interpret, DeltaIoContext};
    use crate::core::ids::{ClientDeltaId, ClientId, DeltaId};

    fn sample_delta_id() -> DeltaId {
        DeltaId::new(ClientId(42), ClientDeltaId(0))
    }

    #[test]
    fn set_number_replaces_number_only() {
        let house = House::new("Main St", 1);
        let result = interpret(&HouseDelta::SetNumber { number: 7 }, DeltaIoContext::new(0), sample_delta_id(), &house);
        assert_eq!(result.data, House::new("Main St", 7));
    }

    #[test]
    fn capitalize_titlecases_name() {
        let house = House::new("main st", 1);
        let result = interpret(&HouseDelta::Capitalize, DeltaIoContext::new(0), sample_delta_id(), &house);
        assert_eq!(result.data.name, "Main St");
    }

    #[test]
    fn codec_round_trips_through_json() {
        let codec = HouseDeltaCodec;
        let delta = HouseDelta::SetNumber { number: 42 };
        let json = codec.encode(&delta);
        let decoded = codec.decode(&json).unwrap();
        match decoded {
            HouseDelta::SetNumber { number } => assert_eq!(number, 42),
            _ => panic!("wrong variant"),
        }
    }
}
