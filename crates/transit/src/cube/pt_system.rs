//! PT system records (`OPERATOR`, `MODE`, `VEHICLETYPE`, ...) keyed by `NUMBER`.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::models::types::{Result, TransitError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PtRecordKind {
    Operator,
    Mode,
    VehicleType,
    WaitCurve,
    CrowdCurve,
}

impl PtRecordKind {
    pub const ALL: [PtRecordKind; 5] = [
        Self::Operator,
        Self::Mode,
        Self::VehicleType,
        Self::WaitCurve,
        Self::CrowdCurve,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Operator => "OPERATOR",
            Self::Mode => "MODE",
            Self::VehicleType => "VEHICLETYPE",
            Self::WaitCurve => "WAITCRVDEF",
            Self::CrowdCurve => "CROWDCRVDEF",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(word))
    }
}

impl fmt::Display for PtRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PtSystem {
    records: BTreeMap<PtRecordKind, BTreeMap<i64, Map<String, Value>>>,
}

impl PtSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record; a second record with the same kind and number is an error.
    pub fn insert(
        &mut self,
        kind: PtRecordKind,
        number: i64,
        attributes: Map<String, Value>,
    ) -> Result<()> {
        let records = self.records.entry(kind).or_default();
        if records.contains_key(&number) {
            return Err(TransitError::PtSystemCollision {
                kind: kind.to_string(),
                number,
            });
        }
        records.insert(number, attributes);
        Ok(())
    }

    pub fn get(&self, kind: PtRecordKind, number: i64) -> Option<&Map<String, Value>> {
        self.records.get(&kind)?.get(&number)
    }

    pub fn records(&self, kind: PtRecordKind) -> impl Iterator<Item = (i64, &Map<String, Value>)> {
        self.records
            .get(&kind)
            .into_iter()
            .flat_map(|records| records.iter().map(|(n, attrs)| (*n, attrs)))
    }

    pub fn merge(&mut self, other: PtSystem) -> Result<()> {
        for (kind, records) in other.records {
            for (number, attributes) in records {
                self.insert(kind, number, attributes)?;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
