//! The three kinds of rolling stock and the polymorphic references to them.
//!
//! Repairs, train compositions and image links point at a vehicle through a
//! `(type, id)` pair where the type is stored as a small integer code.

use diesel::PgConnection;
use serde::Serialize;

use crate::error::{ServiceError, ValidationErrors};
use crate::number::NumberStyle;
use crate::repo::fleet::{self, FreightWagon, PassengerWagon, TractiveUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RollingStockKind {
    PassengerWagon,
    FreightWagon,
    TractiveUnit,
}

impl RollingStockKind {
    pub const ALL: [Self; 3] = [Self::PassengerWagon, Self::FreightWagon, Self::TractiveUnit];

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::PassengerWagon),
            2 => Some(Self::FreightWagon),
            3 => Some(Self::TractiveUnit),
            _ => None,
        }
    }

    pub fn code(self) -> i16 {
        match self {
            Self::PassengerWagon => 1,
            Self::FreightWagon => 2,
            Self::TractiveUnit => 3,
        }
    }

    /// Name used for the kind in response bodies.
    pub fn label(self) -> &'static str {
        match self {
            Self::PassengerWagon => "passenger_wagon",
            Self::FreightWagon => "freight_wagon",
            Self::TractiveUnit => "tractive_unit",
        }
    }

    /// Tractive units carry freight-style numbers.
    pub fn number_style(self) -> NumberStyle {
        match self {
            Self::PassengerWagon => NumberStyle::Passenger,
            Self::FreightWagon | Self::TractiveUnit => NumberStyle::Freight,
        }
    }
}

impl Serialize for RollingStockKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A resolved polymorphic reference.
#[derive(Debug, Clone)]
pub enum RollingStock {
    PassengerWagon(PassengerWagon),
    FreightWagon(FreightWagon),
    TractiveUnit(TractiveUnit),
}

impl RollingStock {
    pub fn kind(&self) -> RollingStockKind {
        match self {
            Self::PassengerWagon(_) => RollingStockKind::PassengerWagon,
            Self::FreightWagon(_) => RollingStockKind::FreightWagon,
            Self::TractiveUnit(_) => RollingStockKind::TractiveUnit,
        }
    }

    pub fn id(&self) -> i32 {
        match self {
            Self::PassengerWagon(row) => row.id,
            Self::FreightWagon(row) => row.id,
            Self::TractiveUnit(row) => row.id,
        }
    }

    pub fn number(&self) -> &str {
        match self {
            Self::PassengerWagon(row) => &row.number,
            Self::FreightWagon(row) => &row.number,
            Self::TractiveUnit(row) => &row.number,
        }
    }
}

/// Resolves a batch of references in one query per kind.
///
/// The result lines up with `refs`; dangling references become `None`.
pub fn resolve_many(
    conn: &mut PgConnection,
    refs: &[(i16, i32)],
) -> Result<Vec<Option<RollingStock>>, ServiceError> {
    let ids_of = |kind: RollingStockKind| -> Vec<i32> {
        refs.iter()
            .filter(|(code, _)| *code == kind.code())
            .map(|(_, id)| *id)
            .collect()
    };

    let mut found = std::collections::HashMap::new();
    for row in fleet::passenger::find_many(conn, &ids_of(RollingStockKind::PassengerWagon))? {
        found.insert((RollingStockKind::PassengerWagon.code(), row.id), RollingStock::PassengerWagon(row));
    }
    for row in fleet::freight::find_many(conn, &ids_of(RollingStockKind::FreightWagon))? {
        found.insert((RollingStockKind::FreightWagon.code(), row.id), RollingStock::FreightWagon(row));
    }
    for row in fleet::tractive::find_many(conn, &ids_of(RollingStockKind::TractiveUnit))? {
        found.insert((RollingStockKind::TractiveUnit.code(), row.id), RollingStock::TractiveUnit(row));
    }

    Ok(refs.iter().map(|key| found.get(key).cloned()).collect())
}

/// Checks a submitted `(type, id)` pair, recording failures under
/// `<prefix>_type` and `<prefix>_id`.
pub fn validate_reference(
    conn: &mut PgConnection,
    errors: &mut ValidationErrors,
    prefix: &str,
    code: i16,
    id: i32,
) -> Result<Option<RollingStockKind>, ServiceError> {
    let Some(kind) = RollingStockKind::from_code(code) else {
        errors.invalid_reference(&format!("{}_type", prefix));
        return Ok(None);
    };

    let exists = match kind {
        RollingStockKind::PassengerWagon => fleet::passenger::exists(conn, id)?,
        RollingStockKind::FreightWagon => fleet::freight::exists(conn, id)?,
        RollingStockKind::TractiveUnit => fleet::tractive::exists(conn, id)?,
    };
    if !exists {
        errors.invalid_reference(&format!("{}_id", prefix));
        return Ok(None);
    }
    Ok(Some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in RollingStockKind::ALL {
            assert_eq!(RollingStockKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(RollingStockKind::from_code(0), None);
        assert_eq!(RollingStockKind::from_code(4), None);
    }

    #[test]
    fn kinds_serialize_as_labels() {
        let json = serde_json::to_string(&RollingStockKind::TractiveUnit).unwrap();
        assert_eq!(json, "\"tractive_unit\"");
    }

    #[test]
    fn resolved_vehicles_expose_id_number_and_kind() {
        let now = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let vehicle = RollingStock::TractiveUnit(TractiveUnit {
            id: 17,
            number: String::from("919475410034"),
            name: Some(String::from("Taurus")),
            owner_id: 1,
            status_id: 1,
            depot_id: None,
            repair_workshop_id: None,
            repair_valid_until: None,
            max_speed: Some(230),
            power_output: Some(6400),
            note: None,
            created_at: now,
            updated_at: now,
        });

        assert_eq!(vehicle.id(), 17);
        assert_eq!(vehicle.number(), "919475410034");
        assert_eq!(vehicle.kind(), RollingStockKind::TractiveUnit);
    }

    #[test]
    fn tractive_units_use_freight_numbers() {
        assert_eq!(
            RollingStockKind::TractiveUnit.number_style(),
            NumberStyle::Freight
        );
        assert_eq!(
            RollingStockKind::PassengerWagon.number_style(),
            NumberStyle::Passenger
        );
    }
}
