use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seat lifecycle. Wire values are the legacy Spanish identifiers and are
/// what gets stored in the `seats.state` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SeatState {
    #[serde(rename = "DISPONIBLE")]
    Available,
    #[serde(rename = "RESERVADO")]
    Held,
    #[serde(rename = "OCUPADO")]
    Occupied,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CabinClass {
    #[serde(rename = "PRIMERACLASE")]
    First,
    #[serde(rename = "SEGUNDACLASE")]
    Economy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReservationState {
    #[serde(rename = "ACTIVA")]
    Active,
    #[serde(rename = "PAGADA")]
    Paid,
    #[serde(rename = "CANCELADA")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TripType {
    #[serde(rename = "SOLOIDA")]
    OneWay,
    #[serde(rename = "IDAVUELTA")]
    RoundTrip,
}

/// Which portion of the trip a segment belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Leg {
    #[serde(rename = "IDA")]
    Outbound,
    #[serde(rename = "VUELTA")]
    Return,
}

macro_rules! wire_str {
    ($ty:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant)),+,
                    other => Err(format!("unknown {} value: {}", stringify!($ty), other)),
                }
            }
        }
    };
}

wire_str!(SeatState {
    Available => "DISPONIBLE",
    Held => "RESERVADO",
    Occupied => "OCUPADO",
});

wire_str!(CabinClass {
    First => "PRIMERACLASE",
    Economy => "SEGUNDACLASE",
});

wire_str!(ReservationState {
    Active => "ACTIVA",
    Paid => "PAGADA",
    Cancelled => "CANCELADA",
});

wire_str!(TripType {
    OneWay => "SOLOIDA",
    RoundTrip => "IDAVUELTA",
});

wire_str!(Leg {
    Outbound => "IDA",
    Return => "VUELTA",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        assert_eq!(SeatState::Held.as_str(), "RESERVADO");
        assert_eq!("OCUPADO".parse::<SeatState>().unwrap(), SeatState::Occupied);
        assert_eq!(CabinClass::Economy.as_str(), "SEGUNDACLASE");
        assert_eq!("IDAVUELTA".parse::<TripType>().unwrap(), TripType::RoundTrip);
        assert!("BUSINESS".parse::<CabinClass>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_values() {
        let json = serde_json::to_string(&ReservationState::Paid).unwrap();
        assert_eq!(json, "\"PAGADA\"");
        let leg: Leg = serde_json::from_str("\"VUELTA\"").unwrap();
        assert_eq!(leg, Leg::Return);
    }
}
