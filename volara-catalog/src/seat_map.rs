use serde::{Deserialize, Serialize};
use volara_shared::CabinClass;

/// A contiguous block of rows sharing one cabin class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMapSection {
    pub class: CabinClass,
    pub first_row: i32,
    pub last_row: i32,
    pub columns: Vec<char>,
}

/// Class-specific seat layout used to provision a newly scheduled flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatMapTemplate {
    pub sections: Vec<SeatMapSection>,
}

/// One seat position produced by the template, pre-persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatBlueprint {
    pub label: String,
    pub row: i32,
    pub column: char,
    pub class: CabinClass,
}

impl SeatMapTemplate {
    /// The fleet-wide default layout: rows 1-3 first class (A-D),
    /// rows 4-20 economy (A-F).
    pub fn standard() -> Self {
        Self {
            sections: vec![
                SeatMapSection {
                    class: CabinClass::First,
                    first_row: 1,
                    last_row: 3,
                    columns: vec!['A', 'B', 'C', 'D'],
                },
                SeatMapSection {
                    class: CabinClass::Economy,
                    first_row: 4,
                    last_row: 20,
                    columns: vec!['A', 'B', 'C', 'D', 'E', 'F'],
                },
            ],
        }
    }

    /// Expand the template into individual seat positions, labelled "12A" style.
    pub fn blueprints(&self) -> Vec<SeatBlueprint> {
        let mut seats = Vec::new();
        for section in &self.sections {
            for row in section.first_row..=section.last_row {
                for &column in &section.columns {
                    seats.push(SeatBlueprint {
                        label: format!("{}{}", row, column),
                        row,
                        column,
                        class: section.class,
                    });
                }
            }
        }
        seats
    }

    pub fn capacity(&self, class: CabinClass) -> usize {
        self.sections
            .iter()
            .filter(|s| s.class == class)
            .map(|s| (s.last_row - s.first_row + 1) as usize * s.columns.len())
            .sum()
    }
}
