use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::Display;

/// The kind of sensor array wired to the microcontroller.
///
/// The kind decides how a serial field is parsed and what one on-disk
/// record holds:
/// - `Pir`: passive-infrared motion sensors, fields in base 2, records
///   hold the mean activity of a bin window as `f32`
/// - `Wheel`: running-wheel rotation encoders, fields in base 10, records
///   hold the raw rotation count of one line as `u32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    #[strum(to_string = "pir")]
    Pir,
    #[strum(to_string = "wheel")]
    Wheel,
}

impl SensorKind {
    /// Radix of the integer fields on the serial line
    pub fn radix(&self) -> u32 {
        match self {
            SensorKind::Pir => 2,
            SensorKind::Wheel => 10,
        }
    }

    /// Output file prefix used when none is given
    pub fn default_template(&self) -> &'static str {
        match self {
            SensorKind::Pir => "pir_n_",
            SensorKind::Wheel => "wheel_n_",
        }
    }

    /// Header row of the decoded text file
    pub fn csv_header(&self) -> [&'static str; 2] {
        match self {
            SensorKind::Pir => ["Time", "Status"],
            SensorKind::Wheel => ["time", "Status"],
        }
    }

    /// Whether readings are averaged over a bin window before being stored
    pub fn is_binned(&self) -> bool {
        matches!(self, SensorKind::Pir)
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pir" => Ok(SensorKind::Pir),
            "wheel" | "wheels" => Ok(SensorKind::Wheel),
            other => Err(format!("unknown sensor kind '{}' (expected 'pir' or 'wheel')", other)),
        }
    }
}
