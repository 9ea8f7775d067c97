/// Fixed physical constants of the syrinx, trachea and upper vocal tract.
///
/// Shared read-only by every simulation. Tables are keyed by species or
/// individual and stored as JSON:
///
/// ```text
/// { "zonotrichia": { "speed_of_sound": 343.0, "trachea_length": 0.02, ... } }
/// ```
///
/// Units:
///   c  [m/s]          speed of sound in the trachea
///   L  [m]            trachea length
///   r  [-]            reflection coefficient at the tracheal end
///   Ch [m^3/Pa]       oropharyngeal-esophageal cavity (OEC) compliance
///   MG [kg/m^4]       glottis inertance
///   MB [kg/m^4]       beak inertance
///   RB [kg/(m^4 s)]   beak resistance
///   Rh [kg/(m^4 s)]   OEC resistance

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyrinxError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    pub speed_of_sound: f64,
    pub trachea_length: f64,
    pub reflection: f64,
    pub oec_compliance: f64,
    pub glottis_inertance: f64,
    pub beak_inertance: f64,
    pub beak_resistance: f64,
    pub oec_resistance: f64,
}

impl PhysicalConstants {
    /// Round-trip tracheal delay in integration steps, `round(L / c / dt)`.
    pub fn delay_steps(&self, dt: f64) -> usize {
        (self.trachea_length / self.speed_of_sound / dt).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("speed_of_sound", self.speed_of_sound),
            ("oec_compliance", self.oec_compliance),
            ("glottis_inertance", self.glottis_inertance),
            ("beak_inertance", self.beak_inertance),
        ];
        for (name, v) in positive {
            if !(v.is_finite() && v > 0.0) {
                return Err(SyrinxError::InvalidConfig(format!(
                    "{name} must be positive, got {v}"
                )));
            }
        }
        let non_negative = [
            ("trachea_length", self.trachea_length),
            ("beak_resistance", self.beak_resistance),
            ("oec_resistance", self.oec_resistance),
        ];
        for (name, v) in non_negative {
            if !(v.is_finite() && v >= 0.0) {
                return Err(SyrinxError::InvalidConfig(format!(
                    "{name} must be non-negative, got {v}"
                )));
            }
        }
        if !self.reflection.is_finite() || self.reflection.abs() > 1.0 {
            return Err(SyrinxError::InvalidConfig(format!(
                "reflection coefficient must lie in [-1, 1], got {}",
                self.reflection
            )));
        }
        Ok(())
    }
}

impl Default for PhysicalConstants {
    /// Typical small-passerine values (Perl, Arneodo, Mindlin lumped model).
    fn default() -> Self {
        Self {
            speed_of_sound: 343.0,
            trachea_length: 0.02,
            reflection: 0.1,
            oec_compliance: 1.43e-10,
            glottis_inertance: 20.0,
            beak_inertance: 1e4,
            beak_resistance: 5e6,
            oec_resistance: 24e3,
        }
    }
}

/// Constants for several birds, keyed by species or individual.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstantsTable {
    entries: BTreeMap<String, PhysicalConstants>,
}

impl ConstantsTable {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)?;
        for c in table.entries.values() {
            c.validate()?;
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: impl Into<String>, constants: PhysicalConstants) {
        self.entries.insert(key.into(), constants);
    }

    pub fn get(&self, key: &str) -> Result<PhysicalConstants> {
        self.entries
            .get(key)
            .copied()
            .ok_or_else(|| SyrinxError::MissingConstants(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_steps() {
        let c = PhysicalConstants::default();
        // 0.02 m / 343 m/s = 58.3 us; at 20x 44.1 kHz dt = 1.134 us -> 51.4 steps
        let dt = 1.0 / (20.0 * 44100.0);
        assert_eq!(c.delay_steps(dt), 51);

        let zero = PhysicalConstants {
            trachea_length: 0.0,
            ..c
        };
        assert_eq!(zero.delay_steps(dt), 0);
    }

    #[test]
    fn test_table_lookup() {
        let json = r#"{
            "zonotrichia": {
                "speed_of_sound": 343.0, "trachea_length": 0.035, "reflection": 0.2,
                "oec_compliance": 1.43e-10, "glottis_inertance": 20.0, "beak_inertance": 1e4,
                "beak_resistance": 5e6, "oec_resistance": 24e3
            }
        }"#;
        let table = ConstantsTable::from_json(json).unwrap();
        let c = table.get("zonotrichia").unwrap();
        assert_eq!(c.trachea_length, 0.035);
        assert!(matches!(
            table.get("taeniopygia"),
            Err(SyrinxError::MissingConstants(_))
        ));
    }

    #[test]
    fn test_table_built_in_code_round_trips() {
        let mut table = ConstantsTable::default();
        table.insert("zonotrichia", PhysicalConstants::default());
        table.insert(
            "taeniopygia",
            PhysicalConstants {
                trachea_length: 0.03,
                ..Default::default()
            },
        );
        assert_eq!(table.keys().collect::<Vec<_>>(), ["taeniopygia", "zonotrichia"]);

        let json = serde_json::to_string(&table).unwrap();
        let back = ConstantsTable::from_json(&json).unwrap();
        assert_eq!(back.get("taeniopygia").unwrap().trachea_length, 0.03);
        assert_eq!(back.get("zonotrichia").unwrap(), PhysicalConstants::default());
    }

    #[test]
    fn test_rejects_bad_reflection() {
        let c = PhysicalConstants {
            reflection: 1.5,
            ..Default::default()
        };
        assert!(c.validate().is_err());
        assert!(PhysicalConstants::default().validate().is_ok());
    }
}
