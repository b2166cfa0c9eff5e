use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// The five externally supplied inputs of the lightning effect.
///
/// `hue` is in degrees and is converted to RGB inside the fragment shader.
/// The remaining values are unitless scale factors. Nothing here is clamped:
/// out-of-range values are forwarded to the GPU verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightningParams {
    pub hue: f32,
    pub x_offset: f32,
    pub speed: f32,
    pub intensity: f32,
    pub size: f32,
}

impl Default for LightningParams {
    fn default() -> Self {
        Self {
            hue: 230.0,
            x_offset: 0.0,
            speed: 1.0,
            intensity: 1.0,
            size: 1.0,
        }
    }
}

impl LightningParams {
    /// Bitwise identity across all five values.
    ///
    /// Unlike `==`, a NaN is identical to itself and `0.0` differs from `-0.0`.
    pub fn same_as(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }

    fn bits(&self) -> [u32; 5] {
        [
            self.hue.to_bits(),
            self.x_offset.to_bits(),
            self.speed.to_bits(),
            self.intensity.to_bits(),
            self.size.to_bits(),
        ]
    }
}

/// Single-threaded cell shared between the host UI (writer) and the driver
/// (reader). A read always observes the most recent write.
#[derive(Debug, Clone, Default)]
pub struct SharedParams(Rc<Cell<LightningParams>>);

impl SharedParams {
    pub fn new(params: LightningParams) -> Self {
        Self(Rc::new(Cell::new(params)))
    }

    pub fn get(&self) -> LightningParams {
        self.0.get()
    }

    pub fn set(&self, params: LightningParams) {
        self.0.set(params);
    }

    pub fn update(&self, f: impl FnOnce(&mut LightningParams)) {
        let mut params = self.0.get();
        f(&mut params);
        self.0.set(params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let params = LightningParams::default();
        assert_eq!(params.hue, 230.0);
        assert_eq!(params.x_offset, 0.0);
        assert_eq!(params.speed, 1.0);
        assert_eq!(params.intensity, 1.0);
        assert_eq!(params.size, 1.0);
    }

    #[test]
    fn identity_treats_nan_as_equal_and_signed_zero_as_distinct() {
        let nan = LightningParams {
            speed: f32::NAN,
            ..LightningParams::default()
        };
        assert!(nan.same_as(&nan));
        assert_ne!(nan, nan);

        let negative_zero = LightningParams {
            x_offset: -0.0,
            ..LightningParams::default()
        };
        assert!(!negative_zero.same_as(&LightningParams::default()));
    }

    #[test]
    fn partial_toml_table_falls_back_to_defaults() {
        let params: LightningParams = toml::from_str("speed = 1.6\nsize = 2.0").unwrap();
        assert_eq!(params.speed, 1.6);
        assert_eq!(params.size, 2.0);
        assert_eq!(params.hue, 230.0);
        assert_eq!(params.intensity, 1.0);
    }

    #[test]
    fn shared_cell_reflects_latest_write() {
        let shared = SharedParams::default();
        let reader = shared.clone();
        shared.update(|params| params.hue = 12.0);
        assert_eq!(reader.get().hue, 12.0);
        shared.set(LightningParams {
            intensity: 0.25,
            ..LightningParams::default()
        });
        assert_eq!(reader.get().intensity, 0.25);
        assert_eq!(reader.get().hue, 230.0);
    }
}
