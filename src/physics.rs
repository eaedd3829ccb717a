//! Lumped thermal model of the vacuum can.
//!
//! The can exchanges heat with the room through its insulation and receives a
//! heater input `H`:
//!
//! ```text
//! dT/dt = -k A (T - T_amb(t)) / (d m C) + H / (m C)
//! ```
//!
//! `T_amb` oscillates sinusoidally around a baseline. The equation is
//! integrated with classical fixed-step RK4; the heater input is held constant
//! over one control interval and the ambient term is evaluated in closed form at
//! every stage.

use std::f64::consts::TAU;

use crate::config::ChamberConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ChamberModel {
    conductivity: f64,
    area: f64,
    thickness: f64,
    mass: f64,
    heat_capacity: f64,
    ambient_baseline: f64,
    ambient_amplitude: f64,
    ambient_period: f64,
}

impl ChamberModel {
    pub fn from_config(config: &ChamberConfig) -> Self {
        Self {
            conductivity: config.conductivity,
            area: config.area,
            thickness: config.thickness,
            mass: config.mass,
            heat_capacity: config.heat_capacity,
            ambient_baseline: config.ambient_baseline,
            ambient_amplitude: config.ambient_amplitude,
            ambient_period: config.ambient_period,
        }
    }

    /// Room temperature at `t` seconds.
    pub fn ambient(&self, t: f64) -> f64 {
        if self.ambient_period <= 0.0 {
            return self.ambient_baseline;
        }
        self.ambient_baseline + self.ambient_amplitude * (TAU * t / self.ambient_period).sin()
    }

    /// Rate at which the can relaxes toward ambient (1/s).
    pub fn loss_rate(&self) -> f64 {
        self.conductivity * self.area / (self.thickness * self.mass * self.heat_capacity)
    }

    pub fn derivative(&self, temperature: f64, t: f64, heat_input: f64) -> f64 {
        -self.loss_rate() * (temperature - self.ambient(t))
            + heat_input / (self.mass * self.heat_capacity)
    }

    /// Temperature the can settles at for a constant ambient and heater input.
    pub fn equilibrium(&self, ambient: f64, heat_input: f64) -> f64 {
        ambient + heat_input * self.thickness / (self.conductivity * self.area)
    }

    /// Advance `temperature` from `t0` by `interval` seconds using `substeps`
    /// RK4 steps.
    pub fn integrate(
        &self,
        temperature: f64,
        t0: f64,
        interval: f64,
        heat_input: f64,
        substeps: usize,
    ) -> Result<f64> {
        let substeps = substeps.max(1);
        let h = interval / substeps as f64;
        let mut temp = temperature;
        let mut t = t0;

        for _ in 0..substeps {
            let k1 = self.derivative(temp, t, heat_input);
            let k2 = self.derivative(temp + 0.5 * h * k1, t + 0.5 * h, heat_input);
            let k3 = self.derivative(temp + 0.5 * h * k2, t + 0.5 * h, heat_input);
            let k4 = self.derivative(temp + h * k3, t + h, heat_input);
            temp += h / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
            t += h;

            if !temp.is_finite() {
                return Err(Error::NumericalDivergence { temperature: temp });
            }
        }

        Ok(temp)
    }
}
