//! Analog acquisition, engineering-unit conversion and filtering.

use crate::filter::{LowPassFilter, MovingAverage};
use crate::state::SensorSnapshot;
use libm::{fabsf, logf};
use vulcan_config::*;

/// Logical analog channels the board routes to the ADC front-end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChannel {
    Tps1,
    Tps2,
    Map,
    Iat,
    Clt,
    FuelPressure,
    FuelLevel,
    OilPressure,
    Baro,
    WidebandO2,
    FlexFuel,
    BatteryVolts,
    Maf,
}

/// Sampling capability supplied by the board layer.
pub trait AnalogReader {
    /// Sample a channel, returning the fraction of full scale (0.0..=1.0).
    fn read(&mut self, channel: AdcChannel) -> f32;
}

impl<T: AnalogReader + ?Sized> AnalogReader for &mut T {
    fn read(&mut self, channel: AdcChannel) -> f32 {
        (**self).read(channel)
    }
}

/// Pedal switches, sampled by the caller alongside the analog channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalInputs {
    pub brake_pedal: bool,
    pub clutch_pedal: bool,
}

/// Pipeline-level plausibility findings for the current cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorFaults {
    /// Dual TPS channels disagree beyond the plausibility window.
    pub tps_disagree: bool,
}

pub fn analog_percentage(fraction: f32, min_volts: f32, max_volts: f32) -> f32 {
    let volts = fraction.clamp(0.0, 1.0) * SENSOR_VREF;
    let pct = (volts - min_volts) / (max_volts - min_volts) * 100.0;
    pct.clamp(0.0, 100.0)
}

pub fn pressure_kpa(fraction: f32, min_kpa: f32, max_kpa: f32) -> f32 {
    let pressure = min_kpa + fraction.clamp(0.0, 1.0) * (max_kpa - min_kpa);
    pressure.clamp(min_kpa, max_kpa)
}

/// NTC thermistor behind a pullup divider, linearized with Steinhart-Hart.
pub fn ntc_temperature_c(fraction: f32) -> f32 {
    let volts = fraction.clamp(0.0, 1.0) * SENSOR_VREF;
    let resistance = (SENSOR_VREF - volts) * NTC_PULLUP_OHMS / volts;

    let ln_r = logf(resistance);
    let inv_t = STEINHART_A + STEINHART_B * ln_r + STEINHART_C * ln_r * ln_r * ln_r;
    let celsius = 1.0 / inv_t - 273.15;
    if celsius.is_finite() {
        celsius.clamp(TEMP_MIN_C, TEMP_MAX_C)
    } else {
        TEMP_MIN_C
    }
}

/// Wideband O2 controllers report AFR 10-20 across the full output swing.
pub fn wideband_afr(fraction: f32) -> f32 {
    AFR_MIN + fraction.clamp(0.0, 1.0) * (AFR_MAX - AFR_MIN)
}

pub fn flex_fuel_pct(fraction: f32) -> f32 {
    fraction.clamp(0.0, 1.0) * 100.0
}

pub fn battery_volts(fraction: f32) -> f32 {
    fraction.clamp(0.0, 1.0) * SENSOR_VREF * VBATT_DIVIDER_RATIO
}

/// Turns raw channel samples into one consistent [`SensorSnapshot`] per cycle.
pub struct SensorPipeline<A: AnalogReader> {
    adc: A,
    maf_fitted: bool,

    tps: LowPassFilter,
    map: LowPassFilter,
    iat: LowPassFilter,
    clt: LowPassFilter,
    vbatt: MovingAverage<VBATT_AVG_SAMPLES>,

    last_good_tps: f32,
    faults: SensorFaults,
    baro_kpa: f32,
    last_baro_us: Option<u64>,
}

impl<A: AnalogReader> SensorPipeline<A> {
    pub fn new(adc: A) -> Self {
        Self {
            adc,
            maf_fitted: false,
            tps: LowPassFilter::new(FILTER_ALPHA),
            map: LowPassFilter::new(FILTER_ALPHA),
            iat: LowPassFilter::new(FILTER_ALPHA),
            clt: LowPassFilter::new(FILTER_ALPHA),
            vbatt: MovingAverage::new(),
            last_good_tps: 0.0,
            faults: SensorFaults::default(),
            baro_kpa: 101.3,
            last_baro_us: None,
        }
    }

    pub fn with_maf(adc: A) -> Self {
        let mut pipeline = Self::new(adc);
        pipeline.maf_fitted = true;
        pipeline
    }

    /// Sample every channel and publish the cycle's snapshot.
    pub fn sample(&mut self, now_us: u64, digital: DigitalInputs) -> SensorSnapshot {
        let tps_raw = self.read_dual_tps();
        let tps = self.tps.update(tps_raw);

        let map_raw = pressure_kpa(self.adc.read(AdcChannel::Map), MAP_MIN_KPA, MAP_MAX_KPA);
        let map = self.map.update(map_raw);

        let iat = self.iat.update(ntc_temperature_c(self.adc.read(AdcChannel::Iat)));
        let clt = self.clt.update(ntc_temperature_c(self.adc.read(AdcChannel::Clt)));

        if self
            .last_baro_us
            .is_none_or(|last| now_us.saturating_sub(last) >= BARO_RESAMPLE_US)
        {
            self.baro_kpa =
                pressure_kpa(self.adc.read(AdcChannel::Baro), BARO_MIN_KPA, BARO_MAX_KPA);
            self.last_baro_us = Some(now_us);
        }

        let maf_g_s = if self.maf_fitted {
            Some(self.adc.read(AdcChannel::Maf).clamp(0.0, 1.0) * MAF_FULL_SCALE_G_S)
        } else {
            None
        };

        SensorSnapshot {
            tps_pct: tps,
            map_kpa: map,
            iat_c: iat,
            clt_c: clt,
            baro_kpa: self.baro_kpa,
            fuel_pressure_kpa: pressure_kpa(
                self.adc.read(AdcChannel::FuelPressure),
                0.0,
                FUEL_PRESSURE_MAX_KPA,
            ),
            fuel_level_pct: analog_percentage(
                self.adc.read(AdcChannel::FuelLevel),
                TPS_MIN_VOLTS,
                TPS_MAX_VOLTS,
            ),
            oil_pressure_kpa: pressure_kpa(
                self.adc.read(AdcChannel::OilPressure),
                0.0,
                OIL_PRESSURE_MAX_KPA,
            ),
            afr: wideband_afr(self.adc.read(AdcChannel::WidebandO2)),
            ethanol_pct: flex_fuel_pct(self.adc.read(AdcChannel::FlexFuel)),
            maf_g_s,
            battery_v: self
                .vbatt
                .update(battery_volts(self.adc.read(AdcChannel::BatteryVolts))),
            vss_kmh: 0.0,
            brake_pedal: digital.brake_pedal,
            clutch_pedal: digital.clutch_pedal,
        }
    }

    pub fn faults(&self) -> SensorFaults {
        self.faults
    }

    /// Average the redundant TPS channels; on disagreement hold the last
    /// plausible value and flag the fault.
    fn read_dual_tps(&mut self) -> f32 {
        let tps1 = analog_percentage(self.adc.read(AdcChannel::Tps1), TPS_MIN_VOLTS, TPS_MAX_VOLTS);
        let tps2 = analog_percentage(self.adc.read(AdcChannel::Tps2), TPS_MIN_VOLTS, TPS_MAX_VOLTS);

        if fabsf(tps1 - tps2) > TPS_DISAGREE_LIMIT_PCT {
            self.faults.tps_disagree = true;
            self.last_good_tps
        } else {
            self.faults.tps_disagree = false;
            self.last_good_tps = (tps1 + tps2) / 2.0;
            self.last_good_tps
        }
    }
}
