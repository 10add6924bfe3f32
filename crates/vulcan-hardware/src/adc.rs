//! Analog front-end: one RP2040 ADC input behind an external 16:1
//! multiplexer carrying the conditioned 0-5 V sensor lines.

use embassy_rp::adc::{Adc, Blocking, Channel, Error};
use embassy_rp::gpio::Output;
use vulcan_control::sensors::{AdcChannel, AnalogReader};

/// ADC settle time after switching the multiplexer, in core cycles.
const MUX_SETTLE_CYCLES: u32 = 250;

pub struct AdcFrontEnd {
    adc: Adc<'static, Blocking>,
    input: Channel<'static>,
    select: [Output<'static>; 4],
}

impl AdcFrontEnd {
    pub fn new(
        adc: Adc<'static, Blocking>,
        input: Channel<'static>,
        select: [Output<'static>; 4],
    ) -> Self {
        Self { adc, input, select }
    }

    fn select(&mut self, channel: AdcChannel) {
        let code = mux_code(channel);
        for (bit, pin) in self.select.iter_mut().enumerate() {
            if code & (1 << bit) != 0 {
                pin.set_high();
            } else {
                pin.set_low();
            }
        }
        cortex_m::asm::delay(MUX_SETTLE_CYCLES);
    }

    fn read_raw(&mut self) -> Result<u16, Error> {
        self.adc.blocking_read(&mut self.input)
    }
}

impl AnalogReader for AdcFrontEnd {
    fn read(&mut self, channel: AdcChannel) -> f32 {
        self.select(channel);
        match self.read_raw() {
            // 12-bit conversion to the fraction of full scale.
            Ok(raw) => raw as f32 / 4095.0,
            // A failed conversion reads as rail-low; the range checks
            // downstream turn that into the matching sensor fault.
            Err(_) => 0.0,
        }
    }
}

fn mux_code(channel: AdcChannel) -> u8 {
    match channel {
        AdcChannel::Tps1 => 0,
        AdcChannel::Tps2 => 1,
        AdcChannel::Map => 2,
        AdcChannel::Iat => 3,
        AdcChannel::Clt => 4,
        AdcChannel::FuelPressure => 5,
        AdcChannel::FuelLevel => 6,
        AdcChannel::OilPressure => 7,
        AdcChannel::Baro => 8,
        AdcChannel::WidebandO2 => 9,
        AdcChannel::FlexFuel => 10,
        AdcChannel::BatteryVolts => 11,
        AdcChannel::Maf => 12,
    }
}
