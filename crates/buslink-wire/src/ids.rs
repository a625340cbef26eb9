//! Peripheral-class ids and metadata function ids.
//!
//! Class ids index the firmware registry; ids without hardware behind them
//! report an instance count of zero.

/// Number of peripheral classes known to this protocol revision.
pub const NUM_PERIPHERALS: u16 = 10;

/// Peripheral class selected by `periph_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PeriphId {
    Metadata = 0,
    Can = 1,
    I2c = 2,
    Gpio = 3,
    Pwm = 4,
    Adc = 5,
    Dac = 6,
    Spi = 7,
    Uart = 8,
    Lin = 9,
}

impl PeriphId {
    /// All classes in id order.
    pub const ALL: [PeriphId; NUM_PERIPHERALS as usize] = [
        PeriphId::Metadata,
        PeriphId::Can,
        PeriphId::I2c,
        PeriphId::Gpio,
        PeriphId::Pwm,
        PeriphId::Adc,
        PeriphId::Dac,
        PeriphId::Spi,
        PeriphId::Uart,
        PeriphId::Lin,
    ];

    /// Raw wire value.
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Look up a class by raw id.
    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Short lowercase name, as used in logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            PeriphId::Metadata => "metadata",
            PeriphId::Can => "can",
            PeriphId::I2c => "i2c",
            PeriphId::Gpio => "gpio",
            PeriphId::Pwm => "pwm",
            PeriphId::Adc => "adc",
            PeriphId::Dac => "dac",
            PeriphId::Spi => "spi",
            PeriphId::Uart => "uart",
            PeriphId::Lin => "lin",
        }
    }
}

impl From<PeriphId> for u16 {
    fn from(id: PeriphId) -> Self {
        id.id()
    }
}

/// Function ids of the metadata class (always class 0, one instance).
pub mod metadata {
    /// Serial string of the device (UTF-8, empty request).
    pub const SERIAL: u16 = 0;
    /// Instance count of a class (`u16` request, `u16` response).
    pub const NUM_INST: u16 = 1;
    /// Returns the request payload unchanged.
    pub const ECHO: u16 = 2;
    /// Largest request payload the device accepts (`u16` response).
    pub const REQ_MAX_SIZE: u16 = 3;
    /// Largest response payload the device produces (`u16` response).
    pub const RESP_MAX_SIZE: u16 = 4;
    /// Application-defined hook.
    pub const CUSTOM: u16 = 5;

    /// Number of metadata functions.
    pub const NUM_FUNCTIONS: u16 = 6;
}
