use std::fmt;

use buslink_wire::{DeviceError, Limits, PeriphId, NUM_PERIPHERALS};

use crate::config::FirmwareConfig;
use crate::error::BootError;
use crate::metadata;

/// Handler for one peripheral function.
///
/// Called with the instance index and the request payload; writes its
/// response payload into the buffer. Any bytes written are discarded when it
/// returns an error.
pub type Handler = Box<dyn Fn(u16, &[u8], &mut Vec<u8>) -> Result<(), DeviceError> + Send + Sync>;

type InitFn = Box<dyn Fn(u16) -> Result<(), DeviceError> + Send + Sync>;
type IdentityFn = Box<dyn Fn(u16) -> Option<DeviceIdentity> + Send + Sync>;

/// Stable identity of a physical controller.
///
/// Instances reporting equal identities share one lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIdentity(pub u32);

/// A peripheral class: instances, their physical identities and a function table.
pub trait Peripheral: Send + Sync {
    fn name(&self) -> &str;

    fn instance_count(&self) -> u16;

    /// Bring up one instance at boot.
    fn init(&self, _idx: u16) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Physical controller behind an instance. `None` gives the instance a
    /// lock of its own.
    fn device_identity(&self, _idx: u16) -> Option<DeviceIdentity> {
        None
    }

    /// Handlers indexed by function id.
    fn functions(&self) -> &[Handler];
}

/// Closure-assembled peripheral class.
pub struct PeripheralBuilder {
    name: String,
    instances: u16,
    init: Option<InitFn>,
    identity: Option<IdentityFn>,
    functions: Vec<Handler>,
}

impl PeripheralBuilder {
    pub fn new(name: impl Into<String>, instances: u16) -> Self {
        Self {
            name: name.into(),
            instances,
            init: None,
            identity: None,
            functions: Vec::new(),
        }
    }

    pub fn on_init<F>(mut self, init: F) -> Self
    where
        F: Fn(u16) -> Result<(), DeviceError> + Send + Sync + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    pub fn identity<F>(mut self, identity: F) -> Self
    where
        F: Fn(u16) -> Option<DeviceIdentity> + Send + Sync + 'static,
    {
        self.identity = Some(Box::new(identity));
        self
    }

    /// Append a handler. Function ids follow insertion order.
    pub fn function<F>(mut self, handler: F) -> Self
    where
        F: Fn(u16, &[u8], &mut Vec<u8>) -> Result<(), DeviceError> + Send + Sync + 'static,
    {
        self.functions.push(Box::new(handler));
        self
    }

    pub fn build(self) -> ClassPeripheral {
        ClassPeripheral {
            name: self.name,
            instances: self.instances,
            init: self.init,
            identity: self.identity,
            functions: self.functions,
        }
    }
}

/// Peripheral produced by [`PeripheralBuilder`].
pub struct ClassPeripheral {
    name: String,
    instances: u16,
    init: Option<InitFn>,
    identity: Option<IdentityFn>,
    functions: Vec<Handler>,
}

impl Peripheral for ClassPeripheral {
    fn name(&self) -> &str {
        &self.name
    }

    fn instance_count(&self) -> u16 {
        self.instances
    }

    fn init(&self, idx: u16) -> Result<(), DeviceError> {
        match &self.init {
            Some(init) => init(idx),
            None => Ok(()),
        }
    }

    fn device_identity(&self, idx: u16) -> Option<DeviceIdentity> {
        self.identity.as_ref().and_then(|identity| identity(idx))
    }

    fn functions(&self) -> &[Handler] {
        &self.functions
    }
}

/// Placeholder for a class with no hardware behind it.
pub struct Vacant {
    name: &'static str,
}

impl Vacant {
    pub fn new(id: PeriphId) -> Self {
        Self { name: id.name() }
    }
}

impl Peripheral for Vacant {
    fn name(&self) -> &str {
        self.name
    }

    fn instance_count(&self) -> u16 {
        0
    }

    fn functions(&self) -> &[Handler] {
        &[]
    }
}

/// Immutable map from peripheral-class id to peripheral.
pub struct Registry {
    classes: Vec<Box<dyn Peripheral>>,
    limits: Limits,
}

impl Registry {
    pub fn builder(serial: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(serial)
    }

    pub fn get(&self, periph_id: u16) -> Option<&dyn Peripheral> {
        self.classes.get(usize::from(periph_id)).map(|p| p.as_ref())
    }

    /// Classes in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &dyn Peripheral)> + '_ {
        (0u16..).zip(self.classes.iter().map(|p| p.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Payload limits advertised by the metadata peripheral.
    pub fn limits(&self) -> Limits {
        self.limits
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.iter()
                    .map(|(id, p)| (id, p.name().to_string(), p.instance_count())),
            )
            .finish()
    }
}

/// Collects peripheral classes and installs the metadata peripheral at id 0.
pub struct RegistryBuilder {
    serial: String,
    limits: Limits,
    custom: Option<Handler>,
    slots: Vec<Option<Box<dyn Peripheral>>>,
    reserved: Option<u16>,
}

impl RegistryBuilder {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            limits: Limits::default(),
            custom: None,
            slots: (0..NUM_PERIPHERALS).map(|_| None).collect(),
            reserved: None,
        }
    }

    pub fn from_config(config: &FirmwareConfig) -> Self {
        Self::new(config.serial.clone()).limits(config.limits)
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Install the application hook answering metadata function `custom`.
    pub fn custom<F>(mut self, handler: F) -> Self
    where
        F: Fn(u16, &[u8], &mut Vec<u8>) -> Result<(), DeviceError> + Send + Sync + 'static,
    {
        self.custom = Some(Box::new(handler));
        self
    }

    /// Place a peripheral in its class slot, replacing any earlier one.
    pub fn peripheral(mut self, id: PeriphId, peripheral: impl Peripheral + 'static) -> Self {
        if id == PeriphId::Metadata {
            self.reserved = Some(id.id());
        } else {
            self.slots[usize::from(id.id())] = Some(Box::new(peripheral));
        }
        self
    }

    pub fn build(self) -> Result<Registry, BootError> {
        if let Some(id) = self.reserved {
            return Err(BootError::ReservedClass(id));
        }

        let mut classes: Vec<Box<dyn Peripheral>> = self
            .slots
            .into_iter()
            .zip(PeriphId::ALL)
            .skip(1)
            .map(|(slot, id)| slot.unwrap_or_else(|| Box::new(Vacant::new(id))))
            .collect();

        let mut counts = vec![1u16];
        counts.extend(classes.iter().map(|p| p.instance_count()));

        let meta = metadata::peripheral(self.serial, self.limits, counts, self.custom);
        classes.insert(0, Box::new(meta));

        Ok(Registry {
            classes,
            limits: self.limits,
        })
    }
}
