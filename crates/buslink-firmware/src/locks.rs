use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

use crate::registry::{DeviceIdentity, Registry};

/// One lock per physical device, addressed by class id and instance index.
///
/// Built once from the registry. Instances whose peripherals report the same
/// [`DeviceIdentity`] map to the same slot. Instances without an identity get
/// a slot of their own.
pub struct LockTable {
    locks: Vec<Mutex<()>>,
    slots: Vec<Vec<usize>>,
}

impl LockTable {
    pub fn build(registry: &Registry) -> Self {
        let mut locks = Vec::new();
        let mut by_identity: HashMap<DeviceIdentity, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(registry.len());

        for (_, periph) in registry.iter() {
            let class_slots: Vec<usize> = (0..periph.instance_count())
                .map(|idx| {
                    let fresh = locks.len();
                    let slot = match periph.device_identity(idx) {
                        Some(identity) => *by_identity.entry(identity).or_insert(fresh),
                        None => fresh,
                    };
                    if slot == fresh {
                        locks.push(Mutex::new(()));
                    }
                    slot
                })
                .collect();
            slots.push(class_slots);
        }

        Self { locks, slots }
    }

    /// Lock slot of an instance.
    pub fn slot(&self, periph_id: u16, periph_idx: u16) -> Option<usize> {
        self.slots
            .get(usize::from(periph_id))?
            .get(usize::from(periph_idx))
            .copied()
    }

    /// Block until the instance's device lock is held.
    pub fn lock(&self, periph_id: u16, periph_idx: u16) -> Option<MutexGuard<'_, ()>> {
        let slot = self.slot(periph_id, periph_idx)?;
        Some(self.locks[slot].lock())
    }

    /// Number of distinct locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
