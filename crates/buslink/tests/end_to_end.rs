use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use buslink::firmware::{
    DeviceIdentity, Firmware, FirmwareConfig, PeripheralBuilder, Registry, RegistryBuilder,
};
use buslink::host::{discover, negotiate, Device, Error};
use buslink::sim::{self, gpio};
use buslink::transport::{
    PacketTransport, StreamTransport, Transport, TransportConfig, TransportError,
};
use buslink::wire::{DeviceError, Limits, PeriphId, NUM_PERIPHERALS};

fn boot(registry: Registry) -> Firmware {
    Firmware::boot(registry).expect("firmware should boot")
}

fn demo_firmware() -> Firmware {
    boot(sim::demo(&FirmwareConfig::default()).expect("demo registry should build"))
}

fn usb_device(fw: &Firmware) -> Device {
    let (pipe, port) = sim::usb_link(64);
    let iface = buslink::firmware::PacketInterface::new("usb", port, &FirmwareConfig::default());
    fw.spawn(iface).expect("usb interface should start");
    Device::new(Box::new(PacketTransport::new(pipe)))
}

fn serial_device(fw: &Firmware) -> Device {
    let (port, iface) = sim::serial_link(&FirmwareConfig::default());
    fw.spawn(iface).expect("uart interface should start");
    Device::new(Box::new(
        StreamTransport::new(port).expect("stream transport should open"),
    ))
}

#[test]
fn echo_over_usb() {
    let fw = demo_firmware();
    let device = usb_device(&fw);
    let payload = device.echo(&[0x41, 0x42]).unwrap();
    assert_eq!(payload.as_ref(), &[0x41, 0x42]);
}

#[test]
fn echo_over_serial() {
    let fw = demo_firmware();
    let device = serial_device(&fw);
    let payload = device.echo(&[0x41, 0x42]).unwrap();
    assert_eq!(payload.as_ref(), &[0x41, 0x42]);
}

#[test]
fn echo_sizes_around_packet_boundaries() {
    let fw = demo_firmware();
    let usb = usb_device(&fw);
    let uart = serial_device(&fw);

    // 56 + 8 header = one full packet; 60 + 4 header = one full response packet.
    for len in [0usize, 1, 55, 56, 60, 119, 120, 124, 512] {
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        assert_eq!(usb.echo(&data).unwrap().as_ref(), &data[..], "usb len {len}");
        assert_eq!(uart.echo(&data).unwrap().as_ref(), &data[..], "uart len {len}");
    }
}

#[test]
fn unknown_class_is_not_supported_on_both_links() {
    let fw = demo_firmware();
    for device in [usb_device(&fw), serial_device(&fw)] {
        let err = device.call(NUM_PERIPHERALS, 0, 0, &[]).unwrap_err();
        assert!(matches!(err, Error::Device(DeviceError::NotSupported)));
        assert_eq!(err.retcode(), Some(DeviceError::NotSupported.code()));

        // The link stays usable after an error response.
        assert_eq!(device.echo(b"ok").unwrap().as_ref(), b"ok");
    }
}

#[test]
fn metadata_over_sim() {
    let fw = demo_firmware();
    let device = usb_device(&fw);

    assert_eq!(device.serial().unwrap(), "buslink-sim");
    assert_eq!(device.num_inst(PeriphId::Metadata.id()).unwrap(), 1);
    assert_eq!(
        device.num_inst(PeriphId::Gpio.id()).unwrap(),
        sim::DEMO_GPIO_PINS
    );
    assert_eq!(device.num_inst(PeriphId::Can.id()).unwrap(), 0);
    assert!(matches!(
        device.num_inst(NUM_PERIPHERALS),
        Err(Error::Device(DeviceError::NotSupported))
    ));
    assert!(matches!(
        device.custom(b"x"),
        Err(Error::Device(DeviceError::NotSupported))
    ));
}

#[test]
fn gpio_round_trip() {
    let fw = demo_firmware();
    let device = serial_device(&fw);
    let gpio_id = PeriphId::Gpio.id();

    device.call(gpio_id, 3, gpio::WRITE, &[1]).unwrap();
    assert_eq!(device.call(gpio_id, 3, gpio::READ, &[]).unwrap().as_ref(), &[1]);
    assert_eq!(device.call(gpio_id, 0, gpio::READ, &[]).unwrap().as_ref(), &[0]);

    let err = device.call(gpio_id, 3, gpio::WRITE, &[1, 2]).unwrap_err();
    assert!(matches!(err, Error::Device(DeviceError::InvalidArgsFormat)));
    let err = device.call(gpio_id, sim::DEMO_GPIO_PINS, gpio::READ, &[]).unwrap_err();
    assert!(matches!(err, Error::Device(DeviceError::NotSupported)));
}

#[test]
fn oversized_request_fails_locally() {
    let fw = demo_firmware();
    let device = usb_device(&fw);
    let err = device.echo(&[0u8; 513]).unwrap_err();
    assert!(matches!(err, Error::RequestTooLarge { size: 513, max: 512 }));
    assert_eq!(device.echo(b"still fine").unwrap().as_ref(), b"still fine");
}

#[test]
fn negotiation_reports_protocol_limits() {
    let fw = demo_firmware();
    let (pipe, port) = sim::usb_link(64);
    fw.spawn(buslink::firmware::PacketInterface::new(
        "usb",
        port,
        &FirmwareConfig::default(),
    ))
    .unwrap();
    let usb: Box<dyn Transport> = Box::new(PacketTransport::new(pipe));
    let unopened = TransportError::Open {
        target: "usb 001:009".to_string(),
        reason: "interface string mismatch".to_string(),
    };

    let devices = discover(vec![Ok(usb), Err(unopened)]);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].limits(), Limits::new(512, 512));

    let uart = serial_device(&fw);
    assert_eq!(negotiate(&uart).unwrap(), Limits::new(512, 512));
}

#[test]
fn concurrent_calls_on_one_device_are_serialized() {
    let fw = demo_firmware();
    let device = Arc::new(serial_device(&fw));

    let workers: Vec<_> = (0..2u8)
        .map(|worker| {
            let device = Arc::clone(&device);
            thread::spawn(move || {
                for round in 0..50u8 {
                    let data = vec![worker; 40 + usize::from(round)];
                    let echoed = device.echo(&data).expect("echo should succeed");
                    assert_eq!(echoed.as_ref(), &data[..]);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker should not panic");
    }
}

struct Concurrency {
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl Concurrency {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(15));
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn shared_controller_registry(stats: &Arc<Concurrency>) -> Registry {
    let can_stats = Arc::clone(stats);
    let can = PeripheralBuilder::new("can", 1)
        .identity(|_| Some(DeviceIdentity(7)))
        .function(move |_, _, _| {
            can_stats.enter();
            Ok(())
        })
        .build();
    let lin_stats = Arc::clone(stats);
    let lin = PeripheralBuilder::new("lin", 1)
        .identity(|_| Some(DeviceIdentity(7)))
        .function(move |_, _, _| {
            lin_stats.enter();
            Ok(())
        })
        .build();

    RegistryBuilder::new("shared")
        .peripheral(PeriphId::Can, can)
        .peripheral(PeriphId::Lin, lin)
        .build()
        .unwrap()
}

#[test]
fn shared_identity_never_runs_concurrently() {
    let stats = Concurrency::new();
    let fw = boot(shared_controller_registry(&stats));
    assert_eq!(
        fw.dispatcher().locks().slot(PeriphId::Can.id(), 0),
        fw.dispatcher().locks().slot(PeriphId::Lin.id(), 0)
    );

    let usb = usb_device(&fw);
    let uart = serial_device(&fw);

    let a = thread::spawn(move || {
        for _ in 0..8 {
            usb.call(PeriphId::Can.id(), 0, 0, &[]).unwrap();
        }
    });
    let b = thread::spawn(move || {
        for _ in 0..8 {
            uart.call(PeriphId::Lin.id(), 0, 0, &[]).unwrap();
        }
    });
    a.join().unwrap();
    b.join().unwrap();

    assert_eq!(stats.calls.load(Ordering::SeqCst), 16);
    assert_eq!(stats.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn firmware_thread_exits_when_host_drops_link() {
    let fw = demo_firmware();
    let (pipe, port) = sim::usb_link(64);
    let handle = fw
        .spawn(buslink::firmware::PacketInterface::new(
            "usb",
            port,
            &FirmwareConfig::default(),
        ))
        .unwrap();

    let device = Device::new(Box::new(PacketTransport::new(pipe)));
    device.echo(b"bye").unwrap();
    drop(device);

    handle.join().unwrap().unwrap();
}

#[test]
fn metadata_slot_cannot_be_replaced() {
    let err = RegistryBuilder::new("x")
        .peripheral(PeriphId::Metadata, PeripheralBuilder::new("fake", 1).build())
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("reserved"));
}

fn slow_registry(delay: Duration) -> Registry {
    let adc = PeripheralBuilder::new("adc", 1)
        .function(move |_, _, out| {
            thread::sleep(delay);
            out.extend_from_slice(b"STALE");
            Ok(())
        })
        .build();
    RegistryBuilder::new("slow")
        .peripheral(PeriphId::Adc, adc)
        .build()
        .unwrap()
}

fn impatient() -> TransportConfig {
    TransportConfig {
        timeout: Duration::from_millis(50),
        ..TransportConfig::default()
    }
}

fn late_response_goes_nowhere(device: &Device, link: &str) {
    let err = device.call(PeriphId::Adc.id(), 0, 0, &[]).unwrap_err();
    assert!(err.is_timeout(), "{link}: {err}");

    // Let the slow handler finish and its response land on the link.
    thread::sleep(Duration::from_millis(300));

    let payload = device.echo(b"ok").unwrap();
    assert_eq!(payload.as_ref(), b"ok", "{link}");
}

#[test]
fn late_response_is_not_returned_to_the_next_call_over_usb() {
    let fw = boot(slow_registry(Duration::from_millis(200)));
    let (pipe, port) = sim::usb_link(64);
    fw.spawn(buslink::firmware::PacketInterface::new(
        "usb",
        port,
        &FirmwareConfig::default(),
    ))
    .unwrap();
    let device = Device::new(Box::new(PacketTransport::with_config(pipe, impatient())));

    late_response_goes_nowhere(&device, "usb");
}

#[test]
fn late_response_is_not_returned_to_the_next_call_over_serial() {
    let fw = boot(slow_registry(Duration::from_millis(200)));
    let (port, iface) = sim::serial_link(&FirmwareConfig::default());
    fw.spawn(iface).unwrap();
    let device = Device::new(Box::new(
        StreamTransport::with_config(port, impatient()).unwrap(),
    ));

    late_response_goes_nowhere(&device, "uart");
}
