//! FT245BM device access over nusb

use std::time::Duration;

use bsusb_core::driver::{Direction, RequestKind};
use bsusb_core::{
    BitMode, BoxConfig, ControlRequest, DeviceDescriptor, DriverError, DriverErrorKind,
    UsbContext, UsbDriver,
};
use nusb::transfer::{Buffer, Bulk, ControlIn, ControlOut, ControlType, Out, Recipient};
use nusb::{DeviceInfo, Endpoint, MaybeFuture};

use crate::error::{timeout, transfer_error, usb_error};
use crate::protocol::*;

/// Finds trigger boxes on the host's USB buses
#[derive(Debug, Default)]
pub struct Ft245Driver;

impl Ft245Driver {
    /// Create the driver
    pub fn new() -> Self {
        Self
    }
}

impl UsbDriver for Ft245Driver {
    type Device = DeviceInfo;
    type Context = Ft245Context;

    fn name(&self) -> &'static str {
        "ftdi"
    }

    fn find_all(&mut self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>, DriverError> {
        let devices = nusb::list_devices()
            .wait()
            .map_err(|e| usb_error("Failed to list USB devices", e))?
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .collect();
        Ok(devices)
    }

    fn describe(&self, device: &DeviceInfo) -> DeviceDescriptor {
        DeviceDescriptor {
            bus_id: device.bus_id().to_string(),
            address: device.device_address(),
            vendor_id: device.vendor_id(),
            product_id: device.product_id(),
            serial: device.serial_number().map(str::to_string),
            product: device.product_string().map(str::to_string),
        }
    }

    fn new_context(&mut self, config: &BoxConfig) -> Result<Ft245Context, DriverError> {
        Ok(Ft245Context {
            handle: None,
            write_timeout: config.write_timeout,
        })
    }
}

struct Handle {
    interface: nusb::Interface,
    out_ep: Endpoint<Bulk, Out>,
}

/// Per-device state of an FT245BM
pub struct Ft245Context {
    handle: Option<Handle>,
    write_timeout: Duration,
}

impl Ft245Context {
    fn handle(&mut self) -> Result<&mut Handle, DriverError> {
        self.handle.as_mut().ok_or_else(DriverError::not_open)
    }

    /// Vendor OUT request addressed to interface A
    fn sio_out(&mut self, request: u8, value: u16) -> Result<(), DriverError> {
        let handle = self.handle()?;
        handle
            .interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request,
                    value,
                    index: USB_INDEX,
                    data: &[],
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| transfer_error("Control transfer failed", e))
    }

    /// Cancel whatever is still queued on the OUT endpoint and reap it
    fn drain(handle: &mut Handle) {
        handle.out_ep.cancel_all();
        while handle.out_ep.pending() > 0 {
            if handle.out_ep.wait_next_complete(CANCEL_TIMEOUT).is_none() {
                log::warn!("Cancelled USB write did not complete");
                break;
            }
        }
    }
}

impl UsbContext for Ft245Context {
    type Device = DeviceInfo;

    fn open(&mut self, device_info: &DeviceInfo) -> Result<(), DriverError> {
        if self.handle.is_some() {
            return Err(DriverError::new(
                DriverErrorKind::Busy,
                "context already holds a device",
            ));
        }

        log::info!(
            "Opening FT245BM at bus {} address {}",
            device_info.bus_id(),
            device_info.device_address()
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| usb_error("Failed to open device", e))?;

        let interface = device
            .detach_and_claim_interface(INTERFACE)
            .wait()
            .map_err(|e| usb_error("Failed to claim interface", e))?;

        let out_ep = interface
            .endpoint::<Bulk, Out>(WRITE_EP)
            .map_err(|e| usb_error("Failed to open bulk OUT endpoint", e))?;

        self.handle = Some(Handle { interface, out_ep });
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        log::debug!("FT245BM: SIO reset");
        self.sio_out(SIO_RESET_REQUEST, SIO_RESET_SIO)
    }

    fn set_bitmode(&mut self, mask: u8, mode: BitMode) -> Result<(), DriverError> {
        log::debug!("FT245BM: bitmode {} mask 0x{:02x}", mode, mask);
        self.sio_out(SIO_SET_BITMODE_REQUEST, bitmode_value(mode.as_raw(), mask))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, DriverError> {
        let write_timeout = self.write_timeout;
        let handle = self.handle()?;
        let mut written = 0;

        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            handle.out_ep.submit(Buffer::from(chunk.to_vec()));

            let completion = match handle.out_ep.wait_next_complete(write_timeout) {
                Some(c) => c,
                None => {
                    Self::drain(handle);
                    return Err(timeout("USB write"));
                }
            };
            completion
                .status
                .map_err(|e| transfer_error("USB write failed", e))?;

            written += completion.actual_len;
            if completion.actual_len < chunk.len() {
                log::warn!(
                    "Short USB write: {} of {} bytes",
                    completion.actual_len,
                    chunk.len()
                );
                break;
            }
        }

        log::trace!("USB write {} bytes", written);
        Ok(written)
    }

    fn read_pins(&mut self) -> Result<u8, DriverError> {
        let handle = self.handle()?;
        let data = handle
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: SIO_READ_PINS_REQUEST,
                    value: 0,
                    index: USB_INDEX,
                    length: 1,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| transfer_error("Read pins failed", e))?;

        data.first()
            .copied()
            .ok_or_else(|| DriverError::other("Read pins returned no data"))
    }

    fn control(&mut self, request: &ControlRequest) -> Result<usize, DriverError> {
        let control_type = match request.kind() {
            RequestKind::Standard => ControlType::Standard,
            RequestKind::Class => ControlType::Class,
            RequestKind::Vendor => ControlType::Vendor,
            RequestKind::Reserved => {
                return Err(DriverError::other(format!(
                    "Reserved request type 0x{:02x}",
                    request.request_type
                )))
            }
        };
        let recipient = match request.recipient() {
            bsusb_core::driver::Recipient::Device => Recipient::Device,
            bsusb_core::driver::Recipient::Interface => Recipient::Interface,
            bsusb_core::driver::Recipient::Endpoint => Recipient::Endpoint,
            bsusb_core::driver::Recipient::Other => Recipient::Other,
        };

        let handle = self.handle()?;
        let result = match request.direction() {
            Direction::Out => handle
                .interface
                .control_out(
                    ControlOut {
                        control_type,
                        recipient,
                        request: request.request,
                        value: request.value,
                        index: request.index,
                        data: &[],
                    },
                    CONTROL_TIMEOUT,
                )
                .wait()
                .map(|()| 0),
            Direction::In => handle
                .interface
                .control_in(
                    ControlIn {
                        control_type,
                        recipient,
                        request: request.request,
                        value: request.value,
                        index: request.index,
                        length: 0,
                    },
                    CONTROL_TIMEOUT,
                )
                .wait()
                .map(|data| data.len()),
        };
        result.map_err(|e| transfer_error("Control transfer failed", e))
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut handle = self.handle.take().ok_or_else(DriverError::not_open)?;
        if handle.out_ep.pending() > 0 {
            Self::drain(&mut handle);
        }
        // Dropping the interface releases the claim and closes the device
        drop(handle);
        log::debug!("FT245BM closed");
        Ok(())
    }
}

impl Drop for Ft245Context {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if handle.out_ep.pending() > 0 {
                log::warn!("Closing FT245BM with writes in flight");
                Self::drain(&mut handle);
            }
        }
    }
}
