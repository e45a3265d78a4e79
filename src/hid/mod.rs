//! The HID Injector: resolves the simulator device and submits synthesized
//! touch/button event messages through its legacy HID client.

pub mod message;

use objc2::rc::Retained;
use objc2::runtime::AnyObject;

use crate::bridge::ffi as bridge_ffi;
use crate::command::{ButtonName, Direction, TouchPhase};
use crate::error::Result;
use message::HidMessage;

/// Owns the resolved device's HID client for the process's lifetime.
/// Construction reuses the bridge's device-resolution logic so a UDID is
/// matched identically whether it resolves the display or the input path.
pub struct HidInjector {
    hid_client: Retained<AnyObject>,
    use_async_send: bool,
}

// The HID client is only ever touched from whichever thread dispatches
// commands (the command reader thread), never concurrently.
unsafe impl Send for HidInjector {}

impl HidInjector {
    pub fn start(udid: &str) -> Result<Self> {
        let device = crate::bridge::resolve_device(udid)?;
        let hid_client = bridge_ffi::device_hid_client(&device)?;

        let (width, height) = bridge_ffi::hid_main_screen_size(&hid_client);
        let scale = bridge_ffi::hid_main_screen_scale(&hid_client);
        tracing::info!(width, height, scale, "hid injector: resolved main screen geometry");

        let use_async_send = bridge_ffi::hid_supports_async_send(&hid_client);
        tracing::info!(
            use_async_send,
            "hid injector: using {} submission",
            if use_async_send { "async" } else { "synchronous" }
        );

        Ok(Self {
            hid_client,
            use_async_send,
        })
    }

    /// Synthesize and submit one HID message per point. Best-effort: a send
    /// failure is logged and otherwise swallowed, matching the contract
    /// that touch injection never reports back to the command dispatcher.
    pub fn send_touch(&self, phase: TouchPhase, points: &[(f64, f64)]) {
        let down = phase.is_down();
        for &(x, y) in points {
            let message = HidMessage::touch(x, y, down);
            self.submit(message);
        }
    }

    pub fn send_button(&self, name: ButtonName, direction: Direction) {
        let identifier = match name {
            ButtonName::Home => 1,
            ButtonName::Lock => 2,
            ButtonName::Side => 3,
        };
        let message = HidMessage::button(identifier, direction == Direction::Down);
        self.submit(message);
    }

    pub fn send_key(&self, code: u16, direction: Direction) {
        let message = HidMessage::button(code as u32, direction == Direction::Down);
        self.submit(message);
    }

    fn submit(&self, message: HidMessage) {
        if self.use_async_send {
            // Ownership of the buffer passes to the HID client, which frees
            // it once its completion callback runs.
            let boxed = Box::into_raw(Box::new(message));
            let len = unsafe { (*boxed).len() };
            bridge_ffi::hid_send_async(&self.hid_client, boxed as *mut u8, len);
        } else {
            let len = message.len();
            let ptr = message.as_bytes().as_ptr();
            if !bridge_ffi::hid_send_sync(&self.hid_client, ptr, len) {
                tracing::warn!("hid injector: synchronous send failed");
            }
        }
    }
}
