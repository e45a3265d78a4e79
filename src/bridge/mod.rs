//! The Device Bridge: resolves a UDID to a display descriptor and delivers
//! surface-changed notifications either via the host's own callback
//! mechanism or, when that is unavailable, a fallback poller.

pub(crate) mod ffi;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use objc2::rc::Retained;
use objc2::runtime::AnyObject;

use crate::display::DisplaySurface;
use crate::error::{AppError, Result};

/// The fallback poller's period is hard-coded to ~60 FPS rather than derived
/// from `--fps`; this is a documented simplification, not a contract (see
/// the design notes on the poller vs. callback decision).
const FALLBACK_POLL_INTERVAL: Duration = Duration::from_millis(16);

enum SubscriptionMode {
    Callback,
    Poller { stop: Arc<AtomicBool>, handle: JoinHandle<()> },
}

/// Owns the resolved device, its display descriptor, and whichever
/// subscription mode was chosen at `start()`.
pub struct DeviceBridge {
    #[allow(dead_code)]
    device: Retained<AnyObject>,
    descriptor: Retained<AnyObject>,
    subscription_id: String,
    current: Arc<ArcSwapOption<DisplaySurface>>,
    mode: Option<SubscriptionMode>,
}

// The Objective-C objects we hold are only ever touched from the thread that
// owns the bridge (start/stop) or from the callback's own serial queue,
// never concurrently with each other.
unsafe impl Send for DeviceBridge {}

impl DeviceBridge {
    /// Resolve `udid` to a device and its main display, and begin delivering
    /// surface updates to `on_surface`. `on_surface` always runs on the
    /// bridge's dedicated serial dispatch queue (or the poller thread, which
    /// plays the same logical role).
    pub fn start<F>(udid: &str, on_surface: F) -> Result<Self>
    where
        F: Fn(DisplaySurface) + Send + Sync + 'static,
    {
        let device = resolve_device(udid)?;

        let io_client = ffi::device_io_client(&device)?;
        let ports = ffi::io_ports(&io_client);

        let mut best: Option<(Retained<AnyObject>, u64)> = None;
        let mut main_display: Option<Retained<AnyObject>> = None;
        for port in ports.iter() {
            let descriptor = match ffi::port_descriptor(&port) {
                Ok(d) => d,
                Err(_) => continue,
            };
            if ffi::descriptor_surface(&descriptor).is_none() {
                continue;
            }
            if ffi::descriptor_display_class(&descriptor) == 0 {
                main_display = Some(descriptor);
                break;
            }
            if let Some(surface) = ffi::descriptor_surface(&descriptor) {
                let area = crate::display::dimensions(surface).pixels();
                if best.as_ref().map(|(_, a)| area > *a).unwrap_or(true) {
                    best = Some((descriptor, area));
                }
            }
        }
        let descriptor = main_display
            .or_else(|| best.map(|(d, _)| d))
            .ok_or(AppError::NoDisplaySurface)?;

        let current: Arc<ArcSwapOption<DisplaySurface>> = Arc::new(ArcSwapOption::from(None));
        let subscription_id = uuid::Uuid::new_v4().to_string();

        let mode = if ffi::descriptor_supports_callback(&descriptor) {
            Self::subscribe_callback(&descriptor, &subscription_id, current.clone(), on_surface);
            tracing::info!("device bridge: using push callback for surface updates");
            SubscriptionMode::Callback
        } else {
            tracing::info!(
                interval_ms = FALLBACK_POLL_INTERVAL.as_millis() as u64,
                "device bridge: callback registration unavailable, using fallback poller"
            );
            Self::spawn_poller(&descriptor, current.clone(), on_surface)
        };

        Ok(Self {
            device,
            descriptor,
            subscription_id,
            current,
            mode: Some(mode),
        })
    }

    fn subscribe_callback<F>(
        descriptor: &AnyObject,
        subscription_id: &str,
        current: Arc<ArcSwapOption<DisplaySurface>>,
        on_surface: F,
    ) where
        F: Fn(DisplaySurface) + Send + Sync + 'static,
    {
        let queue = dispatch2::DispatchQueue::new(
            "simulator-server.surface-dispatch",
            dispatch2::DispatchQueueAttr::SERIAL,
        );
        let handler = block2::RcBlock::new(move |surface: crate::display::IOSurfaceRef| {
            if surface.is_null() {
                return;
            }
            unsafe {
                crate::display::retain_surface(surface);
            }
            let surface = unsafe { DisplaySurface::from_retained(surface) };
            current.store(Some(Arc::new(surface.clone())));
            on_surface(surface);
        });
        ffi::register_callback(descriptor, subscription_id, &queue, &handler);
        // The queue and handler must outlive the registration; the host
        // keeps its own strong reference once registered, so intentionally
        // leak ours here rather than drop it at the end of `start()`.
        std::mem::forget(queue);
        std::mem::forget(handler);
    }

    fn spawn_poller<F>(
        descriptor: &Retained<AnyObject>,
        current: Arc<ArcSwapOption<DisplaySurface>>,
        on_surface: F,
    ) -> SubscriptionMode
    where
        F: Fn(DisplaySurface) + Send + Sync + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        // objc2's Retained<T> is not Send; the poller re-resolves the
        // descriptor pointer each tick through a raw pointer captured once
        // here, which is sound because the bridge keeps its own Retained
        // alive for the lifetime of the thread.
        let descriptor_ptr = Retained::as_ptr(descriptor) as usize;
        let handle = std::thread::Builder::new()
            .name("simulator-server-surface-poll".into())
            .spawn(move || {
                let descriptor = unsafe { &*(descriptor_ptr as *const AnyObject) };
                while !stop_clone.load(Ordering::Relaxed) {
                    if let Some(surface) = ffi::descriptor_surface(descriptor) {
                        unsafe {
                            crate::display::retain_surface(surface);
                        }
                        let surface = unsafe { DisplaySurface::from_retained(surface) };
                        current.store(Some(Arc::new(surface.clone())));
                        on_surface(surface);
                    }
                    std::thread::sleep(FALLBACK_POLL_INTERVAL);
                }
            })
            .expect("failed to spawn surface poller thread");
        SubscriptionMode::Poller { stop, handle }
    }

    /// Most recently observed surface, if any has arrived yet.
    pub fn current(&self) -> Option<DisplaySurface> {
        self.current.load_full().map(|arc| (*arc).clone())
    }

    /// Cancel the poller (if any), unregister the callback, drop the
    /// descriptor.
    pub fn stop(&mut self) {
        match self.mode.take() {
            Some(SubscriptionMode::Callback) => {
                ffi::unregister_callback(&self.descriptor, &self.subscription_id);
            }
            Some(SubscriptionMode::Poller { stop, handle }) => {
                stop.store(true, Ordering::Relaxed);
                let _ = handle.join();
            }
            None => {}
        }
    }
}

impl Drop for DeviceBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resolution steps shared with the HID injector: load the private
/// frameworks, obtain the service context and default device set, and scan
/// devices for a UDID match. Kept separate from the display-descriptor scan
/// in `start()` since the HID injector needs only the device itself.
pub(crate) fn resolve_device(udid: &str) -> Result<Retained<AnyObject>> {
    let developer_dir = ffi::load_frameworks()?;
    let ctx = ffi::shared_service_context(&developer_dir.to_string_lossy())?;
    let device_set = ffi::default_device_set(&ctx)?;
    let devices = ffi::devices(&device_set);

    let wanted = canonicalize_udid(udid);
    for device in devices.iter() {
        if canonicalize_udid(&ffi::device_udid(&device)) == wanted {
            return Ok(device.clone());
        }
    }
    Err(AppError::DeviceNotFound(udid.to_string()))
}

fn canonicalize_udid(udid: &str) -> String {
    udid.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn udid_canonicalization_is_case_insensitive() {
        assert_eq!(
            canonicalize_udid("ABCD-1234"),
            canonicalize_udid(" abcd-1234 ")
        );
    }
}
