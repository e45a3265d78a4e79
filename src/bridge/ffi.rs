//! Private-framework bundle loading and the selector table.
//!
//! `CoreSimulator` and the developer-tools HID framework ship inside Xcode
//! and have no public headers: `SimServiceContext`, `SimDeviceSet`,
//! `SimDevice`, and the I/O port/descriptor classes only exist once their
//! bundle has been `dlopen`'d into this process. Every class name and
//! selector string this binary depends on is declared once, here, so a
//! renamed or missing private symbol fails in one place with a clear error
//! instead of as an opaque crash somewhere in the bridge logic.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::process::Command;

use objc2::rc::Retained;
use objc2::runtime::{AnyClass, AnyObject};
use objc2::msg_send;
use objc2_foundation::{NSArray, NSString};

use crate::error::{AppError, Result};

const CORE_SIMULATOR_RELATIVE: &str = "Library/PrivateFrameworks/CoreSimulator.framework/CoreSimulator";
const DVT_FOUNDATION_RELATIVE: &str = "../SharedFrameworks/DVTFoundation.framework/DVTFoundation";
const SIMULATOR_KIT_RELATIVE: &str = "Library/PrivateFrameworks/SimulatorKit.framework/SimulatorKit";

/// Candidate Xcode install roots, searched in order. `xcode-select -p` is
/// tried first; the well-known default path is the fallback.
fn candidate_developer_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(output) = Command::new("xcode-select").arg("-p").output() {
        if output.status.success() {
            if let Ok(path) = String::from_utf8(output.stdout) {
                let path = path.trim();
                if !path.is_empty() {
                    dirs.push(PathBuf::from(path));
                }
            }
        }
    }
    dirs.push(PathBuf::from("/Applications/Xcode.app/Contents/Developer"));
    dirs
}

/// Load one shared library by absolute path via `dlopen(RTLD_NOW |
/// RTLD_GLOBAL)`. `RTLD_GLOBAL` is required: without it the Objective-C
/// runtime in this process never sees the classes the bundle defines, and
/// every later `AnyClass::get` call silently returns `None`.
fn dlopen_global(path: &Path) -> Result<()> {
    let c_path = CString::new(path.as_os_str().to_string_lossy().as_bytes())
        .map_err(|e| AppError::FrameworkMissing(e.to_string()))?;
    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };
    if handle.is_null() {
        return Err(AppError::FrameworkMissing(format!(
            "dlopen failed for {}",
            path.display()
        )));
    }
    Ok(())
}

/// Load `CoreSimulator.framework` and `SimulatorKit.framework` from the
/// first Xcode install that has both. Idempotent: `dlopen` on an
/// already-loaded image is a harmless no-op refcount bump.
pub fn load_frameworks() -> Result<PathBuf> {
    for dir in candidate_developer_dirs() {
        let core_sim = dir.join(CORE_SIMULATOR_RELATIVE);
        let sim_kit = dir.join(SIMULATOR_KIT_RELATIVE);
        if core_sim.exists() && sim_kit.exists() {
            dlopen_global(&core_sim)?;
            dlopen_global(&sim_kit)?;
            let _ = dir.join(DVT_FOUNDATION_RELATIVE);
            return Ok(dir);
        }
    }
    Err(AppError::FrameworkMissing(
        "CoreSimulator.framework / SimulatorKit.framework not found under any known Xcode install"
            .into(),
    ))
}

fn class_named(name: &str) -> Result<&'static AnyClass> {
    AnyClass::get(name).ok_or_else(|| AppError::FrameworkMissing(format!("class {name} not registered")))
}

/// `+[SimServiceContext sharedServiceContextForDeveloperDir:error:]`
pub fn shared_service_context(developer_dir: &str) -> Result<Retained<AnyObject>> {
    let cls = class_named("SimServiceContext")?;
    let dir = NSString::from_str(developer_dir);
    let mut err: *mut AnyObject = std::ptr::null_mut();
    let ctx: *mut AnyObject = unsafe {
        msg_send![cls, sharedServiceContextForDeveloperDir: &*dir, error: &mut err]
    };
    Retained::retain(ctx)
        .ok_or_else(|| AppError::FrameworkMissing("sharedServiceContextForDeveloperDir returned nil".into()))
}

/// `-[SimServiceContext defaultDeviceSetWithError:]`
pub fn default_device_set(ctx: &AnyObject) -> Result<Retained<AnyObject>> {
    let mut err: *mut AnyObject = std::ptr::null_mut();
    let set: *mut AnyObject = unsafe { msg_send![ctx, defaultDeviceSetWithError: &mut err] };
    Retained::retain(set)
        .ok_or_else(|| AppError::FrameworkMissing("defaultDeviceSetWithError returned nil".into()))
}

/// `-[SimDeviceSet devices]`
pub fn devices(device_set: &AnyObject) -> Retained<NSArray<AnyObject>> {
    unsafe { msg_send![device_set, devices] }
}

/// `-[SimDevice UDID]` stringified (`-[NSUUID UUIDString]`)
pub fn device_udid(device: &AnyObject) -> String {
    unsafe {
        let uuid: *mut AnyObject = msg_send![device, UDID];
        let s: Retained<NSString> = msg_send![uuid, UUIDString];
        s.to_string()
    }
}

/// `-[SimDevice io]` - the device's I/O client, which exposes ports.
pub fn device_io_client(device: &AnyObject) -> Result<Retained<AnyObject>> {
    let io: *mut AnyObject = unsafe { msg_send![device, io] };
    Retained::retain(io).ok_or_else(|| AppError::NoDisplaySurface)
}

/// `-[SimDeviceIOClient ports]`
pub fn io_ports(io_client: &AnyObject) -> Retained<NSArray<AnyObject>> {
    unsafe { msg_send![io_client, ports] }
}

/// `-[SimDevice hid]` - the device's legacy HID client, used to submit
/// synthesized touch/button event messages.
pub fn device_hid_client(device: &AnyObject) -> Result<Retained<AnyObject>> {
    let hid: *mut AnyObject = unsafe { msg_send![device, hid] };
    Retained::retain(hid)
        .ok_or_else(|| AppError::FrameworkMissing("SimDevice hid client unavailable".into()))
}

/// `-[SimDeviceLegacyHID mainScreenSize]` - width/height in points.
pub fn hid_main_screen_size(hid_client: &AnyObject) -> (f64, f64) {
    #[repr(C)]
    struct CGSize {
        width: f64,
        height: f64,
    }
    let size: CGSize = unsafe { msg_send![hid_client, mainScreenSize] };
    (size.width, size.height)
}

/// `-[SimDeviceLegacyHID mainScreenScale]`
pub fn hid_main_screen_scale(hid_client: &AnyObject) -> f64 {
    unsafe { msg_send![hid_client, mainScreenScale] }
}

/// Whether the HID client exposes the async "free when done" submission
/// entry point, as opposed to only the synchronous one.
pub fn hid_supports_async_send(hid_client: &AnyObject) -> bool {
    unsafe {
        let responds: bool = msg_send![
            hid_client,
            respondsToSelector: objc2::sel!(sendMessage:freeWhenDone:completion:)
        ];
        responds
    }
}

/// `-[SimDeviceLegacyHID sendMessage:freeWhenDone:completion:]`
///
/// `ptr`/`len` describe the message buffer; ownership transfers to the
/// callee when `free_when_done` is true, and it is released via `libc::free`
/// once `completion` runs.
///
/// The completion block is not leaked here: Cocoa's convention for any API
/// that invokes a block after the call returns is for the callee to `copy`
/// it onto the heap itself (the same thing ARC-generated call sites do
/// automatically), so `sendMessage:length:freeWhenDone:completion:` already
/// holds its own retained copy by the time this function returns. Dropping
/// `block` here only releases *our* reference; the client's copy keeps it
/// alive until the completion actually runs.
pub fn hid_send_async(hid_client: &AnyObject, ptr: *mut u8, len: usize) {
    unsafe {
        let block = block2::RcBlock::new(move |_err: *mut AnyObject| {});
        let _: () = msg_send![
            hid_client,
            sendMessage: ptr,
            length: len,
            freeWhenDone: true,
            completion: &*block
        ];
    }
}

/// `-[SimDeviceLegacyHID sendMessageSync:length:]` - blocks until delivered;
/// the caller retains ownership of the buffer and must free it itself.
pub fn hid_send_sync(hid_client: &AnyObject, ptr: *const u8, len: usize) -> bool {
    unsafe {
        let ok: bool = msg_send![hid_client, sendMessageSync: ptr, length: len];
        ok
    }
}

/// `-[SimDeviceIOPort descriptor]`
pub fn port_descriptor(port: &AnyObject) -> Result<Retained<AnyObject>> {
    let descriptor: *mut AnyObject = unsafe { msg_send![port, descriptor] };
    Retained::retain(descriptor).ok_or(AppError::NoDisplaySurface)
}

/// `-[SimDisplayDescriptorState displayClass]` - 0 means the main display.
pub fn descriptor_display_class(descriptor: &AnyObject) -> i64 {
    unsafe { msg_send![descriptor, displayClass] }
}

/// Probe, in order, the two selectors known to expose a descriptor's current
/// frame as an `IOSurfaceRef`: `framebufferSurface` then `ioSurface`.
pub fn descriptor_surface(descriptor: &AnyObject) -> Option<crate::display::IOSurfaceRef> {
    let via_framebuffer: crate::display::IOSurfaceRef =
        unsafe { msg_send![descriptor, framebufferSurface] };
    if !via_framebuffer.is_null() {
        return Some(via_framebuffer);
    }
    let via_iosurface: crate::display::IOSurfaceRef = unsafe { msg_send![descriptor, ioSurface] };
    if !via_iosurface.is_null() {
        return Some(via_iosurface);
    }
    None
}

/// Whether this descriptor exposes a push-style registration entry point, as
/// opposed to one that must be polled.
pub fn descriptor_supports_callback(descriptor: &AnyObject) -> bool {
    unsafe {
        let responds: bool = msg_send![
            descriptor,
            respondsToSelector: objc2::sel!(registerCallbackWithIdentifier:onQueue:handler:)
        ];
        responds
    }
}

/// `-[SimDisplayDescriptorState registerCallbackWithIdentifier:onQueue:handler:]`
///
/// `handler` is an already-constructed `block2::RcBlock` invoked with the new
/// `IOSurfaceRef` each time the host delivers a frame.
pub fn register_callback(
    descriptor: &AnyObject,
    subscription_id: &str,
    queue: &dispatch2::DispatchQueue,
    handler: &block2::RcBlock<dyn Fn(crate::display::IOSurfaceRef)>,
) {
    let id = NSString::from_str(subscription_id);
    unsafe {
        let _: () = msg_send![
            descriptor,
            registerCallbackWithIdentifier: &*id,
            onQueue: queue,
            handler: handler
        ];
    }
}

/// `-[SimDisplayDescriptorState unregisterCallbackWithIdentifier:]`
pub fn unregister_callback(descriptor: &AnyObject, subscription_id: &str) {
    let id = NSString::from_str(subscription_id);
    unsafe {
        let _: () = msg_send![descriptor, unregisterCallbackWithIdentifier: &*id];
    }
}
