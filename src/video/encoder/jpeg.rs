//! Hardware-accelerated JPEG encoder with a CoreGraphics/ImageIO software
//! fallback.

use std::ffi::c_void;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::ffi;
use super::traits::{Encoder, EncoderConfig};
use crate::display::PixelBuffer;
use crate::error::{AppError, Result};
use crate::utils::LogThrottler;
use crate::video::frame::EncodedFrame;
use crate::warn_throttled;

const HARDWARE_ENCODE_TIMEOUT: Duration = Duration::from_millis(100);
const COUNTER_LOG_INTERVAL: u64 = 60;
/// A sustained hardware-encode failure would otherwise warn at up to the
/// capture frame rate (120 Hz); one line per interval is enough to see the
/// condition without flooding stderr.
const FALLBACK_WARN_INTERVAL: Duration = Duration::from_secs(2);

type CallbackResult = std::result::Result<Vec<u8>, ()>;
type CallbackSlot = Arc<(Mutex<Option<CallbackResult>>, Condvar)>;

#[derive(Default)]
struct Counters {
    frames_in: u64,
    hw_successes: u64,
    sw_fallbacks: u64,
    bytes_out: u64,
}

struct HardwareSession {
    session: ffi::VTCompressionSessionRef,
    slot: CallbackSlot,
    // The extra strong ref handed to the C callback as its ref-con; dropped
    // explicitly here by reconstructing the Arc from the raw pointer.
    ref_con: *mut c_void,
}

unsafe impl Send for HardwareSession {}

impl Drop for HardwareSession {
    fn drop(&mut self) {
        unsafe {
            ffi::VTCompressionSessionInvalidate(self.session);
            drop(Arc::from_raw(self.ref_con as *const (Mutex<Option<CallbackResult>>, Condvar)));
        }
    }
}

/// Encodes successive surfaces of one fixed geometry to JPEG. The driver
/// replaces this with a fresh instance whenever the surface's dimensions
/// change; it never reconfigures itself.
pub struct JpegEncoder {
    config: EncoderConfig,
    hardware: Option<HardwareSession>,
    counters: Counters,
    fallback_warn_throttle: LogThrottler,
}

impl JpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        let hardware = Self::try_create_hardware_session(&config);
        if hardware.is_none() {
            tracing::warn!("hardware JPEG session unavailable at startup, using software path");
        }
        Self {
            config,
            hardware,
            counters: Counters::default(),
            fallback_warn_throttle: LogThrottler::new(FALLBACK_WARN_INTERVAL),
        }
    }

    fn try_create_hardware_session(config: &EncoderConfig) -> Option<HardwareSession> {
        let slot: CallbackSlot = Arc::new((Mutex::new(None), Condvar::new()));
        let ref_con = Arc::into_raw(slot.clone()) as *mut c_void;

        let mut session: ffi::VTCompressionSessionRef = std::ptr::null_mut();
        let status = unsafe {
            ffi::VTCompressionSessionCreate(
                std::ptr::null(),
                config.resolution.width as i32,
                config.resolution.height as i32,
                ffi::K_CMVIDEO_CODEC_TYPE_JPEG,
                std::ptr::null(),
                std::ptr::null(),
                std::ptr::null(),
                compression_output_callback,
                ref_con,
                &mut session,
            )
        };
        if status != ffi::NO_ERR || session.is_null() {
            unsafe {
                drop(Arc::from_raw(ref_con as *const (Mutex<Option<CallbackResult>>, Condvar)));
            }
            return None;
        }

        unsafe {
            let quality: f32 = config.quality;
            let number = ffi::CFNumberCreate(
                std::ptr::null(),
                ffi::CF_NUMBER_FLOAT32_TYPE,
                &quality as *const f32 as *const c_void,
            );
            ffi::VTSessionSetProperty(session, ffi::kVTCompressionPropertyKey_Quality, number as *const c_void);
            ffi::CFRelease(number as *const c_void);
        }

        Some(HardwareSession { session, slot, ref_con })
    }

    fn encode_hardware(&mut self, surface: &PixelBuffer<'_>, sequence: u64) -> Result<Vec<u8>> {
        let hardware = self.hardware.as_ref().expect("checked by caller");

        let mut pixel_buffer: ffi::CVPixelBufferRef = std::ptr::null_mut();
        let status = unsafe {
            ffi::CVPixelBufferCreateWithIOSurface(
                std::ptr::null(),
                surface.raw(),
                std::ptr::null(),
                &mut pixel_buffer,
            )
        };
        if status != ffi::NO_ERR || pixel_buffer.is_null() {
            return Err(AppError::EncodeFailure(format!(
                "CVPixelBufferCreateWithIOSurface failed: {status}"
            )));
        }

        {
            let mut guard = hardware.slot.0.lock().unwrap();
            *guard = None;
        }

        let pts = ffi::CMTime::new(sequence as i64, 1000);
        let status = unsafe {
            ffi::VTCompressionSessionEncodeFrame(
                hardware.session,
                pixel_buffer,
                pts,
                ffi::CMTime::new(0, 1),
                std::ptr::null(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        unsafe {
            ffi::CVPixelBufferRelease(pixel_buffer);
        }
        if status != ffi::NO_ERR {
            return Err(AppError::EncodeFailure(format!(
                "VTCompressionSessionEncodeFrame failed: {status}"
            )));
        }

        let (lock, cvar) = &*hardware.slot;
        let guard = lock.lock().unwrap();
        let (guard, timeout) = cvar
            .wait_timeout_while(guard, HARDWARE_ENCODE_TIMEOUT, |result| result.is_none())
            .unwrap();
        if timeout.timed_out() {
            return Err(AppError::EncodeTimeout(HARDWARE_ENCODE_TIMEOUT));
        }
        match guard.clone() {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(())) | None => {
                Err(AppError::EncodeFailure("compression callback reported failure".into()))
            }
        }
    }

    fn encode_software(&self, surface: &PixelBuffer<'_>) -> Result<Vec<u8>> {
        let resolution = surface.resolution();
        let locked = surface.lock();
        let bytes = locked.as_slice();

        unsafe {
            let color_space = ffi::CGColorSpaceCreateDeviceRGB();
            let context = ffi::CGBitmapContextCreate(
                bytes.as_ptr() as *mut c_void,
                resolution.width as usize,
                resolution.height as usize,
                8,
                surface.bytes_per_row(),
                color_space,
                ffi::BGRA_BITMAP_INFO,
            );
            ffi::CGColorSpaceRelease(color_space);
            if context.is_null() {
                return Err(AppError::EncodeFailure("CGBitmapContextCreate returned null".into()));
            }

            let image = ffi::CGBitmapContextCreateImage(context);
            ffi::CGContextRelease(context);
            if image.is_null() {
                return Err(AppError::EncodeFailure("CGBitmapContextCreateImage returned null".into()));
            }

            let data = ffi::CFDataCreateMutable(std::ptr::null(), 0);
            let destination =
                ffi::CGImageDestinationCreateWithData(data, ffi::kUTTypeJPEG, 1, std::ptr::null());
            if destination.is_null() {
                ffi::CGImageRelease(image);
                ffi::CFRelease(data as *const c_void);
                return Err(AppError::EncodeFailure(
                    "CGImageDestinationCreateWithData returned null".into(),
                ));
            }

            ffi::CGImageDestinationAddImage(destination, image, std::ptr::null());
            let ok = ffi::CGImageDestinationFinalize(destination);
            ffi::CGImageRelease(image);
            ffi::CFRelease(destination as *const c_void);

            if !ok {
                ffi::CFRelease(data as *const c_void);
                return Err(AppError::EncodeFailure("CGImageDestinationFinalize failed".into()));
            }

            let len = ffi::CFDataGetLength(data) as usize;
            let ptr = ffi::CFDataGetBytePtr(data);
            let out = std::slice::from_raw_parts(ptr, len).to_vec();
            ffi::CFRelease(data as *const c_void);
            Ok(out)
        }
    }

    fn log_counters_if_due(&self) {
        if self.counters.frames_in % COUNTER_LOG_INTERVAL == 0 {
            tracing::info!(
                frames_in = self.counters.frames_in,
                hw_successes = self.counters.hw_successes,
                sw_fallbacks = self.counters.sw_fallbacks,
                bytes_out = self.counters.bytes_out,
                "encoder counters"
            );
        }
    }
}

impl Encoder for JpegEncoder {
    fn config(&self) -> &EncoderConfig {
        &self.config
    }

    fn encode(&mut self, surface: &PixelBuffer<'_>, sequence: u64) -> Result<EncodedFrame> {
        self.counters.frames_in += 1;

        let bytes = if self.hardware.is_some() {
            match self.encode_hardware(surface, sequence) {
                Ok(bytes) => {
                    self.counters.hw_successes += 1;
                    bytes
                }
                Err(e) => {
                    warn_throttled!(
                        self.fallback_warn_throttle,
                        "hw_encode_fallback",
                        error = %e,
                        "hardware encode failed, falling back to software"
                    );
                    self.counters.sw_fallbacks += 1;
                    self.encode_software(surface)?
                }
            }
        } else {
            self.counters.sw_fallbacks += 1;
            self.encode_software(surface)?
        };

        self.counters.bytes_out += bytes.len() as u64;
        self.log_counters_if_due();
        Ok(EncodedFrame::new(bytes, sequence))
    }
}

extern "C" fn compression_output_callback(
    output_callback_ref_con: *mut c_void,
    _source_frame_ref_con: *mut c_void,
    status: ffi::OSStatus,
    _info_flags: u32,
    sample_buffer: ffi::CMSampleBufferRef,
) {
    let slot = unsafe {
        Arc::from_raw(output_callback_ref_con as *const (Mutex<Option<CallbackResult>>, Condvar))
    };
    let result: CallbackResult = if status != ffi::NO_ERR || sample_buffer.is_null() {
        Err(())
    } else {
        unsafe {
            let block = ffi::CMSampleBufferGetDataBuffer(sample_buffer);
            let len = ffi::CMBlockBufferGetDataLength(block);
            let mut out = vec![0u8; len];
            let copy_status =
                ffi::CMBlockBufferCopyDataBytes(block, 0, len, out.as_mut_ptr() as *mut c_void);
            if copy_status == ffi::NO_ERR {
                Ok(out)
            } else {
                Err(())
            }
        }
    };

    {
        let mut guard = slot.0.lock().unwrap();
        *guard = Some(result);
    }
    slot.1.notify_one();
    // The session keeps invoking this callback for as long as it's alive, so
    // the ref-con's strong count must survive past this one call.
    std::mem::forget(slot);
}
