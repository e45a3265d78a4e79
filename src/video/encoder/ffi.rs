//! Raw VideoToolbox / CoreMedia / CoreVideo / ImageIO bindings for the
//! hardware JPEG path and its CoreGraphics software fallback.
//!
//! These are all public Apple frameworks (unlike the Device Bridge's private
//! classes), so they are declared the same way the teacher's other platform
//! FFI in this codebase declares public C APIs: plain `extern "C"` blocks
//! against opaque `*mut c_void` handles, no Objective-C message dispatch
//! involved.

use std::ffi::c_void;

pub type OSStatus = i32;
pub type VTCompressionSessionRef = *mut c_void;
pub type CVPixelBufferRef = *mut c_void;
pub type CMSampleBufferRef = *mut c_void;
pub type CMBlockBufferRef = *mut c_void;
pub type CFDictionaryRef = *const c_void;
pub type CFStringRef = *const c_void;
pub type CFNumberRef = *const c_void;
pub type CFAllocatorRef = *const c_void;
pub type CGColorSpaceRef = *mut c_void;
pub type CGContextRef = *mut c_void;
pub type CGImageRef = *mut c_void;
pub type CGImageDestinationRef = *mut c_void;
pub type CGDataConsumerRef = *mut c_void;

#[repr(C)]
pub struct CMTime {
    pub value: i64,
    pub timescale: i32,
    pub flags: u32,
    pub epoch: i64,
}

impl CMTime {
    pub fn new(value: i64, timescale: i32) -> Self {
        Self { value, timescale, flags: 1, epoch: 0 }
    }
}

pub const NO_ERR: OSStatus = 0;
pub const K_CMVIDEO_CODEC_TYPE_JPEG: u32 = 0x6a70_6567; // 'jpeg'

pub type VTCompressionOutputCallback = extern "C" fn(
    output_callback_ref_con: *mut c_void,
    source_frame_ref_con: *mut c_void,
    status: OSStatus,
    info_flags: u32,
    sample_buffer: CMSampleBufferRef,
);

#[link(name = "VideoToolbox", kind = "framework")]
extern "C" {
    pub fn VTCompressionSessionCreate(
        allocator: CFAllocatorRef,
        width: i32,
        height: i32,
        codec_type: u32,
        encoder_specification: CFDictionaryRef,
        source_image_buffer_attributes: CFDictionaryRef,
        compressed_data_allocator: CFAllocatorRef,
        output_callback: VTCompressionOutputCallback,
        output_callback_ref_con: *mut c_void,
        compression_session_out: *mut VTCompressionSessionRef,
    ) -> OSStatus;

    pub fn VTCompressionSessionEncodeFrame(
        session: VTCompressionSessionRef,
        image_buffer: CVPixelBufferRef,
        presentation_time_stamp: CMTime,
        duration: CMTime,
        frame_properties: CFDictionaryRef,
        source_frame_ref_con: *mut c_void,
        info_flags_out: *mut u32,
    ) -> OSStatus;

    pub fn VTSessionSetProperty(
        session: VTCompressionSessionRef,
        property_key: CFStringRef,
        property_value: *const c_void,
    ) -> OSStatus;

    pub fn VTCompressionSessionInvalidate(session: VTCompressionSessionRef);

    pub static kVTCompressionPropertyKey_Quality: CFStringRef;
}

#[link(name = "CoreVideo", kind = "framework")]
extern "C" {
    pub fn CVPixelBufferCreateWithIOSurface(
        allocator: CFAllocatorRef,
        surface: crate::display::IOSurfaceRef,
        pixel_buffer_attributes: CFDictionaryRef,
        pixel_buffer_out: *mut CVPixelBufferRef,
    ) -> OSStatus;

    pub fn CVPixelBufferRelease(buffer: CVPixelBufferRef);
}

#[link(name = "CoreMedia", kind = "framework")]
extern "C" {
    pub fn CMSampleBufferGetDataBuffer(sample_buffer: CMSampleBufferRef) -> CMBlockBufferRef;
    pub fn CMBlockBufferGetDataLength(buffer: CMBlockBufferRef) -> usize;
    pub fn CMBlockBufferCopyDataBytes(
        buffer: CMBlockBufferRef,
        offset_to_data: usize,
        data_length: usize,
        destination: *mut c_void,
    ) -> OSStatus;
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    pub fn CGColorSpaceCreateDeviceRGB() -> CGColorSpaceRef;
    pub fn CGColorSpaceRelease(space: CGColorSpaceRef);

    pub fn CGBitmapContextCreate(
        data: *mut c_void,
        width: usize,
        height: usize,
        bits_per_component: usize,
        bytes_per_row: usize,
        space: CGColorSpaceRef,
        bitmap_info: u32,
    ) -> CGContextRef;
    pub fn CGBitmapContextCreateImage(context: CGContextRef) -> CGImageRef;
    pub fn CGContextRelease(context: CGContextRef);
    pub fn CGImageRelease(image: CGImageRef);

    pub fn CGDataConsumerCreateWithCFData(data: *mut c_void) -> CGDataConsumerRef;
}

#[link(name = "ImageIO", kind = "framework")]
extern "C" {
    pub fn CGImageDestinationCreateWithData(
        data: *mut c_void,
        image_type: CFStringRef,
        count: usize,
        options: CFDictionaryRef,
    ) -> CGImageDestinationRef;
    pub fn CGImageDestinationAddImage(
        destination: CGImageDestinationRef,
        image: CGImageRef,
        properties: CFDictionaryRef,
    );
    pub fn CGImageDestinationFinalize(destination: CGImageDestinationRef) -> bool;
    pub static kUTTypeJPEG: CFStringRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    pub fn CFDataCreateMutable(allocator: CFAllocatorRef, capacity: isize) -> *mut c_void;
    pub fn CFDataGetLength(data: *const c_void) -> isize;
    pub fn CFDataGetBytePtr(data: *const c_void) -> *const u8;
    pub fn CFRelease(cf: *const c_void);
    pub fn CFNumberCreate(
        allocator: CFAllocatorRef,
        the_type: i32,
        value_ptr: *const c_void,
    ) -> CFNumberRef;
}

pub const CF_NUMBER_FLOAT32_TYPE: i32 = 5;

/// `kCGBitmapByteOrder32Little | kCGImageAlphaPremultipliedFirst`, the layout
/// the simulator's display surface uses (BGRA, premultiplied).
pub const BGRA_BITMAP_INFO: u32 = (2 << 12) | 2;
