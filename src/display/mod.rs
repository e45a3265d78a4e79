//! The display surface: a reference-counted BGRA framebuffer image handed to
//! us by the Device Bridge, and the thin pixel-buffer wrapper the encoder
//! reads it through.

mod ffi;

use crate::video::format::Resolution;

pub use ffi::IOSurfaceRef;

/// An owning reference to one framebuffer image. Cloning retains; dropping
/// releases. The underlying surface is reference-counted by the host OS, so
/// holding a `DisplaySurface` keeps it alive even after the bridge's
/// "current" slot has moved on to a newer one.
pub struct DisplaySurface {
    surface: IOSurfaceRef,
}

// SAFETY: IOSurface's retain/release and read APIs are documented as safe to
// call from any thread; only the lock/unlock pair around a given read needs
// to stay on one thread for the duration of that read, which `LockedSurface`
// enforces by not being `Send`.
unsafe impl Send for DisplaySurface {}
unsafe impl Sync for DisplaySurface {}

impl DisplaySurface {
    /// Wrap a surface pointer obtained from the bridge, taking ownership of
    /// one retain count. Callers must have already `CFRetain`'d (or
    /// equivalently obtained an owning reference to) `surface`.
    ///
    /// # Safety
    /// `surface` must be a valid, retained `IOSurfaceRef`.
    pub unsafe fn from_retained(surface: IOSurfaceRef) -> Self {
        Self { surface }
    }

    pub fn resolution(&self) -> Resolution {
        unsafe {
            Resolution::new(
                ffi::IOSurfaceGetWidth(self.surface) as u32,
                ffi::IOSurfaceGetHeight(self.surface) as u32,
            )
        }
    }

    pub fn bytes_per_row(&self) -> usize {
        unsafe { ffi::IOSurfaceGetBytesPerRow(self.surface) }
    }

    /// Lock the surface for reading and return a guard exposing its bytes.
    /// The lock must be released (via `Drop`) before the surface can be
    /// legally written by the host compositor again.
    pub fn lock(&self) -> LockedSurface<'_> {
        let mut seed = 0u32;
        unsafe {
            ffi::IOSurfaceLock(self.surface, ffi::SURFACE_LOCK_READ_ONLY, &mut seed);
        }
        LockedSurface {
            surface: self,
            _not_send: std::marker::PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> IOSurfaceRef {
        self.surface
    }
}

impl Clone for DisplaySurface {
    fn clone(&self) -> Self {
        unsafe {
            ffi::CFRetain(self.surface as *const _);
        }
        Self {
            surface: self.surface,
        }
    }
}

impl Drop for DisplaySurface {
    fn drop(&mut self) {
        unsafe {
            ffi::CFRelease(self.surface as *const _);
        }
    }
}

/// Add one retain count to a raw surface pointer obtained from the bridge's
/// callback or poller, before wrapping it in [`DisplaySurface::from_retained`].
pub unsafe fn retain_surface(surface: IOSurfaceRef) {
    ffi::CFRetain(surface as *const _);
}

/// Width/height of a raw surface pointer without taking ownership of it.
/// Used by the bridge to compare candidate display ports by area.
pub fn dimensions(surface: IOSurfaceRef) -> Resolution {
    unsafe {
        Resolution::new(
            ffi::IOSurfaceGetWidth(surface) as u32,
            ffi::IOSurfaceGetHeight(surface) as u32,
        )
    }
}

/// A read lock on a [`DisplaySurface`]'s backing memory. Unlocks on drop.
pub struct LockedSurface<'a> {
    surface: &'a DisplaySurface,
    _not_send: std::marker::PhantomData<*const ()>,
}

impl<'a> LockedSurface<'a> {
    pub fn as_slice(&self) -> &[u8] {
        let len = self.surface.bytes_per_row() * self.surface.resolution().height as usize;
        unsafe {
            let base = ffi::IOSurfaceGetBaseAddress(self.surface.raw()) as *const u8;
            std::slice::from_raw_parts(base, len)
        }
    }
}

impl<'a> Drop for LockedSurface<'a> {
    fn drop(&mut self) {
        let mut seed = 0u32;
        unsafe {
            ffi::IOSurfaceUnlock(self.surface.raw(), ffi::SURFACE_LOCK_READ_ONLY, &mut seed);
        }
    }
}

/// A thin per-frame wrapper handing a surface to the codec. Created right
/// before `Encoder::encode` is called and discarded right after.
pub struct PixelBuffer<'a> {
    surface: &'a DisplaySurface,
}

impl<'a> PixelBuffer<'a> {
    pub fn new(surface: &'a DisplaySurface) -> Self {
        Self { surface }
    }

    pub fn resolution(&self) -> Resolution {
        self.surface.resolution()
    }

    pub fn bytes_per_row(&self) -> usize {
        self.surface.bytes_per_row()
    }

    pub fn raw(&self) -> IOSurfaceRef {
        self.surface.raw()
    }

    pub fn lock(&self) -> LockedSurface<'a> {
        self.surface.lock()
    }
}
