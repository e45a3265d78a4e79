//! The simulator's private binary HID message format.
//!
//! This layout is observed empirically from the host's own tooling, not
//! documented anywhere. It is treated as a fixed-size opaque struct on
//! purpose: fields are named `fieldN` rather than given semantic names,
//! because guessing at their meaning is how this kind of binding rots the
//! first time Apple reshuffles an internal struct. Only the fields this
//! injector actually needs to set (event kind, the touch/button payload,
//! the timestamp, and the duplicated-payload discriminators) have real
//! names; everything else stays zeroed.

const EVENT_KIND_BUTTON: u8 = 1;
const EVENT_KIND_TOUCH: u8 = 2;

const DISCRIMINATOR_FIRST: u32 = 0x0000_0001;
const DISCRIMINATOR_SECOND: u32 = 0x0000_0002;

/// One touch point in the wire record: normalized ratios plus the
/// duplicated "down" flag pair the host's protocol expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TouchRecord {
    pub x_ratio: f32,
    pub y_ratio: f32,
    pub down: u32,
    pub down2: u32,
}

/// One button/key-class record. `identifier` doubles as a button code or a
/// USB HID key code depending on which `Command` variant produced it; the
/// wire format does not distinguish the two.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonRecord {
    pub identifier: u32,
    pub down: u32,
}

#[repr(C)]
union Payload {
    touch: TouchRecord,
    button: ButtonRecord,
    field8: [u8; 16],
}

/// The message header. `field1`/`field2` are unidentified fixed fields that
/// every observed message carries with the same zero value; `inner_size` is
/// the only one of the unnamed fields whose role (a length prefix) is
/// confidently known.
#[repr(C)]
struct Header {
    field1: u32,
    field2: u32,
    inner_size: u32,
    event_kind: u8,
    field5: [u8; 3],
}

/// The full on-the-wire message: header, timestamp, payload, then the
/// payload repeated with a different leading discriminator. The duplication
/// is part of the contract, not a bug - the host's legacy HID client
/// rejects messages missing the second copy.
#[repr(C)]
pub struct HidMessage {
    header: Header,
    timestamp_mach: u64,
    discriminator_a: u32,
    payload_a: Payload,
    discriminator_b: u32,
    payload_b: Payload,
}

impl HidMessage {
    fn zeroed(event_kind: u8) -> Self {
        // SAFETY: every field of this repr(C) struct is a plain integer,
        // float, or union of same; the all-zero bit pattern is valid for
        // all of them.
        let mut msg: Self = unsafe { std::mem::zeroed() };
        msg.header.event_kind = event_kind;
        msg.header.inner_size = std::mem::size_of::<Self>() as u32;
        msg.discriminator_a = DISCRIMINATOR_FIRST;
        msg.discriminator_b = DISCRIMINATOR_SECOND;
        msg.timestamp_mach = mach_absolute_time();
        msg
    }

    /// Build a touch-class message for one point. `down` is true for
    /// `began`/`moved`, false for `ended`; the injector does not
    /// interpolate between points, so each call produces one message.
    pub fn touch(x_ratio: f64, y_ratio: f64, down: bool) -> Self {
        let mut msg = Self::zeroed(EVENT_KIND_TOUCH);
        let record = TouchRecord {
            x_ratio: x_ratio as f32,
            y_ratio: y_ratio as f32,
            down: down as u32,
            down2: down as u32,
        };
        msg.payload_a.touch = record;
        msg.payload_b.touch = record;
        msg
    }

    /// Build a button-class message. Used for both `button` and `key`
    /// commands - the wire format does not distinguish them, only the
    /// dispatcher's `Command` variant does.
    pub fn button(identifier: u32, down: bool) -> Self {
        let mut msg = Self::zeroed(EVENT_KIND_BUTTON);
        let record = ButtonRecord {
            identifier,
            down: down as u32,
        };
        msg.payload_a.button = record;
        msg.payload_b.button = record;
        msg
    }

    /// Borrow the message as its raw wire bytes, for submission to the HID
    /// client.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self as *const Self as *const u8,
                std::mem::size_of::<Self>(),
            )
        }
    }

    pub fn len(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

/// `mach_absolute_time()` - a monotonic tick count, not wall-clock time; the
/// host's tooling uses it as the message timestamp and this injector
/// matches that rather than converting to any calendar representation.
fn mach_absolute_time() -> u64 {
    unsafe { mach2::mach_time::mach_absolute_time() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_message_sets_down_flags() {
        let msg = HidMessage::touch(0.5, 0.25, true);
        unsafe {
            assert_eq!(msg.payload_a.touch.down, 1);
            assert_eq!(msg.payload_a.touch.down2, 1);
            assert_eq!(msg.payload_b.touch.down, 1);
        }
    }

    #[test]
    fn touch_ended_clears_down_flags() {
        let msg = HidMessage::touch(0.5, 0.25, false);
        unsafe {
            assert_eq!(msg.payload_a.touch.down, 0);
            assert_eq!(msg.payload_b.touch.down2, 0);
        }
    }

    #[test]
    fn discriminators_differ_between_copies() {
        let msg = HidMessage::touch(0.1, 0.1, true);
        assert_eq!(msg.discriminator_a, 0x0000_0001);
        assert_eq!(msg.discriminator_b, 0x0000_0002);
    }

    #[test]
    fn button_message_carries_identifier() {
        let msg = HidMessage::button(7, true);
        unsafe {
            assert_eq!(msg.payload_a.button.identifier, 7);
            assert_eq!(msg.payload_a.button.down, 1);
        }
    }

    #[test]
    fn message_byte_length_matches_struct_size() {
        let msg = HidMessage::touch(0.0, 0.0, true);
        assert_eq!(msg.as_bytes().len(), msg.len());
        assert_eq!(msg.len(), std::mem::size_of::<HidMessage>());
    }

    #[test]
    fn inner_size_field_matches_total_length() {
        let msg = HidMessage::touch(0.2, 0.3, false);
        assert_eq!(msg.header.inner_size as usize, msg.len());
    }
}
