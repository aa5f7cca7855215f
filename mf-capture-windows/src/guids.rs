use windows::core::GUID;
use windows::Win32::Media::MediaFoundation::{MFMediaType_Audio, MFMediaType_Video};

use mf_capture_core::models::device::MajorType;

/// `XXXXXXXX-0000-0010-8000-00AA00389B71`: FourCC and WAVE format tag subtypes
/// differ only in the first field.
const SUBTYPE_BASE: GUID = GUID::from_values(
    0,
    0x0000,
    0x0010,
    [0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71],
);

/// FourCC / format tag carried by a standard subtype GUID.
pub fn subtype_code(subtype: &GUID) -> Option<u32> {
    let standard = subtype.data2 == SUBTYPE_BASE.data2
        && subtype.data3 == SUBTYPE_BASE.data3
        && subtype.data4 == SUBTYPE_BASE.data4;
    standard.then_some(subtype.data1)
}

pub fn major_type(guid: &GUID) -> MajorType {
    if *guid == MFMediaType_Video {
        MajorType::Video
    } else if *guid == MFMediaType_Audio {
        MajorType::Audio
    } else {
        MajorType::Other
    }
}
