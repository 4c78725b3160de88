//! Pseudo-APDU framing for contactless readers
//!
//! PC/SC part 3 readers accept `FF CA` for the tag UID. Raw NFC-A frames go
//! through the PN53x `InCommunicateThru` command wrapped in a direct
//! transmit pseudo-APDU.

use crate::error::PcscError;

/// GET DATA pseudo-APDU returning the UID
pub(crate) const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

const DIRECT_TRANSMIT: [u8; 4] = [0xFF, 0x00, 0x00, 0x00];
const IN_COMMUNICATE_THRU: [u8; 2] = [0xD4, 0x42];
const IN_COMMUNICATE_THRU_ANSWER: [u8; 2] = [0xD5, 0x43];
const SW_SUCCESS: u16 = 0x9000;

/// PC/SC part 3 registered application provider ID in a contactless ATR
const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];
/// Card name codes used for MIFARE Ultralight family and NTAG
const TYPE2_CARD_NAMES: [u16; 3] = [0x0003, 0x003A, 0x003D];

/// Split a response into data and status word
pub(crate) fn split_status(response: &[u8]) -> Result<&[u8], PcscError> {
    let Some((data, sw)) = response.split_last_chunk::<2>() else {
        return Err(PcscError::PassThrough("response shorter than status word".into()));
    };
    match u16::from_be_bytes(*sw) {
        SW_SUCCESS => Ok(data),
        sw => Err(PcscError::Status(sw)),
    }
}

/// Wrap a raw frame in a direct transmit pseudo-APDU
pub(crate) fn wrap_frame(frame: &[u8]) -> Result<Vec<u8>, PcscError> {
    let lc = u8::try_from(frame.len() + IN_COMMUNICATE_THRU.len())
        .map_err(|_| PcscError::PassThrough("frame too long".into()))?;
    let mut apdu = Vec::with_capacity(DIRECT_TRANSMIT.len() + 1 + lc as usize);
    apdu.extend_from_slice(&DIRECT_TRANSMIT);
    apdu.push(lc);
    apdu.extend_from_slice(&IN_COMMUNICATE_THRU);
    apdu.extend_from_slice(frame);
    Ok(apdu)
}

/// Extract the tag's answer from an `InCommunicateThru` response
pub(crate) fn unwrap_frame(response: &[u8]) -> Result<&[u8], PcscError> {
    let data = split_status(response)?;
    match data {
        [0xD5, 0x43, 0x00, answer @ ..] => Ok(answer),
        [0xD5, 0x43, status, ..] => Err(PcscError::PassThrough(format!(
            "reader status {status:#04X}"
        ))),
        _ if !data.starts_with(&IN_COMMUNICATE_THRU_ANSWER) => {
            Err(PcscError::PassThrough("unexpected answer header".into()))
        }
        _ => Err(PcscError::PassThrough("truncated answer".into())),
    }
}

/// Card name code of a PC/SC part 3 contactless ATR
pub(crate) fn contactless_card_name(atr: &[u8]) -> Option<u16> {
    let start = atr.windows(PCSC_RID.len()).position(|w| w == PCSC_RID)?;
    // RID, standard byte, then two bytes of card name
    let name = atr.get(start + PCSC_RID.len() + 1..start + PCSC_RID.len() + 3)?;
    Some(u16::from_be_bytes([name[0], name[1]]))
}

/// Whether an ATR announces a Type 2 (Ultralight / NTAG) tag
pub(crate) fn is_type2_atr(atr: &[u8]) -> bool {
    contactless_card_name(atr).is_some_and(|name| TYPE2_CARD_NAMES.contains(&name))
}
