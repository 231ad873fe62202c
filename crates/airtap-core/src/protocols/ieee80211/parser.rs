use serde::{Serialize, Serializer};

use super::error::Ieee80211Error;
use super::layout;
use super::reader::Ieee80211Reader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Mgmt,
    Ctrl,
    Data,
}

impl FrameType {
    fn from_bits(bits: u8) -> Result<Self, Ieee80211Error> {
        match bits {
            layout::TYPE_MGMT => Ok(FrameType::Mgmt),
            layout::TYPE_CTRL => Ok(FrameType::Ctrl),
            layout::TYPE_DATA => Ok(FrameType::Data),
            layout::TYPE_EXTENSION => Err(Ieee80211Error::ExtensionFrame),
            _ => unreachable!("frame type is a 2-bit field"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FrameSubtype {
    // Management
    AssocReq,
    AssocResp,
    ReassocReq,
    ReassocResp,
    ProbeReq,
    ProbeResp,
    TimingAdvert,
    Beacon,
    Atim,
    Disassoc,
    Auth,
    Deauth,
    Action,
    ActionNoAck,
    // Control
    Trigger,
    BeamformingReportPoll,
    VhtNdpAnnouncement,
    ControlWrapper,
    BlockAckReq,
    BlockAck,
    PsPoll,
    Rts,
    Cts,
    Ack,
    CfEnd,
    CfEndAck,
    // Data
    Data,
    DataCfAck,
    DataCfPoll,
    DataCfAckPoll,
    Null,
    CfAck,
    CfPoll,
    CfAckPoll,
    QosData,
    QosDataCfAck,
    QosDataCfPoll,
    QosDataCfAckPoll,
    QosNull,
    QosCfPoll,
    QosCfAckPoll,
}

impl FrameSubtype {
    fn from_bits(frame_type: FrameType, bits: u8) -> Result<Self, Ieee80211Error> {
        use FrameSubtype::*;

        let subtype = match (frame_type, bits) {
            (FrameType::Mgmt, 0) => AssocReq,
            (FrameType::Mgmt, 1) => AssocResp,
            (FrameType::Mgmt, 2) => ReassocReq,
            (FrameType::Mgmt, 3) => ReassocResp,
            (FrameType::Mgmt, 4) => ProbeReq,
            (FrameType::Mgmt, 5) => ProbeResp,
            (FrameType::Mgmt, 6) => TimingAdvert,
            (FrameType::Mgmt, 8) => Beacon,
            (FrameType::Mgmt, 9) => Atim,
            (FrameType::Mgmt, 10) => Disassoc,
            (FrameType::Mgmt, 11) => Auth,
            (FrameType::Mgmt, 12) => Deauth,
            (FrameType::Mgmt, 13) => Action,
            (FrameType::Mgmt, 14) => ActionNoAck,
            (FrameType::Ctrl, 2) => Trigger,
            (FrameType::Ctrl, 4) => BeamformingReportPoll,
            (FrameType::Ctrl, 5) => VhtNdpAnnouncement,
            (FrameType::Ctrl, 7) => ControlWrapper,
            (FrameType::Ctrl, 8) => BlockAckReq,
            (FrameType::Ctrl, 9) => BlockAck,
            (FrameType::Ctrl, 10) => PsPoll,
            (FrameType::Ctrl, 11) => Rts,
            (FrameType::Ctrl, 12) => Cts,
            (FrameType::Ctrl, 13) => Ack,
            (FrameType::Ctrl, 14) => CfEnd,
            (FrameType::Ctrl, 15) => CfEndAck,
            (FrameType::Data, 0) => Data,
            (FrameType::Data, 1) => DataCfAck,
            (FrameType::Data, 2) => DataCfPoll,
            (FrameType::Data, 3) => DataCfAckPoll,
            (FrameType::Data, 4) => Null,
            (FrameType::Data, 5) => CfAck,
            (FrameType::Data, 6) => CfPoll,
            (FrameType::Data, 7) => CfAckPoll,
            (FrameType::Data, 8) => QosData,
            (FrameType::Data, 9) => QosDataCfAck,
            (FrameType::Data, 10) => QosDataCfPoll,
            (FrameType::Data, 11) => QosDataCfAckPoll,
            (FrameType::Data, 12) => QosNull,
            (FrameType::Data, 14) => QosCfPoll,
            (FrameType::Data, 15) => QosCfAckPoll,
            (frame_type, subtype) => {
                return Err(Ieee80211Error::ReservedSubtype {
                    frame_type,
                    subtype,
                });
            }
        };
        Ok(subtype)
    }

    /// Control frames that carry a transmitter address after the receiver.
    fn has_transmitter(self) -> bool {
        !matches!(
            self,
            FrameSubtype::Cts | FrameSubtype::Ack | FrameSubtype::ControlWrapper
        )
    }
}

/// Frame-control flags are written as the 0/1 bit they were read from.
fn flag_bit<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

/// Decoded 802.11 MAC header.
///
/// Which of the optional addresses are present depends on the frame type and
/// on the distribution-system flags; absent addresses are not serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ieee80211Frame {
    pub version: u8,
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub sub_type: FrameSubtype,
    #[serde(serialize_with = "flag_bit")]
    pub to_ds: bool,
    #[serde(serialize_with = "flag_bit")]
    pub from_ds: bool,
    pub duration: u16,
    /// Receiver address (address 1), present on every frame.
    pub ra: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub da: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bssid: Option<String>,
}

/// Decode the MAC header of a raw 802.11 frame (no radio header in front).
pub fn decode_ieee80211(frame: &[u8]) -> Result<Ieee80211Frame, Ieee80211Error> {
    let reader = Ieee80211Reader::new(frame);

    let control = reader.read_slice(layout::FRAME_CONTROL_RANGE)?;
    let (fc, flags) = (control[0], control[1]);
    let version = fc & layout::VERSION_MASK;
    let frame_type = FrameType::from_bits((fc & layout::TYPE_MASK) >> layout::TYPE_SHIFT)?;
    let sub_type = FrameSubtype::from_bits(frame_type, fc >> layout::SUBTYPE_SHIFT)?;
    let to_ds = flags & layout::FLAG_TO_DS != 0;
    let from_ds = flags & layout::FLAG_FROM_DS != 0;

    let duration = reader.read_u16_le(layout::DURATION_RANGE)?;
    let ra = reader.read_mac(layout::ADDR1_RANGE)?;

    let mut decoded = Ieee80211Frame {
        version,
        frame_type,
        sub_type,
        to_ds,
        from_ds,
        duration,
        ra,
        ta: None,
        da: None,
        sa: None,
        bssid: None,
    };

    match frame_type {
        FrameType::Ctrl => {
            if sub_type.has_transmitter() {
                decoded.ta = Some(reader.read_mac(layout::ADDR2_RANGE)?);
            }
        }
        FrameType::Mgmt => {
            let ta = reader.read_mac(layout::ADDR2_RANGE)?;
            decoded.bssid = Some(reader.read_mac(layout::ADDR3_RANGE)?);
            decoded.da = Some(decoded.ra.clone());
            decoded.sa = Some(ta.clone());
            decoded.ta = Some(ta);
        }
        FrameType::Data => {
            let ta = reader.read_mac(layout::ADDR2_RANGE)?;
            match (to_ds, from_ds) {
                (false, false) => {
                    decoded.bssid = Some(reader.read_mac(layout::ADDR3_RANGE)?);
                    decoded.da = Some(decoded.ra.clone());
                    decoded.sa = Some(ta.clone());
                }
                (false, true) => {
                    decoded.da = Some(decoded.ra.clone());
                    decoded.bssid = Some(ta.clone());
                }
                (true, false) => {
                    decoded.bssid = Some(decoded.ra.clone());
                    decoded.sa = Some(ta.clone());
                }
                (true, true) => return Err(Ieee80211Error::FourAddress),
            }
            decoded.ta = Some(ta);
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::{FrameSubtype, FrameType, decode_ieee80211};
    use crate::protocols::ieee80211::error::Ieee80211Error;

    fn frame(fc: [u8; 2], addresses: usize) -> Vec<u8> {
        let mut bytes = vec![fc[0], fc[1], 0x00, 0x00];
        for i in 0..addresses {
            bytes.extend_from_slice(&[i as u8 + 1; 6]);
        }
        bytes
    }

    #[test]
    fn decode_null_data_between_stations() {
        let decoded = decode_ieee80211(&frame([0x48, 0x00], 3)).unwrap();
        assert_eq!(decoded.frame_type, FrameType::Data);
        assert_eq!(decoded.sub_type, FrameSubtype::Null);
        assert_eq!(decoded.da.as_deref(), Some("01:01:01:01:01:01"));
        assert_eq!(decoded.sa.as_deref(), Some("02:02:02:02:02:02"));
        assert_eq!(decoded.bssid.as_deref(), Some("03:03:03:03:03:03"));
    }

    #[test]
    fn decode_ps_poll_has_transmitter() {
        let decoded = decode_ieee80211(&frame([0xa4, 0x00], 2)).unwrap();
        assert_eq!(decoded.sub_type, FrameSubtype::PsPoll);
        assert_eq!(decoded.ta.as_deref(), Some("02:02:02:02:02:02"));
        assert!(decoded.bssid.is_none());
    }

    #[test]
    fn reject_four_address_data() {
        let err = decode_ieee80211(&frame([0x08, 0x03], 4)).unwrap_err();
        assert!(matches!(err, Ieee80211Error::FourAddress));
    }

    #[test]
    fn reject_extension_type() {
        let err = decode_ieee80211(&frame([0x0c, 0x00], 2)).unwrap_err();
        assert!(matches!(err, Ieee80211Error::ExtensionFrame));
    }

    #[test]
    fn reject_reserved_management_subtype() {
        let err = decode_ieee80211(&frame([0x70, 0x00], 3)).unwrap_err();
        assert!(matches!(
            err,
            Ieee80211Error::ReservedSubtype {
                frame_type: FrameType::Mgmt,
                subtype: 7
            }
        ));
    }

    #[test]
    fn truncated_beacon_is_too_short() {
        let err = decode_ieee80211(&frame([0x80, 0x00], 2)).unwrap_err();
        assert!(matches!(
            err,
            Ieee80211Error::TooShort {
                needed: 22,
                actual: 16
            }
        ));
    }

    #[test]
    fn empty_input_is_too_short() {
        let err = decode_ieee80211(&[]).unwrap_err();
        assert!(matches!(err, Ieee80211Error::TooShort { needed: 2, .. }));
    }
}
