use super::error::Ieee80211Error;
use super::layout;
use crate::protocols::common::reader::format_mac;

pub struct Ieee80211Reader<'a> {
    frame: &'a [u8],
}

impl<'a> Ieee80211Reader<'a> {
    pub fn new(frame: &'a [u8]) -> Self {
        Self { frame }
    }

    pub fn read_u16_le(&self, range: std::ops::Range<usize>) -> Result<u16, Ieee80211Error> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 2 {
            return Err(Ieee80211Error::TooShort {
                needed: 2,
                actual: bytes.len(),
            });
        }
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], Ieee80211Error> {
        self.frame
            .get(range.clone())
            .ok_or(Ieee80211Error::TooShort {
                needed: range.end,
                actual: self.frame.len(),
            })
    }

    /// Read a hardware address and render it in canonical form.
    pub fn read_mac(&self, range: std::ops::Range<usize>) -> Result<String, Ieee80211Error> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != layout::MAC_LEN {
            return Err(Ieee80211Error::TooShort {
                needed: layout::MAC_LEN,
                actual: bytes.len(),
            });
        }
        Ok(format_mac(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::Ieee80211Reader;
    use crate::protocols::ieee80211::error::Ieee80211Error;
    use crate::protocols::ieee80211::layout;

    #[test]
    fn read_duration_little_endian() {
        let frame = [0xb4, 0x00, 0xc4, 0x00];
        let reader = Ieee80211Reader::new(&frame);
        assert_eq!(reader.read_u16_le(layout::DURATION_RANGE).unwrap(), 196);
    }

    #[test]
    fn read_mac_past_end() {
        let frame = [0u8; 8];
        let reader = Ieee80211Reader::new(&frame);
        let err = reader.read_mac(layout::ADDR1_RANGE).unwrap_err();
        assert!(matches!(
            err,
            Ieee80211Error::TooShort {
                needed: 10,
                actual: 8
            }
        ));
    }
}
