use super::error::RadiotapError;
use super::layout;

pub struct RadiotapReader<'a> {
    header: &'a [u8],
}

impl<'a> RadiotapReader<'a> {
    pub fn new(header: &'a [u8]) -> Self {
        Self { header }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), RadiotapError> {
        if self.header.len() < needed {
            return Err(RadiotapError::TooShort {
                needed,
                actual: self.header.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, RadiotapError> {
        self.header
            .get(offset)
            .copied()
            .ok_or(RadiotapError::TooShort {
                needed: offset + 1,
                actual: self.header.len(),
            })
    }

    pub fn read_u16_le(&self, range: std::ops::Range<usize>) -> Result<u16, RadiotapError> {
        let bytes = self.read_slice(range)?;
        if bytes.len() != 2 {
            return Err(RadiotapError::TooShort {
                needed: 2,
                actual: bytes.len(),
            });
        }
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32_le(&self, offset: usize) -> Result<u32, RadiotapError> {
        let bytes = self.read_slice(offset..offset + 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], RadiotapError> {
        self.header
            .get(range.clone())
            .ok_or(RadiotapError::TooShort {
                needed: range.end,
                actual: self.header.len(),
            })
    }

    /// Walk the chain of present words and return how many there are.
    ///
    /// Every word has to sit inside the first `length` bytes; the optional
    /// fields they announce are not interpreted.
    pub fn count_present_words(&self, length: u16) -> Result<usize, RadiotapError> {
        let mut offset = layout::PRESENT_OFFSET;
        let mut words = 0;
        loop {
            if offset + layout::PRESENT_WORD_LEN > length as usize {
                return Err(RadiotapError::PresentWordsOverrun { length });
            }
            let word = self.read_u32_le(offset)?;
            words += 1;
            offset += layout::PRESENT_WORD_LEN;
            if word & layout::PRESENT_EXT_BIT == 0 {
                return Ok(words);
            }
        }
    }
}
