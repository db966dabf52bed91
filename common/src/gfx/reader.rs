/// Little-endian cursor over a byte slice used by the asset parsers.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unexpected end of data: needed {needed} bytes at offset {offset}, {available} available")]
pub struct UnexpectedEof {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], UnexpectedEof> {
        if self.remaining() < len {
            return Err(UnexpectedEof {
                offset: self.position,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], UnexpectedEof> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    pub fn read_u32(&mut self) -> Result<u32, UnexpectedEof> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Result<i32, UnexpectedEof> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Result<f32, UnexpectedEof> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), UnexpectedEof> {
        self.read_bytes(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_endian_values() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        bytes.extend_from_slice(&(-5i32).to_le_bytes());
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(reader.read_i32().unwrap(), -5);
        assert_eq!(reader.read_f32().unwrap(), 1.5);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn short_read_reports_offset() {
        let mut reader = ByteReader::new(&[1, 2, 3, 4, 5]);
        reader.skip(2).unwrap();
        let err = reader.read_u32().unwrap_err();
        assert_eq!(
            err,
            UnexpectedEof {
                offset: 2,
                needed: 4,
                available: 3
            }
        );
        // A failed read does not move the cursor.
        assert_eq!(reader.position(), 2);
    }
}
