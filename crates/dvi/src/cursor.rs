//! Random-access reader over DVI bytes.

use super::InvalidDviData;

/// Position-tracked reader that decodes the big-endian integers used in DVI data.
///
/// Every read either consumes exactly the number of bytes it decodes
/// or fails with [`InvalidDviData::UnexpectedEndOfFile`] without moving the cursor.
/// Missing bytes are never treated as zeros.
///
/// ```
/// let data = vec![1, 2, 255, 254, 0];
/// let mut cursor = dvi::ByteCursor::new(&data);
/// assert_eq![cursor.u16(), Ok(258)];
/// assert_eq![cursor.i16(), Ok(-2)];
/// assert_eq![cursor.position(), 4];
/// assert_eq![
///     cursor.i16(),
///     Err(dvi::InvalidDviData::UnexpectedEndOfFile { offset: 4 }),
/// ];
/// ```
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    b: &'a [u8],
    pos: u64,
}

impl<'a> ByteCursor<'a> {
    /// Create a new cursor positioned at the first byte.
    pub fn new(b: &'a [u8]) -> Self {
        Self { b, pos: 0 }
    }

    /// The offset of the next byte to be read.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Total length of the underlying data.
    pub fn len(&self) -> u64 {
        self.b.len() as u64
    }

    /// Returns true if the underlying data is empty.
    pub fn is_empty(&self) -> bool {
        self.b.is_empty()
    }

    /// Returns true if there are no more bytes after the current position.
    pub fn at_end(&self) -> bool {
        self.pos >= self.len()
    }

    /// Move the cursor to the provided offset.
    ///
    /// Seeking past the end is allowed; the next read will then fail.
    pub fn seek(&mut self, offset: u64) {
        self.pos = offset;
    }

    pub fn u8(&mut self) -> Result<u8, InvalidDviData> {
        Ok(u8::from_be_bytes(self.get::<1>()?))
    }

    pub fn u16(&mut self) -> Result<u16, InvalidDviData> {
        Ok(u16::from_be_bytes(self.get::<2>()?))
    }

    pub fn u24(&mut self) -> Result<u32, InvalidDviData> {
        let bs = self.get::<3>()?;
        Ok(u32::from_be_bytes([0, bs[0], bs[1], bs[2]]))
    }

    pub fn i8(&mut self) -> Result<i8, InvalidDviData> {
        Ok(i8::from_be_bytes(self.get::<1>()?))
    }

    pub fn i16(&mut self) -> Result<i16, InvalidDviData> {
        Ok(i16::from_be_bytes(self.get::<2>()?))
    }

    pub fn i24(&mut self) -> Result<i32, InvalidDviData> {
        let bs = self.get::<3>()?;
        // Sign-extend from the top bit of the first byte.
        let fill = if bs[0] >= 128 { 255 } else { 0 };
        Ok(i32::from_be_bytes([fill, bs[0], bs[1], bs[2]]))
    }

    pub fn i32(&mut self) -> Result<i32, InvalidDviData> {
        Ok(i32::from_be_bytes(self.get::<4>()?))
    }

    pub fn u32(&mut self) -> Result<u32, InvalidDviData> {
        Ok(u32::from_be_bytes(self.get::<4>()?))
    }

    /// Read `n` raw bytes.
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], InvalidDviData> {
        let start = self.start()?;
        let Some(bytes) = self.b[start..].get(..n) else {
            return Err(InvalidDviData::UnexpectedEndOfFile { offset: self.pos });
        };
        self.pos += n as u64;
        Ok(bytes)
    }

    fn start(&self) -> Result<usize, InvalidDviData> {
        match usize::try_from(self.pos) {
            Ok(start) if start <= self.b.len() => Ok(start),
            _ => Err(InvalidDviData::UnexpectedEndOfFile { offset: self.pos }),
        }
    }

    fn get<const N: usize>(&mut self) -> Result<[u8; N], InvalidDviData> {
        let start = self.start()?;
        let Some(head) = self.b[start..].first_chunk::<N>() else {
            return Err(InvalidDviData::UnexpectedEndOfFile { offset: self.pos });
        };
        self.pos += N as u64;
        Ok(*head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: [u8; 4] = [1, 2, 3, 4];
    const B: [u8; 4] = [129, 2, 3, 4];

    #[test]
    fn unsigned_reads() {
        let mut c = ByteCursor::new(&A);
        assert_eq!(c.u8(), Ok(1));
        let mut c = ByteCursor::new(&A);
        assert_eq!(c.u16(), Ok(258));
        let mut c = ByteCursor::new(&B);
        assert_eq!(c.u24(), Ok(129 * 256 * 256 + 2 * 256 + 3));
        assert_eq!(c.position(), 3);
    }

    #[test]
    fn signed_reads() {
        let mut c = ByteCursor::new(&B);
        assert_eq!(c.i8(), Ok(-127));
        let mut c = ByteCursor::new(&B);
        assert_eq!(c.i16(), Ok(-32510));
        let mut c = ByteCursor::new(&B);
        assert_eq!(c.i24(), Ok(-8322557));
        let mut c = ByteCursor::new(&B);
        assert_eq!(c.i32(), Ok(-2130574588));
        assert!(c.at_end());
    }

    #[test]
    fn signed_decode_inverts_encode() {
        fn encode(v: i32, n: usize) -> Vec<u8> {
            v.to_be_bytes()[4 - n..].to_vec()
        }
        let cases: [(usize, i32, i32); 4] = [
            (1, -128, 127),
            (2, -32768, 32767),
            (3, -(1 << 23), (1 << 23) - 1),
            (4, i32::MIN, i32::MAX),
        ];
        for (n, min, max) in cases {
            for v in [min, min + 1, -1, 0, 1, max - 1, max] {
                let b = encode(v, n);
                let mut c = ByteCursor::new(&b);
                let got = match n {
                    1 => c.i8().map(i32::from),
                    2 => c.i16().map(i32::from),
                    3 => c.i24(),
                    _ => c.i32(),
                };
                assert_eq!(got, Ok(v), "width {n}");
                assert_eq!(c.position(), n as u64);
            }
        }
    }

    #[test]
    fn truncated_read_fails_without_advancing() {
        let mut c = ByteCursor::new(&A);
        c.seek(2);
        assert_eq!(
            c.i24(),
            Err(InvalidDviData::UnexpectedEndOfFile { offset: 2 })
        );
        assert_eq!(c.position(), 2);
        assert_eq!(c.u16(), Ok(3 * 256 + 4));
    }

    #[test]
    fn seek_past_end() {
        let mut c = ByteCursor::new(&A);
        c.seek(100);
        assert!(c.at_end());
        assert_eq!(
            c.u8(),
            Err(InvalidDviData::UnexpectedEndOfFile { offset: 100 })
        );
        assert_eq!(
            c.bytes(1),
            Err(InvalidDviData::UnexpectedEndOfFile { offset: 100 })
        );
    }

    #[test]
    fn bytes() {
        let mut c = ByteCursor::new(&A);
        assert_eq!(c.bytes(3), Ok(&A[..3]));
        assert_eq!(
            c.bytes(2),
            Err(InvalidDviData::UnexpectedEndOfFile { offset: 3 })
        );
    }
}
