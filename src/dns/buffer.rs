//! byte buffers for reading and writing DNS wire data

use derive_more::Display;

/// Tags for codec failures. Every bad read surfaces as one of these,
/// never as a panic.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[display(fmt = "buffer too short")]
    BufferTooShort,
    #[display(fmt = "invalid label")]
    InvalidLabel,
    #[display(fmt = "unsupported query")]
    UnsupportedQuery,
    #[display(fmt = "compression pointer loop")]
    PointerLoop,
}

impl std::error::Error for DecodeError {}

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Pointer chains longer than this are treated as a loop.
const MAX_JUMPS: usize = 5;

pub trait PacketBuffer {
    fn read(&mut self) -> Result<u8>;
    fn get(&self, pos: usize) -> Result<u8>;
    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]>;
    fn write(&mut self, val: u8) -> Result<()>;
    fn pos(&self) -> usize;
    fn seek(&mut self, pos: usize) -> Result<()>;
    fn step(&mut self, steps: usize) -> Result<()>;

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write((val >> 8) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write(((val >> 24) & 0xFF) as u8)?;
        self.write(((val >> 16) & 0xFF) as u8)?;
        self.write(((val >> 8) & 0xFF) as u8)?;
        self.write((val & 0xFF) as u8)?;

        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16> {
        let res = ((self.read()? as u16) << 8) | (self.read()? as u16);

        Ok(res)
    }

    fn read_u32(&mut self) -> Result<u32> {
        let res = ((self.read()? as u32) << 24)
            | ((self.read()? as u32) << 16)
            | ((self.read()? as u32) << 8)
            | (self.read()? as u32);

        Ok(res)
    }

    /// Encoded size of a dotted name: one length byte per label plus the
    /// terminating zero label.
    fn qname_len(&self, qname: &str) -> usize {
        qname.split('.').map(|x| x.len() + 1).fold(1, |x, y| x + y)
    }

    fn write_qname(&mut self, qname: &str) -> Result<()> {
        for label in qname.split('.') {
            let len = label.len();
            if len == 0 || len > 63 {
                return Err(DecodeError::InvalidLabel);
            }

            self.write_u8(len as u8)?;
            for b in label.as_bytes() {
                self.write_u8(*b)?;
            }
        }

        self.write_u8(0)?;

        Ok(())
    }

    fn read_qname(&mut self, outstr: &mut String) -> Result<()> {
        let mut pos = self.pos();
        let mut jumped = false;
        let mut jumps = 0;

        let mut delim = "";
        loop {
            let len = self.get(pos)?;

            // A two byte sequence, where the two highest bits of the first
            // byte are set, represents an offset relative to the start of the
            // buffer. We handle this by jumping to the offset, setting a flag
            // to indicate that we shouldn't update the shared buffer position
            // once done.
            if (len & 0xC0) == 0xC0 {
                if jumps >= MAX_JUMPS {
                    return Err(DecodeError::PointerLoop);
                }

                // When a jump is performed, we only modify the shared buffer
                // position once, and avoid making the change later on.
                if !jumped {
                    self.seek(pos + 2)?;
                }

                let b2 = self.get(pos + 1)? as u16;
                let offset = (((len as u16) ^ 0xC0) << 8) | b2;
                pos = offset as usize;
                jumped = true;
                jumps += 1;
                continue;
            }

            pos += 1;

            // Names are terminated by an empty label of length 0
            if len == 0 {
                break;
            }

            outstr.push_str(delim);
            outstr.push_str(&String::from_utf8_lossy(
                self.get_range(pos, len as usize)?,
            ));
            delim = ".";

            pos += len as usize;
        }

        if !jumped {
            self.seek(pos)?;
        }

        Ok(())
    }
}

/// Growable buffer used when encoding replies.
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }
}

impl PacketBuffer for VectorPacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        if pos >= self.buffer.len() {
            return Err(DecodeError::BufferTooShort);
        }

        Ok(self.buffer[pos])
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        if start + len > self.buffer.len() {
            return Err(DecodeError::BufferTooShort);
        }

        Ok(&self.buffer[start..start + len])
    }

    fn write(&mut self, val: u8) -> Result<()> {
        self.buffer.push(val);
        self.pos += 1;

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        self.pos += steps;

        Ok(())
    }
}

/// Fixed size buffer matching the 512 byte UDP datagram limit. Reads are
/// bounded by the length of the received data, not the full 512 bytes.
pub struct BytePacketBuffer {
    pub buf: [u8; 512],
    pub pos: usize,
    len: usize,
}

impl BytePacketBuffer {
    pub fn new() -> BytePacketBuffer {
        BytePacketBuffer {
            buf: [0; 512],
            pos: 0,
            len: 0,
        }
    }

    pub fn from_slice(data: &[u8]) -> BytePacketBuffer {
        let mut res = BytePacketBuffer::new();
        let len = data.len().min(512);
        res.buf[..len].copy_from_slice(&data[..len]);
        res.len = len;

        res
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

impl PacketBuffer for BytePacketBuffer {
    fn read(&mut self) -> Result<u8> {
        let res = self.get(self.pos)?;
        self.pos += 1;

        Ok(res)
    }

    fn get(&self, pos: usize) -> Result<u8> {
        if pos >= self.len {
            return Err(DecodeError::BufferTooShort);
        }

        Ok(self.buf[pos])
    }

    fn get_range(&self, start: usize, len: usize) -> Result<&[u8]> {
        if start + len > self.len {
            return Err(DecodeError::BufferTooShort);
        }

        Ok(&self.buf[start..start + len])
    }

    fn write(&mut self, val: u8) -> Result<()> {
        if self.pos >= 512 {
            return Err(DecodeError::BufferTooShort);
        }
        self.buf[self.pos] = val;
        self.pos += 1;
        if self.pos > self.len {
            self.len = self.pos;
        }

        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn seek(&mut self, pos: usize) -> Result<()> {
        self.pos = pos;

        Ok(())
    }

    fn step(&mut self, steps: usize) -> Result<()> {
        self.pos += steps;

        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_qname_roundtrip() {
        let mut buffer = VectorPacketBuffer::new();
        buffer.write_qname("mail.google.com").unwrap();
        assert_eq!(17, buffer.buffer.len());
        assert_eq!(17, buffer.qname_len("mail.google.com"));

        buffer.seek(0).unwrap();
        let mut name = String::new();
        buffer.read_qname(&mut name).unwrap();
        assert_eq!("mail.google.com", name);
    }

    #[test]
    fn test_qname_pointer_decodes_to_name_at_target() {
        let mut buffer = VectorPacketBuffer::new();

        // 12 bytes standing in for a header, then the name, then a
        // pointer back to offset 12.
        for _ in 0..12 {
            buffer.write_u8(0).unwrap();
        }
        buffer.write_qname("google.com").unwrap();
        let pointer_pos = buffer.pos();
        buffer.write_u16(0xC00C).unwrap();

        buffer.seek(12).unwrap();
        let mut direct = String::new();
        buffer.read_qname(&mut direct).unwrap();

        buffer.seek(pointer_pos).unwrap();
        let mut via_pointer = String::new();
        buffer.read_qname(&mut via_pointer).unwrap();

        assert_eq!("google.com", direct);
        assert_eq!(direct, via_pointer);
        // Position continues past the two pointer bytes
        assert_eq!(pointer_pos + 2, buffer.pos());
    }

    #[test]
    fn test_qname_pointer_loop_is_rejected() {
        let mut buffer = VectorPacketBuffer::new();

        // A pointer at offset 0 aimed at itself
        buffer.write_u16(0xC000).unwrap();

        buffer.seek(0).unwrap();
        let mut name = String::new();
        assert_eq!(Err(DecodeError::PointerLoop), buffer.read_qname(&mut name));
    }

    #[test]
    fn test_truncated_read_is_an_error() {
        let mut buffer = BytePacketBuffer::from_slice(&[0x12, 0x34]);
        assert_eq!(0x1234, buffer.read_u16().unwrap());
        assert_eq!(Err(DecodeError::BufferTooShort), buffer.read_u16());
    }

    #[test]
    fn test_write_qname_rejects_oversized_label() {
        let mut buffer = VectorPacketBuffer::new();
        let label = "a".repeat(64);
        assert_eq!(Err(DecodeError::InvalidLabel), buffer.write_qname(&label));
    }
}
