//! The NDN TLV encoding, as far as name components need it.

use core::num::NonZeroU32;

pub trait Write {
    fn write(&mut self, bytes: &[u8]);
}

impl Write for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes)
    }
}

pub trait Encode {
    fn encoded_length(&self) -> usize;
    fn encode<W: Write>(&self, writer: &mut W);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TLV<'a> {
    pub typ: NonZeroU32,
    pub val: &'a [u8],
}

impl Encode for u64 {
    fn encoded_length(&self) -> usize {
        if *self <= 252 {
            1
        } else if *self <= 65535 {
            3
        } else if *self <= 4294967295 {
            5
        } else {
            9
        }
    }

    fn encode<W: Write>(&self, writer: &mut W) {
        if *self <= 252 {
            writer.write(&[*self as u8])
        } else if *self <= 65535 {
            writer.write(&[253]);
            writer.write(&(*self as u16).to_be_bytes())
        } else if *self <= 4294967295 {
            writer.write(&[254]);
            writer.write(&(*self as u32).to_be_bytes())
        } else {
            writer.write(&[255]);
            writer.write(&self.to_be_bytes())
        }
    }
}

impl<'a> Encode for TLV<'a> {
    fn encoded_length(&self) -> usize {
        let l = self.val.len();
        (self.typ.get() as u64).encoded_length() + (l as u64).encoded_length() + l
    }

    fn encode<W: Write>(&self, writer: &mut W) {
        (self.typ.get() as u64).encode(writer);
        (self.val.len() as u64).encode(writer);
        writer.write(self.val)
    }
}
