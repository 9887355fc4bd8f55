//! Final-block padding schemes for the chained cipher modes.
//!
//! `add_padding` fills `buf[from..]` in place; `padding_length` measures
//! the trailer of a decrypted final block. A measured length never
//! exceeds the block, and a trailer that cannot have been produced by
//! the scheme reports [`Error::PaddingInvalid`].
//!
//! Zero padding is not length-recoverable in general; its measured
//! length is the trailing-zero run, which only round-trips when the
//! plaintext does not itself end in zero bytes.

use crate::{Error, Result};

/// Selector for the supported padding schemes.
///
/// The wire value is used by the cipher description record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PaddingKind {
    None = 0,
    Pkcs7 = 1,
    X923 = 2,
    Iso7816 = 3,
    Tbc = 4,
    Zero = 5,
}

impl TryFrom<u8> for PaddingKind {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Pkcs7),
            2 => Ok(Self::X923),
            3 => Ok(Self::Iso7816),
            4 => Ok(Self::Tbc),
            5 => Ok(Self::Zero),
            _ => Err(Error::InvalidArgument("unknown padding identifier")),
        }
    }
}

impl PaddingKind {
    /// Fill `buf[from..]` with this scheme's trailer.
    ///
    /// TBC pads with the bit-complement of the last data bit; with no
    /// data in the block (`from == 0`) the prior bit is taken as zero.
    pub fn add_padding(self, buf: &mut [u8], from: usize) {
        debug_assert!(from <= buf.len());
        let fill = buf.len() - from;
        if fill == 0 {
            return;
        }
        match self {
            Self::None => {}
            Self::Pkcs7 => buf[from..].fill(fill as u8),
            Self::X923 => {
                buf[from..].fill(0);
                buf[buf.len() - 1] = fill as u8;
            }
            Self::Iso7816 => {
                buf[from..].fill(0);
                buf[from] = 0x80;
            }
            Self::Tbc => {
                let last_bit = if from > 0 { buf[from - 1] & 1 } else { 0 };
                let pad = if last_bit == 0 { 0xFF } else { 0x00 };
                buf[from..].fill(pad);
            }
            Self::Zero => buf[from..].fill(0),
        }
    }

    /// Measure the trailer length of a decrypted final block.
    pub fn padding_length(self, buf: &[u8]) -> Result<usize> {
        let len = buf.len();
        if len == 0 {
            return Ok(0);
        }
        match self {
            Self::None => Ok(0),
            Self::Pkcs7 => {
                let n = buf[len - 1] as usize;
                if n == 0 || n > len {
                    return Err(Error::PaddingInvalid);
                }
                if buf[len - n..].iter().any(|&b| b != n as u8) {
                    return Err(Error::PaddingInvalid);
                }
                Ok(n)
            }
            Self::X923 => {
                let n = buf[len - 1] as usize;
                if n == 0 || n > len {
                    return Err(Error::PaddingInvalid);
                }
                if buf[len - n..len - 1].iter().any(|&b| b != 0) {
                    return Err(Error::PaddingInvalid);
                }
                Ok(n)
            }
            Self::Iso7816 => {
                let mut i = len;
                while i > 0 && buf[i - 1] == 0 {
                    i -= 1;
                }
                if i == 0 || buf[i - 1] != 0x80 {
                    return Err(Error::PaddingInvalid);
                }
                Ok(len - i + 1)
            }
            Self::Tbc => {
                let v = buf[len - 1];
                if v != 0x00 && v != 0xFF {
                    return Ok(0);
                }
                let run = buf.iter().rev().take_while(|&&b| b == v).count();
                Ok(run.min(len))
            }
            Self::Zero => Ok(buf.iter().rev().take_while(|&&b| b == 0).count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 16;

    #[test]
    fn pkcs7_round_trip() {
        for data_len in 0..BLOCK {
            let mut buf = [0xABu8; BLOCK];
            PaddingKind::Pkcs7.add_padding(&mut buf, data_len);
            assert_eq!(
                PaddingKind::Pkcs7.padding_length(&buf).unwrap(),
                BLOCK - data_len
            );
        }
    }

    #[test]
    fn pkcs7_rejects_inconsistent_trailer() {
        let mut buf = [0u8; BLOCK];
        buf[BLOCK - 1] = 4;
        buf[BLOCK - 2] = 9;
        assert!(matches!(
            PaddingKind::Pkcs7.padding_length(&buf),
            Err(Error::PaddingInvalid)
        ));
        let mut over = [0u8; BLOCK];
        over[BLOCK - 1] = 17;
        assert!(PaddingKind::Pkcs7.padding_length(&over).is_err());
    }

    #[test]
    fn x923_round_trip_and_rejection() {
        let mut buf = [0x5Au8; BLOCK];
        PaddingKind::X923.add_padding(&mut buf, 10);
        assert_eq!(buf[10..15], [0, 0, 0, 0, 0]);
        assert_eq!(buf[15], 6);
        assert_eq!(PaddingKind::X923.padding_length(&buf).unwrap(), 6);

        buf[12] = 1;
        assert!(PaddingKind::X923.padding_length(&buf).is_err());
    }

    #[test]
    fn iso7816_round_trip_and_rejection() {
        let mut buf = [0x77u8; BLOCK];
        PaddingKind::Iso7816.add_padding(&mut buf, 5);
        assert_eq!(buf[5], 0x80);
        assert!(buf[6..].iter().all(|&b| b == 0));
        assert_eq!(PaddingKind::Iso7816.padding_length(&buf).unwrap(), 11);

        let zeros = [0u8; BLOCK];
        assert!(PaddingKind::Iso7816.padding_length(&zeros).is_err());
    }

    #[test]
    fn tbc_complements_last_data_bit() {
        let mut even = [0x02u8; BLOCK];
        PaddingKind::Tbc.add_padding(&mut even, 4);
        assert!(even[4..].iter().all(|&b| b == 0xFF));

        let mut odd = [0x03u8; BLOCK];
        PaddingKind::Tbc.add_padding(&mut odd, 4);
        assert!(odd[4..].iter().all(|&b| b == 0x00));
        assert_eq!(PaddingKind::Tbc.padding_length(&odd).unwrap(), 12);
    }

    #[test]
    fn length_never_exceeds_block() {
        let buffers = [[0u8; BLOCK], [0xFFu8; BLOCK], [0x80u8; BLOCK]];
        for kind in [
            PaddingKind::None,
            PaddingKind::Pkcs7,
            PaddingKind::X923,
            PaddingKind::Iso7816,
            PaddingKind::Tbc,
            PaddingKind::Zero,
        ] {
            for buf in &buffers {
                if let Ok(n) = kind.padding_length(buf) {
                    assert!(n <= BLOCK, "{kind:?}");
                }
            }
        }
    }

    #[test]
    fn full_block_of_padding() {
        let mut buf = [0xEEu8; BLOCK];
        PaddingKind::Pkcs7.add_padding(&mut buf, 0);
        assert!(buf.iter().all(|&b| b == BLOCK as u8));
        assert_eq!(PaddingKind::Pkcs7.padding_length(&buf).unwrap(), BLOCK);
    }
}
