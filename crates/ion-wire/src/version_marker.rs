use crate::error::WireError;

/// The Ion 1.0 binary version marker.
pub const IVM: [u8; 4] = [0xE0, 0x01, 0x00, 0xEA];

/// Size of a version marker in bytes.
pub const IVM_SIZE: usize = 4;

/// First byte of every version marker. At depth 0 it is never a valid
/// type descriptor, which is what makes the marker recognisable.
pub const IVM_START: u8 = 0xE0;

/// Last byte of every version marker.
pub const IVM_END: u8 = 0xEA;

/// A binary version marker.
///
/// ```text
/// ┌────────┬──────┬────────────────────┐
/// │ Offset │ Size │ Description        │
/// ├────────┼──────┼────────────────────┤
/// │ 0x00   │ 1    │ 0xE0               │
/// │ 0x01   │ 1    │ Major version      │
/// │ 0x02   │ 1    │ Minor version      │
/// │ 0x03   │ 1    │ 0xEA               │
/// └────────┴──────┴────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionMarker {
    pub major: u8,
    pub minor: u8,
}

impl VersionMarker {
    pub const ION_1_0: Self = Self { major: 1, minor: 0 };

    /// Whether this crate family can decode the marked stream.
    #[must_use]
    pub fn is_supported(self) -> bool {
        self == Self::ION_1_0
    }

    /// Write the four marker bytes into `buf`.
    ///
    /// # Errors
    ///
    /// [`WireError::UnexpectedEof`] if `buf` is shorter than [`IVM_SIZE`].
    pub fn write_to(self, buf: &mut [u8]) -> Result<(), WireError> {
        if buf.len() < IVM_SIZE {
            return Err(WireError::UnexpectedEof { offset: buf.len() });
        }
        buf[0] = IVM_START;
        buf[1] = self.major;
        buf[2] = self.minor;
        buf[3] = IVM_END;
        Ok(())
    }

    /// Parse a marker from the first four bytes of `buf`.
    ///
    /// # Errors
    ///
    /// - [`WireError::UnexpectedEof`] if fewer than four bytes are given.
    /// - [`WireError::InvalidVersionMarker`] if the framing bytes are wrong.
    /// - [`WireError::UnsupportedVersion`] for anything other than 1.0.
    pub fn read_from(buf: &[u8]) -> Result<Self, WireError> {
        let Some(bytes) = buf.get(..IVM_SIZE) else {
            return Err(WireError::UnexpectedEof { offset: buf.len() });
        };
        if bytes[0] != IVM_START || bytes[3] != IVM_END {
            return Err(WireError::InvalidVersionMarker {
                found: [bytes[0], bytes[1], bytes[2], bytes[3]],
            });
        }

        let marker = Self {
            major: bytes[1],
            minor: bytes[2],
        };
        if !marker.is_supported() {
            return Err(WireError::UnsupportedVersion {
                major: marker.major,
                minor: marker.minor,
            });
        }
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_ion_1_0() {
        let mut buf = [0u8; IVM_SIZE];
        VersionMarker::ION_1_0.write_to(&mut buf).unwrap();
        assert_eq!(buf, IVM);
        assert_eq!(VersionMarker::read_from(&buf).unwrap(), VersionMarker::ION_1_0);
    }

    #[test]
    fn rejects_bad_terminator() {
        let err = VersionMarker::read_from(&[0xE0, 0x01, 0x00, 0xEB]).unwrap_err();
        assert!(matches!(err, WireError::InvalidVersionMarker { found: [0xE0, 0x01, 0x00, 0xEB] }));
    }

    #[test]
    fn rejects_other_versions() {
        let err = VersionMarker::read_from(&[0xE0, 0x01, 0x01, 0xEA]).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedVersion { major: 1, minor: 1 }));
    }

    #[test]
    fn short_buffers() {
        assert!(matches!(
            VersionMarker::read_from(&[0xE0, 0x01]).unwrap_err(),
            WireError::UnexpectedEof { offset: 2 }
        ));
        assert!(VersionMarker::ION_1_0.write_to(&mut [0u8; 3]).is_err());
    }
}
