use thiserror::Error;

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("device id mismatch (expected {expected:?}, found {found:?})")]
    DeviceIdMismatch { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported device major version {found} (supported: {supported})")]
    UnsupportedDeviceMajorVersion { supported: u16, found: u16 },

    #[error("corrupt snapshot: {0}")]
    Corrupt(&'static str),

    #[error("invalid field encoding: {0}")]
    InvalidFieldEncoding(&'static str),
}

/// Device-level snapshot version.
///
/// Payloads with a different major version are rejected; minor bumps are
/// reserved for forward-compatible field additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

/// Header layout: 4-byte device id, `u16` major, `u16` minor, then fields.
/// Each field is `u16` tag, `u32` payload length, payload bytes, all
/// little-endian.
const HEADER_LEN: usize = 8;
const FIELD_HEADER_LEN: usize = 6;

/// Builds a TLV snapshot payload for one device.
///
/// `finish()` emits fields in ascending tag order regardless of the order the
/// `field_*` calls were made in, keeping the output canonical.
#[derive(Debug)]
pub struct SnapshotWriter {
    device_id: [u8; 4],
    version: SnapshotVersion,
    fields: Vec<(u16, Vec<u8>)>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], version: SnapshotVersion) -> Self {
        Self {
            device_id,
            version,
            fields: Vec::new(),
        }
    }

    pub fn field_u8(&mut self, tag: u16, value: u8) {
        self.fields.push((tag, vec![value]));
    }

    pub fn field_u16(&mut self, tag: u16, value: u16) {
        self.fields.push((tag, value.to_le_bytes().to_vec()));
    }

    pub fn field_u32(&mut self, tag: u16, value: u32) {
        self.fields.push((tag, value.to_le_bytes().to_vec()));
    }

    pub fn field_u64(&mut self, tag: u16, value: u64) {
        self.fields.push((tag, value.to_le_bytes().to_vec()));
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.fields.push((tag, vec![value as u8]));
    }

    pub fn field_bytes(&mut self, tag: u16, bytes: Vec<u8>) {
        self.fields.push((tag, bytes));
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.fields.sort_by_key(|(tag, _)| *tag);

        let payload_len: usize = self
            .fields
            .iter()
            .map(|(_, bytes)| FIELD_HEADER_LEN + bytes.len())
            .sum();
        let mut out = Vec::with_capacity(HEADER_LEN + payload_len);

        out.extend_from_slice(&self.device_id);
        out.extend_from_slice(&self.version.major.to_le_bytes());
        out.extend_from_slice(&self.version.minor.to_le_bytes());

        for (tag, bytes) in &self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }

        out
    }
}

/// Parses a TLV snapshot payload produced by [`SnapshotWriter`].
///
/// Tag accessors return `Ok(None)` for absent tags so loaders can keep their
/// defaults, and fields with tags the loader does not ask for are ignored.
#[derive(Debug)]
pub struct SnapshotReader<'a> {
    version: SnapshotVersion,
    fields: Vec<(u16, &'a [u8])>,
}

impl<'a> SnapshotReader<'a> {
    pub fn parse(bytes: &'a [u8], expected_id: [u8; 4]) -> SnapshotResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(SnapshotError::Corrupt("truncated header"));
        }
        let found: [u8; 4] = bytes[0..4].try_into().unwrap();
        if found != expected_id {
            return Err(SnapshotError::DeviceIdMismatch {
                expected: expected_id,
                found,
            });
        }
        let major = u16::from_le_bytes(bytes[4..6].try_into().unwrap());
        let minor = u16::from_le_bytes(bytes[6..8].try_into().unwrap());

        let mut fields: Vec<(u16, &'a [u8])> = Vec::new();
        let mut pos = HEADER_LEN;
        while pos < bytes.len() {
            if bytes.len() - pos < FIELD_HEADER_LEN {
                return Err(SnapshotError::Corrupt("truncated field header"));
            }
            let tag = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap());
            let len = u32::from_le_bytes(bytes[pos + 2..pos + 6].try_into().unwrap()) as usize;
            pos += FIELD_HEADER_LEN;
            if bytes.len() - pos < len {
                return Err(SnapshotError::Corrupt("truncated field payload"));
            }
            if fields.iter().any(|(t, _)| *t == tag) {
                return Err(SnapshotError::Corrupt("duplicate tag"));
            }
            fields.push((tag, &bytes[pos..pos + len]));
            pos += len;
        }

        Ok(Self {
            version: SnapshotVersion::new(major, minor),
            fields,
        })
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn ensure_device_major(&self, supported: u16) -> SnapshotResult<()> {
        if self.version.major != supported {
            return Err(SnapshotError::UnsupportedDeviceMajorVersion {
                supported,
                found: self.version.major,
            });
        }
        Ok(())
    }

    pub fn bytes(&self, tag: u16) -> Option<&'a [u8]> {
        self.fields
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, bytes)| *bytes)
    }

    pub fn u8(&self, tag: u16) -> SnapshotResult<Option<u8>> {
        match self.bytes(tag) {
            None => Ok(None),
            Some(&[value]) => Ok(Some(value)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding("u8 field size")),
        }
    }

    pub fn u16(&self, tag: u16) -> SnapshotResult<Option<u16>> {
        match self.bytes(tag) {
            None => Ok(None),
            Some(bytes) => bytes
                .try_into()
                .map(|b| Some(u16::from_le_bytes(b)))
                .map_err(|_| SnapshotError::InvalidFieldEncoding("u16 field size")),
        }
    }

    pub fn u32(&self, tag: u16) -> SnapshotResult<Option<u32>> {
        match self.bytes(tag) {
            None => Ok(None),
            Some(bytes) => bytes
                .try_into()
                .map(|b| Some(u32::from_le_bytes(b)))
                .map_err(|_| SnapshotError::InvalidFieldEncoding("u32 field size")),
        }
    }

    pub fn u64(&self, tag: u16) -> SnapshotResult<Option<u64>> {
        match self.bytes(tag) {
            None => Ok(None),
            Some(bytes) => bytes
                .try_into()
                .map(|b| Some(u64::from_le_bytes(b)))
                .map_err(|_| SnapshotError::InvalidFieldEncoding("u64 field size")),
        }
    }

    pub fn bool(&self, tag: u16) -> SnapshotResult<Option<bool>> {
        match self.u8(tag)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding("bool field value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: [u8; 4] = *b"TST0";
    const V1: SnapshotVersion = SnapshotVersion::new(1, 0);

    #[test]
    fn roundtrip_typed_fields() {
        let mut w = SnapshotWriter::new(ID, V1);
        w.field_u8(1, 0xAB);
        w.field_u16(2, 0xBEEF);
        w.field_u32(3, 0xDEAD_BEEF);
        w.field_u64(4, 0x0123_4567_89AB_CDEF);
        w.field_bool(5, true);
        w.field_bytes(6, vec![1, 2, 3]);

        let bytes = w.finish();
        let r = SnapshotReader::parse(&bytes, ID).unwrap();
        r.ensure_device_major(1).unwrap();
        assert_eq!(r.version(), V1);
        assert_eq!(r.u8(1).unwrap(), Some(0xAB));
        assert_eq!(r.u16(2).unwrap(), Some(0xBEEF));
        assert_eq!(r.u32(3).unwrap(), Some(0xDEAD_BEEF));
        assert_eq!(r.u64(4).unwrap(), Some(0x0123_4567_89AB_CDEF));
        assert_eq!(r.bool(5).unwrap(), Some(true));
        assert_eq!(r.bytes(6), Some(&[1, 2, 3][..]));
        assert_eq!(r.u8(99).unwrap(), None);
    }

    #[test]
    fn output_is_canonical_regardless_of_call_order() {
        let mut a = SnapshotWriter::new(ID, V1);
        a.field_u8(2, 20);
        a.field_u8(1, 10);

        let mut b = SnapshotWriter::new(ID, V1);
        b.field_u8(1, 10);
        b.field_u8(2, 20);

        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn device_id_mismatch_is_rejected() {
        let w = SnapshotWriter::new(ID, V1);
        let err = SnapshotReader::parse(&w.finish(), *b"OTHR").unwrap_err();
        assert_eq!(
            err,
            SnapshotError::DeviceIdMismatch {
                expected: *b"OTHR",
                found: ID,
            }
        );
    }

    #[test]
    fn unsupported_major_version_is_rejected() {
        let w = SnapshotWriter::new(ID, SnapshotVersion::new(2, 0));
        let bytes = w.finish();
        let r = SnapshotReader::parse(&bytes, ID).unwrap();
        assert_eq!(
            r.ensure_device_major(1).unwrap_err(),
            SnapshotError::UnsupportedDeviceMajorVersion {
                supported: 1,
                found: 2,
            }
        );
    }

    #[test]
    fn truncated_payloads_are_rejected() {
        let mut w = SnapshotWriter::new(ID, V1);
        w.field_bytes(1, vec![0; 16]);
        let full = w.finish();

        assert_eq!(
            SnapshotReader::parse(&full[..4], ID).unwrap_err(),
            SnapshotError::Corrupt("truncated header"),
        );
        assert_eq!(
            SnapshotReader::parse(&full[..HEADER_LEN + 3], ID).unwrap_err(),
            SnapshotError::Corrupt("truncated field header"),
        );
        assert_eq!(
            SnapshotReader::parse(&full[..full.len() - 1], ID).unwrap_err(),
            SnapshotError::Corrupt("truncated field payload"),
        );
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut w = SnapshotWriter::new(ID, V1);
        w.field_u8(7, 1);
        w.field_u8(7, 2);
        assert_eq!(
            SnapshotReader::parse(&w.finish(), ID).unwrap_err(),
            SnapshotError::Corrupt("duplicate tag"),
        );
    }

    #[test]
    fn wrong_size_field_is_an_encoding_error() {
        let mut w = SnapshotWriter::new(ID, V1);
        w.field_bytes(1, vec![0; 3]);
        let bytes = w.finish();
        let r = SnapshotReader::parse(&bytes, ID).unwrap();
        assert_eq!(
            r.u16(1).unwrap_err(),
            SnapshotError::InvalidFieldEncoding("u16 field size"),
        );
        assert_eq!(r.bytes(1), Some(&[0, 0, 0][..]));
    }
}
