use dotmatrix_io_snapshot::{
    IoSnapshot, SnapshotError, SnapshotReader, SnapshotResult, SnapshotVersion, SnapshotWriter,
};

/// Size of the persisted hardware register block.
pub const IO_LEN: usize = 0x80;
/// Offset of the controller status register (FF41) within the block.
pub const IO_STAT: usize = 0x41;
/// Offset of the line-compare register (FF45) within the block.
pub const IO_LYC: usize = 0x45;

/// The slice of the emulator save state this core consumes and produces.
///
/// `io` is the raw FF00-relative hardware register file exactly as the
/// program last wrote it; it is owned and filled by the memory collaborator.
/// `lyc` is the comparator's latched compare value, which lags the raw FF45
/// byte when a write raced a pending match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub io: [u8; IO_LEN],
    pub lyc: u8,
}

impl Default for SaveState {
    fn default() -> Self {
        Self {
            io: [0; IO_LEN],
            lyc: 0,
        }
    }
}

impl IoSnapshot for SaveState {
    const DEVICE_ID: [u8; 4] = *b"VTIM";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        const TAG_IO: u16 = 1;
        const TAG_LYC: u16 = 2;

        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_IO, self.io.to_vec());
        w.field_u8(TAG_LYC, self.lyc);
        w.finish()
    }

    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        const TAG_IO: u16 = 1;
        const TAG_LYC: u16 = 2;

        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        *self = Self::default();

        if let Some(io) = r.bytes(TAG_IO) {
            if io.len() != IO_LEN {
                return Err(SnapshotError::InvalidFieldEncoding("io register block size"));
            }
            self.io.copy_from_slice(io);
        }
        if let Some(lyc) = r.u8(TAG_LYC)? {
            self.lyc = lyc;
        }

        Ok(())
    }
}
