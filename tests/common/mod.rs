//! Synthetic MFT image builder shared by the integration tests

#![allow(dead_code)]

pub const RECORD_SIZE: usize = 1024;
pub const FIRST_ATTRIBUTE: usize = 56;

/// 2020-01-01T00:00:00Z
pub const T2020: u64 = 132_223_104_000_000_000;

/// One record block under construction
pub struct RecordBuilder {
    data: Vec<u8>,
    cursor: usize,
}

impl RecordBuilder {
    pub fn new(record_number: u32) -> Self {
        let mut data = vec![0u8; RECORD_SIZE];
        data[0..4].copy_from_slice(b"FILE");
        data[4..6].copy_from_slice(&48u16.to_le_bytes());
        data[6..8].copy_from_slice(&3u16.to_le_bytes());
        data[8..16].copy_from_slice(&0x1122_3344u64.to_le_bytes());
        data[16..18].copy_from_slice(&1u16.to_le_bytes());
        data[18..20].copy_from_slice(&1u16.to_le_bytes());
        data[20..22].copy_from_slice(&(FIRST_ATTRIBUTE as u16).to_le_bytes());
        data[22..24].copy_from_slice(&1u16.to_le_bytes());
        data[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
        data[44..48].copy_from_slice(&record_number.to_le_bytes());
        Self {
            data,
            cursor: FIRST_ATTRIBUTE,
        }
    }

    pub fn directory(mut self) -> Self {
        self.data[22..24].copy_from_slice(&3u16.to_le_bytes());
        self
    }

    pub fn sequence(mut self, seq: u16) -> Self {
        self.data[16..18].copy_from_slice(&seq.to_le_bytes());
        self
    }

    pub fn resident(mut self, attr_type: u32, content: &[u8]) -> Self {
        let at = self.cursor;
        let len = (24 + content.len() + 7) & !7;
        self.data[at..at + 4].copy_from_slice(&attr_type.to_le_bytes());
        self.data[at + 4..at + 8].copy_from_slice(&(len as u32).to_le_bytes());
        self.data[at + 16..at + 20].copy_from_slice(&(content.len() as u32).to_le_bytes());
        self.data[at + 20..at + 22].copy_from_slice(&24u16.to_le_bytes());
        self.data[at + 24..at + 24 + content.len()].copy_from_slice(content);
        self.cursor += len;
        self
    }

    pub fn non_resident(mut self, attr_type: u32, stream_size: u64) -> Self {
        let at = self.cursor;
        let len = 72;
        self.data[at..at + 4].copy_from_slice(&attr_type.to_le_bytes());
        self.data[at + 4..at + 8].copy_from_slice(&(len as u32).to_le_bytes());
        self.data[at + 8] = 1;
        self.data[at + 32..at + 34].copy_from_slice(&64u16.to_le_bytes());
        self.data[at + 40..at + 48].copy_from_slice(&(stream_size.next_multiple_of(4096)).to_le_bytes());
        self.data[at + 48..at + 56].copy_from_slice(&stream_size.to_le_bytes());
        self.data[at + 56..at + 64].copy_from_slice(&stream_size.to_le_bytes());
        self.cursor += len;
        self
    }

    pub fn standard_information(self, times: [u64; 4]) -> Self {
        let mut content = vec![0u8; 72];
        for (i, t) in times.iter().enumerate() {
            content[i * 8..i * 8 + 8].copy_from_slice(&t.to_le_bytes());
        }
        content[32..36].copy_from_slice(&0x20u32.to_le_bytes());
        content[52..56].copy_from_slice(&0x100u32.to_le_bytes());
        self.resident(0x10, &content)
    }

    pub fn file_name(self, parent: u64, name: &str, namespace: u8, crtime: u64) -> Self {
        let units: Vec<u16> = name.encode_utf16().collect();
        let mut content = vec![0u8; 66 + units.len() * 2];
        content[0..8].copy_from_slice(&parent.to_le_bytes());
        for i in 0..4 {
            content[8 + i * 8..16 + i * 8].copy_from_slice(&crtime.to_le_bytes());
        }
        content[40..48].copy_from_slice(&4096u64.to_le_bytes());
        content[48..56].copy_from_slice(&1234u64.to_le_bytes());
        content[56..60].copy_from_slice(&0x20u32.to_le_bytes());
        content[64] = units.len() as u8;
        content[65] = namespace;
        for (i, unit) in units.iter().enumerate() {
            content[66 + i * 2..68 + i * 2].copy_from_slice(&unit.to_le_bytes());
        }
        self.resident(0x30, &content)
    }

    /// Win32 name under `parent` created at 2020-01-01
    pub fn named(self, parent: u64, name: &str) -> Self {
        self.standard_information([T2020; 4]).file_name(parent, name, 1, T2020)
    }

    pub fn build(mut self) -> Vec<u8> {
        let at = self.cursor;
        self.data[at..at + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        self.data[24..28].copy_from_slice(&((at + 8) as u32).to_le_bytes());
        self.data
    }
}

/// Concatenate blocks into one image
pub fn image(blocks: &[Vec<u8>]) -> Vec<u8> {
    blocks.concat()
}

/// A small volume: root, a few directories, files, and the usual anomalies
pub fn sample_volume() -> Vec<Vec<u8>> {
    vec![
        RecordBuilder::new(0).named(5, "$MFT").build(),
        RecordBuilder::new(5).directory().named(5, ".").build(),
        RecordBuilder::new(30).directory().named(5, "Users").build(),
        RecordBuilder::new(31).directory().named(30, "alice").build(),
        RecordBuilder::new(32)
            .standard_information([T2020; 4])
            .file_name(31, "NOTESF~1.TXT", 2, T2020)
            .file_name(31, "notes for later.txt", 1, T2020)
            .non_resident(0x80, 10_000)
            .build(),
        RecordBuilder::new(33).named(900, "lost.bin").build(),
        RecordBuilder::new(34).named(34, "self.bin").build(),
        RecordBuilder::new(35).standard_information([T2020; 4]).build(),
        RecordBuilder::new(40).directory().named(41, "a").build(),
        RecordBuilder::new(41).directory().named(40, "b").build(),
        RecordBuilder::new(42).named(40, "inside.txt").build(),
    ]
}
