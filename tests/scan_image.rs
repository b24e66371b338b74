mod common;

use common::{image, sample_volume, RecordBuilder, RECORD_SIZE, T2020};
use mftpath::logging::{LogLevel, MemoryLogger};
use mftpath::ntfs::FilenameNamespace;
use mftpath::{
    parse_record, DecodeOptions, ImageFile, MappedImage, MemorySource, MftScanner, ScanConfig, ScanOutcome,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn write_image(blocks: &[Vec<u8>]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&image(blocks)).unwrap();
    tmp.flush().unwrap();
    tmp
}

fn quiet(workers: usize) -> ScanConfig {
    ScanConfig::default().with_workers(workers).with_progress(false)
}

fn scan_memory(blocks: Vec<Vec<u8>>, workers: usize) -> ScanOutcome {
    MftScanner::new()
        .with_config(quiet(workers))
        .scan(&mut MemorySource::new(blocks))
        .unwrap()
}

fn path_of(outcome: &ScanOutcome, n: u64) -> &str {
    outcome.table.get(n).unwrap().path()
}

#[test]
fn resolves_sample_volume_from_file() {
    let tmp = write_image(&sample_volume());
    let mut source = ImageFile::open_detect(tmp.path()).unwrap();
    assert_eq!(source.record_size() as usize, RECORD_SIZE);

    let outcome = MftScanner::new().with_config(quiet(4)).scan(&mut source).unwrap();

    assert!(outcome.is_complete());
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.table.len(), 11);
    assert_eq!(path_of(&outcome, 0), "/$MFT");
    assert_eq!(path_of(&outcome, 5), "/.");
    assert_eq!(path_of(&outcome, 31), "/Users/alice");
    assert_eq!(path_of(&outcome, 32), "/Users/alice/notes for later.txt");
    assert_eq!(path_of(&outcome, 33), "Orphan");
    assert_eq!(path_of(&outcome, 34), "ORPHAN/self.bin");
    assert_eq!(path_of(&outcome, 35), "NoFNRecord");
    assert_eq!(path_of(&outcome, 40), "Circular_Reference");
    assert_eq!(path_of(&outcome, 41), "Circular_Reference");
    assert_eq!(path_of(&outcome, 42), "Circular_Reference/inside.txt");

    let stats = outcome.table.stats();
    assert_eq!(stats.directories, 5);
    assert_eq!(stats.no_file_name, 1);
    assert_eq!(stats.orphaned, 2);
    assert_eq!(stats.circular, 3);
}

#[test]
fn mapped_and_buffered_reads_agree() {
    let tmp = write_image(&sample_volume());

    let buffered = MftScanner::new()
        .with_config(quiet(2))
        .scan(&mut ImageFile::open(tmp.path(), RECORD_SIZE as u32).unwrap())
        .unwrap();
    let mapped = MftScanner::new()
        .with_config(quiet(2))
        .scan(&mut MappedImage::open(tmp.path(), None).unwrap())
        .unwrap();

    assert_eq!(buffered.table, mapped.table);
}

#[test]
fn worker_count_is_invisible() {
    let mut blocks = sample_volume();
    for n in 100..600u32 {
        let parent = if n % 10 == 0 { 30 } else { (n - 1) as u64 };
        blocks.push(RecordBuilder::new(n).named(parent, &format!("item{}", n)).build());
    }

    let one = scan_memory(blocks.clone(), 1);
    let many = scan_memory(blocks, 8);

    assert_eq!(one.table, many.table);
    assert_eq!(one.resolve, many.resolve);
    assert_eq!(path_of(&one, 102), "/Users/item100/item101/item102");
}

#[test]
fn fields_decode_at_documented_offsets() {
    let block = RecordBuilder::new(77)
        .sequence(9)
        .standard_information([T2020, T2020 + 1, T2020 + 2, T2020 + 3])
        .file_name((9u64 << 48) | 31, "report.docx", 3, T2020)
        .build();

    let record = parse_record(&block, 0, &DecodeOptions::default()).unwrap();

    let header = &record.header;
    assert!(header.has_valid_signature());
    assert_eq!(header.update_sequence_offset, 48);
    assert_eq!(header.update_sequence_count, 3);
    assert_eq!(header.log_sequence_number, 0x1122_3344);
    assert_eq!(header.sequence_number, 9);
    assert_eq!(header.hard_link_count, 1);
    assert_eq!(header.first_attribute_offset, 56);
    assert!(header.is_in_use());
    assert!(!header.is_directory());
    assert_eq!(header.allocated_size, RECORD_SIZE as u32);
    assert_eq!(header.record_number, 77);
    assert!(header.is_base_record());

    let si = record.standard_information.as_ref().unwrap();
    assert_eq!(si.creation_time.ticks(), T2020);
    assert_eq!(si.access_time.ticks(), T2020 + 3);
    assert_eq!(si.creation_time.unix_seconds(), 1_577_836_800);
    assert_eq!(si.modification_time.subsec_nanos(), 100);
    assert_eq!(si.file_attributes, 0x20);
    assert_eq!(si.security_id, 0x100);

    let fname = &record.file_names[0];
    assert_eq!(fname.parent_record_number(), 31);
    assert_eq!(fname.parent_sequence(), 9);
    assert_eq!(fname.allocated_size, 4096);
    assert_eq!(fname.real_size, 1234);
    assert_eq!(fname.flags, 0x20);
    assert_eq!(fname.name_length, 11);
    assert_eq!(fname.namespace, FilenameNamespace::Win32AndDos);
    assert_eq!(fname.name, "report.docx");
    assert_eq!(record.filename, "report.docx");
    assert!(!record.usec_zero);
}

#[test]
fn damaged_blocks_do_not_stop_the_scan() {
    let mut blocks = sample_volume();
    blocks.insert(2, vec![0u8; 40]);
    let mut bad_offset = RecordBuilder::new(50).named(5, "x").build();
    bad_offset[20..22].copy_from_slice(&4000u16.to_le_bytes());
    blocks.push(bad_offset);
    // Length zero attribute after a valid $FILE_NAME
    let mut zero_len = RecordBuilder::new(51).named(5, "kept.txt").build();
    let end = u32::from_le_bytes(zero_len[24..28].try_into().unwrap()) as usize - 8;
    zero_len[end..end + 4].copy_from_slice(&0x80u32.to_le_bytes());
    blocks.push(zero_len);

    let log = Arc::new(MemoryLogger::new());
    let outcome = MftScanner::new()
        .with_config(quiet(3))
        .with_diagnostics(log.clone())
        .scan(&mut MemorySource::new(blocks))
        .unwrap();

    assert!(outcome.is_complete());
    let kinds: Vec<_> = outcome.skipped.iter().map(|s| (s.index, s.kind)).collect();
    assert_eq!(kinds, vec![(2, "TruncatedHeader"), (12, "InvalidAttributeOffset")]);

    let kept = outcome.table.get(51).unwrap();
    assert_eq!(kept.path(), "/kept.txt");
    assert_eq!(kept.notes.len(), 1);
    assert!(log.count_at_least(LogLevel::Warn) >= 2);
}

#[test]
fn non_resident_data_is_flagged_only() {
    let outcome = scan_memory(sample_volume(), 2);
    let record = outcome.table.get(32).unwrap();
    assert!(record.present.data);
    assert_eq!(record.fncnt(), 2);
    assert_eq!(record.filename, "NOTESF~1.TXT");
    assert!(record.notes.is_empty(), "{:?}", record.notes);
}

#[test]
fn timestamp_anomalies_are_flagged() {
    let blocks = vec![
        RecordBuilder::new(5).directory().named(5, ".").build(),
        RecordBuilder::new(60)
            .standard_information([T2020, T2020, T2020, T2020])
            .file_name(5, "stomped.exe", 1, T2020 + 864_000_000_000)
            .build(),
        RecordBuilder::new(61)
            .standard_information([0, T2020 + 1, T2020 + 2, u64::MAX])
            .file_name(5, "odd.dat", 1, T2020)
            .build(),
    ];
    let outcome = scan_memory(blocks, 1);

    let stomped = outcome.table.get(60).unwrap();
    assert!(stomped.usec_zero);
    assert!(stomped.si_fn_shift);

    let odd = outcome.table.get(61).unwrap();
    let si = odd.standard_information.as_ref().unwrap();
    assert!(si.creation_time.is_sentinel());
    assert!(si.access_time.is_sentinel());
    assert_eq!(si.creation_time.to_string(), "Not defined");
    assert!(!odd.si_fn_shift);
    assert_eq!(odd.notes.len(), 1);

    assert_eq!(outcome.table.stats().usec_zero, 2);
}

#[test]
fn records_serialize_with_paths() {
    let outcome = scan_memory(sample_volume(), 2);
    let records: Vec<_> = outcome.table.iter().collect();
    let json = serde_json::to_value(&records).unwrap();

    let array = json.as_array().unwrap();
    assert_eq!(array.len(), 11);
    assert_eq!(array[0]["header"]["record_number"], 0);
    let notes = array.iter().find(|r| r["header"]["record_number"] == 32).unwrap();
    assert_eq!(notes["path"], "/Users/alice/notes for later.txt");
    assert_eq!(notes["file_names"].as_array().unwrap().len(), 2);
}

#[test]
fn record_cap_limits_ingestion() {
    let outcome = MftScanner::new()
        .with_config(quiet(2).with_max_records(3))
        .scan(&mut MemorySource::new(sample_volume()))
        .unwrap();

    assert_eq!(outcome.blocks_read, 3);
    assert_eq!(outcome.table.len(), 3);
    assert_eq!(path_of(&outcome, 30), "/Users");
}
