//! Pack payloads into containers, then read them back the way a consumer
//! would: parse, sniff the entry magic, decode.
//!
//! MRG pads every entry to a sector, so MZX entries there are decoded with
//! zeros after the stream.

use mages::compress::Compression;
use mages::prelude::*;
use pretty_assertions::assert_eq;

fn payloads() -> Vec<Vec<u8>> {
    vec![
        b"<script> line one\r\nline two\r\n".repeat(40),
        (0u32..3000).flat_map(|i| (i % 251).to_le_bytes()).collect(),
        b"stored raw".to_vec(),
        Vec::new(),
    ]
}

fn encode(index: usize, data: &[u8]) -> Vec<u8> {
    match index % 3 {
        0 => mzx::compress(data, &MzxOptions::default()).unwrap(),
        1 => nxx::compress_nxgx(data, Compression::default()).unwrap(),
        _ => data.to_vec(),
    }
}

#[test]
fn mrg_with_names_round_trip() {
    let originals = payloads();
    let entries: Vec<Entry> = originals
        .iter()
        .enumerate()
        .map(|(i, data)| Entry::sniff(encode(i, data)))
        .collect();
    let names: NameTable = ["SCRIPT", "TABLE", "RAW", "EMPTY"].into_iter().collect();

    let output = MrgArchive::build(&entries).unwrap();
    let archive = MrgArchive::parse(&output.hed, ArchiveBuffer::from_vec(output.mrg)).unwrap();
    let names = NameTable::parse(&names.to_bytes()).unwrap();
    assert!(names.matches(archive.len()));

    let options = MzxOptions::default();
    for (index, original) in originals.iter().enumerate() {
        let stored = archive.entry_data(index).unwrap();
        let kind = PayloadKind::detect(&stored);
        assert_eq!(kind.is_compressed(), entries[index].is_compressed(), "{}", names.get(index).unwrap());

        let decoded = decode(&stored, &options).unwrap();
        if kind.is_compressed() {
            assert_eq!(&decoded[..], &original[..]);
        } else {
            // raw entries come back with their sector padding
            assert_eq!(&decoded[..original.len()], &original[..]);
        }
    }
}

#[test]
fn mzx_in_mrg_decodes_through_padding() {
    let original = b"MZX inside sector padding ".repeat(50);
    let packed = mzx::compress(&original, &MzxOptions::default()).unwrap();
    assert_ne!(packed.len() % 0x800, 0);

    let output = MrgArchive::build(&[Entry::sniff(packed)]).unwrap();
    let archive = MrgArchive::parse(&output.hed, ArchiveBuffer::from_vec(output.mrg)).unwrap();
    let stored = archive.entry_data(0).unwrap();

    assert_eq!(stored.len() % 0x800, 0);
    assert_eq!(PayloadKind::detect(&stored), PayloadKind::Mzx);
    assert_eq!(&decode(&stored, &MzxOptions::default()).unwrap()[..], &original[..]);
}

#[test]
fn mzp_and_hfa_round_trip() {
    let originals = payloads();
    let stored: Vec<Vec<u8>> = originals
        .iter()
        .enumerate()
        .map(|(i, data)| encode(i, data))
        .collect();

    let mzp = MzpArchive::parse(MzpArchive::build(&stored).unwrap().into()).unwrap();
    let named: Vec<(String, &[u8])> = stored
        .iter()
        .enumerate()
        .map(|(i, data)| (format!("entry_{i:03}.bin"), data.as_slice()))
        .collect();
    let hfa = HfaArchive::parse(HfaArchive::build(&named).unwrap().into()).unwrap();

    let options = MzxOptions::default();
    for (index, original) in originals.iter().enumerate() {
        let from_mzp = mzp.entry_data(index).unwrap();
        let from_hfa = hfa.entry_data(index).unwrap();
        assert_eq!(from_mzp.as_bytes(), from_hfa.as_bytes());
        assert_eq!(&decode(&from_mzp, &options).unwrap()[..], &original[..]);
    }
    assert_eq!(hfa.get(3).unwrap().name, "entry_003.bin");
}

#[test]
fn format_detection_on_packed_containers() {
    let mzp = MzpArchive::build(&[b"x".as_slice()]).unwrap();
    let hfa = HfaArchive::build(&[("x", b"x".as_slice())]).unwrap();

    assert_eq!(ArchiveFormat::detect(&mzp), Some(ArchiveFormat::Mzp));
    assert_eq!(ArchiveFormat::detect(&hfa), Some(ArchiveFormat::Hfa));
    assert!(!mages::VERSION.is_empty());
}
