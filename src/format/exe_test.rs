use pretty_assertions::assert_eq;

use crate::format::exe::{ExeFile, ExeReloc, LoaderError};

// 1 page of 0x2B bytes, code at paragraph 2, ss:sp = 0001:1000,
// cs:ip = 0002:0003
fn raw_header() -> Vec<u8> {
    vec![
        0x4D, 0x5A, 0x2B, 0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01, 0x01, 0xFF, 0xFF, 0x01, 0x00,
        0x00, 0x10, 0x00, 0x00, 0x03, 0x00, 0x02, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00,
    ]
}

// one relocation entry at file offset 0x20
fn raw_header_with_relocation() -> Vec<u8> {
    vec![
        0x4D, 0x5A, 0x4F, 0x00, 0x01, 0x00, 0x01, 0x00, 0x03, 0x00, 0x01, 0x01, 0xFF, 0xFF, 0x02, 0x00,
        0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ]
}

#[test]
fn can_parse_header_fields() {
    let exe = ExeFile::from_data(&raw_header()).unwrap();
    assert_eq!(*b"MZ", exe.header.signature);
    assert_eq!(0x2B, exe.header.bytes_in_last_page);
    assert_eq!(1, exe.header.pages);
    assert_eq!(0, exe.header.relocations);
    assert_eq!(2, exe.header.header_paragraphs);
    assert_eq!(0x0101, exe.header.min_extra_paragraphs);
    assert_eq!(0xFFFF, exe.header.max_extra_paragraphs);
    assert_eq!(0x0001, exe.header.ss);
    assert_eq!(0x1000, exe.header.sp);
    assert_eq!(0x0000, exe.header.checksum);
    assert_eq!(0x0003, exe.header.ip);
    assert_eq!(0x0002, exe.header.cs);
    assert_eq!(0x0020, exe.header.reloc_table_offset);
    assert_eq!(0, exe.header.overlay_number);
}

#[test]
fn image_size_subtracts_the_unused_page_tail() {
    let exe = ExeFile::from_data(&raw_header()).unwrap();
    assert_eq!(0x2B, exe.header.image_size());
    assert_eq!(32, exe.header.code_offset());
    // 3 code bytes follow the 32-byte header in this fixture
    assert_eq!(3, exe.code.len());
}

#[test]
fn can_parse_the_relocation_table() {
    let exe = ExeFile::from_data(&raw_header_with_relocation()).unwrap();
    assert_eq!(1, exe.header.relocations);
    assert_eq!(0x0020, exe.header.reloc_table_offset);
    assert_eq!(vec![ExeReloc { offset: 1, segment: 0 }], exe.relocs);
}

#[test]
fn rejects_a_bad_signature() {
    let mut data = raw_header();
    data[1] = b'X';
    assert_eq!(
        Err(LoaderError::BadSignature),
        ExeFile::from_data(&data).map(|_| ())
    );
}

#[test]
fn rejects_a_truncated_header() {
    let data = raw_header();
    assert!(matches!(
        ExeFile::from_data(&data[..27]),
        Err(LoaderError::TruncatedHeader)
    ));
}

#[test]
fn rejects_a_truncated_relocation_table() {
    let mut data = raw_header_with_relocation();
    // relocation count says one entry, but the table is cut off
    data.truncate(0x22);
    assert!(matches!(
        ExeFile::from_data(&data),
        Err(LoaderError::TruncatedRelocationTable)
    ));
}

#[test]
fn rejects_code_starting_past_the_stream_end() {
    let mut data = raw_header();
    data.truncate(31);
    data[8] = 0x05; // header_paragraphs = 5, code would start at offset 80
    assert!(matches!(
        ExeFile::from_data(&data),
        Err(LoaderError::TruncatedImage)
    ));
}

#[test]
fn unpadded_streams_are_taken_as_is() {
    // header says 0x4F image bytes but only the header itself is present
    let data = raw_header_with_relocation();
    let exe = ExeFile::from_data(&data).unwrap();
    assert_eq!(0x4F, exe.header.image_size());
    assert_eq!(0, exe.code.len());

    // code past the declared image size still loads from an unpadded file
    let mut data = raw_header();
    data.extend_from_slice(&[0x90; 0x20]);
    let exe = ExeFile::from_data(&data).unwrap();
    assert_eq!(3 + 0x20, exe.code.len());
}

#[test]
fn padded_streams_drop_the_page_tail() {
    // a file padded out to its full page only holds 0x2B real bytes
    let mut data = raw_header();
    data.resize(512, 0);
    let exe = ExeFile::from_data(&data).unwrap();
    assert_eq!(0x2B - 32, exe.code.len());
}
