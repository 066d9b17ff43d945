use std::fs;
use std::io::Cursor;
use std::path::Path;

use dedarc::archive::FrameWriter;
use dedarc::codec::CodecConfig;
use dedarc::compress::pack_directory;
use dedarc::extract::FrameReader;
use dedarc::hash::hash;
use tempfile::tempdir;

#[test]
fn header_of_large_archive_with_any_window() -> Result<(), Box<dyn std::error::Error>> {
    let src = tempdir()?;
    // xorshift output barely compresses, so the frames stay large
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for i in 0..40u32 {
        let data: Vec<u8> = (0..20_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect();
        fs::write(src.path().join(format!("f{i:03}")), data)?;
    }
    let work = tempdir()?;
    let archive = work.path().join("large.dar");
    let outcome = pack_directory(src.path(), &archive, &CodecConfig::default())?;
    assert!(outcome.stats.archive_bytes > 100 * 4096);

    for window in [64usize, 100, 4093, 4096, 1 << 20] {
        let mut reader = FrameReader::open(&archive)?.with_scan_window(window);
        assert_eq!(reader.read_header()?, outcome.header, "window {window}");
    }
    Ok(())
}

#[test]
fn header_of_tiny_archive_with_any_window() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = FrameWriter::new(Cursor::new(Vec::new()), &CodecConfig::default())?
        .write_header("{}")?
        .into_inner();
    assert_eq!(bytes.len(), 14);
    for window in 1..=20usize {
        let mut reader = FrameReader::new(Cursor::new(bytes.clone()))?.with_scan_window(window);
        assert_eq!(reader.read_header()?, "{}", "window {window}");
    }
    Ok(())
}

#[test]
fn trailer_tag_straddling_every_window_boundary() -> Result<(), Box<dyn std::error::Error>> {
    let header = "{\"x\": 1}";
    for filler_len in 0..24usize {
        let filler = vec![0xA5u8; filler_len];
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()), &CodecConfig::default())?;
        writer.add_file_if_new(Path::new("filler"), hash(&filler), &filler)?;
        let bytes = writer.write_header(header)?.into_inner();

        for window in 4..=16usize {
            let mut reader = FrameReader::new(Cursor::new(bytes.clone()))?.with_scan_window(window);
            assert_eq!(reader.read_header()?, header, "filler {filler_len} window {window}");
        }
    }
    Ok(())
}

#[test]
fn header_read_then_frames_still_scan_from_the_start() -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = FrameWriter::new(Cursor::new(Vec::new()), &CodecConfig::default())?;
    for data in [&b"one"[..], &b"two"[..], &b"three"[..]] {
        writer.add_file_if_new(Path::new("x"), hash(data), data)?;
    }
    let bytes = writer.write_header("{}")?.into_inner();

    let mut reader = FrameReader::new(Cursor::new(bytes))?;
    assert_eq!(reader.read_header()?, "{}");
    assert_eq!(reader.read_frame(hash(b"three"))?, b"three");
    assert_eq!(reader.read_header()?, "{}");
    assert_eq!(reader.read_frame(hash(b"one"))?, b"one");
    Ok(())
}
