// End-to-end scenarios over a simulated device.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use sffs::{Error, FileSession, OpenMode, Sffs};
use simflash::styles;

#[test]
fn format_reports_reference_geometry() {
    let fs = Sffs::format(styles::REFERENCE.build()).unwrap();
    assert_eq!(fs.sector_count(), 8);
    assert_eq!(fs.data_pages_per_sector(), 15);
}

#[test]
fn idempotent_mount_preserves_content() {
    let device = styles::REFERENCE.build();
    let mut fs = Sffs::format(device).unwrap();

    let mut session = FileSession::open(&mut fs, 5, OpenMode::Read).unwrap();
    session.write(b"stable content").unwrap();
    session.close().unwrap();

    let device = fs.into_device();
    let mut remounted = Sffs::mount(device).unwrap();

    let mut session = FileSession::open(&mut remounted, 5, OpenMode::Read).unwrap();
    let mut buf = [0u8; 15];
    let n = session.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"stable content");
}

#[test]
fn scatter_write_round_trips_2500_bytes() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let data: Vec<u8> = (0..2500).map(|_| rng.gen()).collect();

    let mut fs = Sffs::format(styles::REFERENCE.build()).unwrap();

    let mut session = FileSession::open(&mut fs, 42, OpenMode::Read).unwrap();
    let mut pos = 0usize;
    while pos < data.len() {
        let chunk = rng.gen_range(10..109).min(data.len() - pos);
        session.write(&data[pos..pos + chunk]).unwrap();
        pos += chunk;
    }
    session.close().unwrap();

    assert_eq!(fs.file_size(42).unwrap() as usize, data.len());

    let mut session = FileSession::open(&mut fs, 42, OpenMode::Read).unwrap();
    let mut readback = Vec::new();
    let mut buf = [0u8; 109];
    loop {
        let chunk = rng.gen_range(10..109);
        let n = session.read(&mut buf[..chunk]).unwrap();
        readback.extend_from_slice(&buf[..n]);
        if n < chunk {
            break;
        }
    }
    assert_eq!(readback, data);
}

#[test]
fn delete_one_file_leaves_sibling_untouched() {
    let mut fs = Sffs::format(styles::REFERENCE.build()).unwrap();

    let mut a = FileSession::open(&mut fs, 1, OpenMode::Read).unwrap();
    a.write(&[0x11u8; 1500]).unwrap();
    a.close().unwrap();

    let mut b = FileSession::open(&mut fs, 2, OpenMode::Read).unwrap();
    b.write(&[0x22u8; 1500]).unwrap();
    b.close().unwrap();

    fs.file_remove(1).unwrap();

    let mut c = FileSession::open(&mut fs, 3, OpenMode::Read).unwrap();
    c.write(&[0x33u8; 3000]).unwrap();
    c.close().unwrap();

    let mut session = FileSession::open(&mut fs, 2, OpenMode::Read).unwrap();
    let mut buf = [0u8; 1500];
    let n = session.read(&mut buf).unwrap();
    assert_eq!(n, 1500);
    assert!(buf.iter().all(|&b| b == 0x22));
}

#[test]
fn overwrite_with_shorter_content_replaces_and_truncates() {
    let mut fs = Sffs::format(styles::REFERENCE.build()).unwrap();

    let mut session = FileSession::open(&mut fs, 9, OpenMode::Read).unwrap();
    session.write(&[0x01u8; 1000]).unwrap();
    session.close().unwrap();

    let mut session = FileSession::open(&mut fs, 9, OpenMode::Overwrite).unwrap();
    session.write(&[0x02u8; 1000]).unwrap();
    session.close().unwrap();

    assert_eq!(fs.file_size(9).unwrap(), 1000);
    let mut session = FileSession::open(&mut fs, 9, OpenMode::Read).unwrap();
    let mut buf = [0u8; 1000];
    let n = session.read(&mut buf).unwrap();
    assert_eq!(n, 1000);
    assert!(buf.iter().all(|&b| b == 0x02));
}

#[test]
fn medium_full_fails_writes_without_corrupting_existing_files() {
    // The tiny layout has little headroom, so it fills quickly.
    let mut fs = Sffs::format(styles::TINY.build()).unwrap();

    let mut keeper = FileSession::open(&mut fs, 1, OpenMode::Read).unwrap();
    keeper.write(&[0xAAu8; 60]).unwrap();
    keeper.close().unwrap();

    let mut saw_failure = false;
    for file_id in 2..30u16 {
        let mut session = FileSession::open(&mut fs, file_id, OpenMode::Read).unwrap();
        if session.write(&[0xBBu8; 2000]).is_err() {
            saw_failure = true;
            break;
        }
        session.close().unwrap();
    }
    assert!(saw_failure, "tiny device should eventually report MediumFull");

    let mut session = FileSession::open(&mut fs, 1, OpenMode::Read).unwrap();
    let mut buf = [0u8; 60];
    let n = session.read(&mut buf).unwrap();
    assert_eq!(n, 60);
    assert!(buf.iter().all(|&b| b == 0xAA));
}

#[test]
fn mount_rejects_an_unformatted_device() {
    let device = styles::REFERENCE.build();
    match Sffs::mount(device) {
        Err(Error::BadGeometry) => {}
        other => panic!("expected BadGeometry, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn open_rejects_reserved_file_ids() {
    let mut fs = Sffs::format(styles::REFERENCE.build()).unwrap();
    assert!(matches!(
        FileSession::open(&mut fs, 0, OpenMode::Read),
        Err(Error::InvalidArgument)
    ));
    assert!(matches!(
        FileSession::open(&mut fs, 0xFFFF, OpenMode::Read),
        Err(Error::InvalidArgument)
    ));
}

#[test]
fn debug_print_marks_used_and_erased_pages() {
    let mut fs = Sffs::format(styles::REFERENCE.build()).unwrap();

    let mut session = FileSession::open(&mut fs, 3, OpenMode::Read).unwrap();
    session.write(b"hello").unwrap();
    session.close().unwrap();

    let dump = fs.debug_print().unwrap();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines.len(), fs.sector_count());
    for line in &lines {
        assert!(line.contains('['), "missing sector glyph in {line:?}");
    }
    assert!(
        dump.contains('U'),
        "expected at least one USED page glyph in:\n{dump}"
    );
    assert!(
        dump.contains("[ ]"),
        "expected at least one ERASED page glyph in:\n{dump}"
    );
}

#[test]
fn randomized_mix_keeps_every_live_file_correct() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let mut fs = Sffs::format(styles::LARGE.build()).unwrap();
    let mut contents: Vec<Option<Vec<u8>>> = vec![None; 10];

    for _ in 0..80 {
        let file_idx = rng.gen_range(0..10);
        let file_id = (file_idx + 1) as u16;
        // Bias towards verify.
        let action = rng.gen_range(0..10);

        if action < 6 && contents[file_idx].is_some() {
            let expected = contents[file_idx].as_ref().unwrap();
            let mut session = FileSession::open(&mut fs, file_id, OpenMode::Read).unwrap();
            let mut buf = vec![0u8; expected.len()];
            let n = session.read(&mut buf).unwrap();
            assert_eq!(n, expected.len());
            assert_eq!(&buf, expected);
        } else if action < 8 {
            let len = rng.gen_range(2000..7000);
            let data: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
            let mut session = FileSession::open(&mut fs, file_id, OpenMode::Overwrite).unwrap();
            session.write(&data).unwrap();
            session.close().unwrap();
            contents[file_idx] = Some(data);
        } else if contents[file_idx].is_some() {
            fs.file_remove(file_id).unwrap();
            contents[file_idx] = None;
        }
    }

    for (file_idx, expected) in contents.iter().enumerate() {
        if let Some(expected) = expected {
            let file_id = (file_idx + 1) as u16;
            let mut session = FileSession::open(&mut fs, file_id, OpenMode::Read).unwrap();
            let mut buf = vec![0u8; expected.len()];
            let n = session.read(&mut buf).unwrap();
            assert_eq!(n, expected.len());
            assert_eq!(&buf, expected);
        }
    }
}
