//! Mount log archiving and error scanning across a rotation.

use std::io::Read;

use flate2::read::GzDecoder;
use sts_wire::mount::log_rotate::rotate_if_needed;
use sts_wire::mount::scan_errors;

#[test]
fn test_scan_after_rotation_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("rclone.log");
    std::fs::write(&log, "INFO : start\nERROR : old failure\n").unwrap();

    let scan = scan_errors(&log, 0).unwrap();
    assert_eq!(scan.errors.len(), 1);
    assert_eq!(scan.next_line, 2);

    let archive = rotate_if_needed(&log, 1).unwrap().unwrap();
    let mut archived = String::new();
    GzDecoder::new(std::fs::File::open(&archive).unwrap())
        .read_to_string(&mut archived)
        .unwrap();
    assert!(archived.contains("old failure"));

    std::fs::write(&log, "ERROR : new failure\n").unwrap();

    let scan = scan_errors(&log, 0).unwrap();
    assert_eq!(scan.errors.len(), 1);
    assert!(scan.errors[0].line.contains("new failure"));
}
