//! Boot-time system volume bring-up and post-boot mounts through the
//! kernel-wide volume manager.

mod common;

use std::sync::Arc;

use common::{KFS_MAGIC, KfsDriver, Namespace, capture_logs, drivers_with, take_logs};
use keel_core::log::LogLevel;
use keel_fs::manager::{self, SYSTEM_VOLUME_NAME};
use keel_fs::{VolumeError, VolumeId};

#[test]
fn boot_then_mount_and_unmount() {
    capture_logs();

    let ns = Namespace::new(&[("sda", b"EXT2"), ("sdb", KFS_MAGIC), ("sdc", KFS_MAGIC)]);
    let driver = Arc::new(KfsDriver::default());
    manager::init(ns.root.clone(), drivers_with(driver.clone()));

    assert!(manager::system_volume().is_none());

    // Boot: the second device is the first one kfs recognises.
    let system = manager::mount_system_volume().unwrap();
    assert_eq!(system.name(), SYSTEM_VOLUME_NAME);
    assert_eq!(system.id(), Some(VolumeId::FIRST));
    assert!(Arc::ptr_eq(&manager::system_volume().unwrap(), &system));
    // `mount_with` re-checks the chosen device, so `sdb` shows up twice.
    let mut probed = driver.probed();
    probed.dedup();
    assert_eq!(probed, ["null", "sda", "sdb"]);

    let mount_point = system.mount_point().unwrap();
    assert!(Arc::ptr_eq(&mount_point.parent().unwrap(), &ns.root));
    assert!(Arc::ptr_eq(&manager::resolve("/system").unwrap(), mount_point));

    // Post-boot mounts.
    let sdc = ns.device("sdc");
    let data = manager::mount(&sdc, Some("data")).unwrap();
    assert_eq!(data.id().map(VolumeId::as_u64), Some(2));
    let anon = manager::mount(&sdc, None).unwrap();
    assert_eq!(anon.name(), "volume0");

    let names: Vec<_> = manager::volumes()
        .iter()
        .map(|v| v.name().to_string())
        .collect();
    assert_eq!(names, ["system", "data", "volume0"]);

    // Failures are logged at error level and leave the registry alone.
    take_logs();
    let null = ns.device("null");
    assert_eq!(manager::mount(&null, None).unwrap_err(), VolumeError::InvalidFilesystem);
    assert_eq!(manager::unmount("nope").unwrap_err(), VolumeError::VolumeNotFound);
    let errors = take_logs()
        .into_iter()
        .filter(|(level, _)| *level == LogLevel::Error)
        .count();
    assert_eq!(errors, 2);
    assert_eq!(manager::volumes().len(), 3);

    // Round trip under the same name.
    let removed = manager::unmount("data").unwrap();
    assert!(!removed.is_registered());
    assert!(manager::find_volume("data").is_none());
    assert!(manager::resolve("/data").is_err());
    let again = manager::mount(&sdc, Some("data")).unwrap();
    assert!(Arc::ptr_eq(&manager::find_volume("data").unwrap(), &again));
    assert_eq!(again.id().map(VolumeId::as_u64), Some(4));

    // Explicit unregister hands the registry's handle back.
    let returned = manager::unregister_volume(&again).unwrap();
    assert!(Arc::ptr_eq(&returned, &again));
    assert_eq!(
        manager::unregister_volume(&again).unwrap_err(),
        VolumeError::VolumeNotFound
    );

    // A second boot scan keeps the existing system volume.
    let again = manager::mount_system_volume().unwrap();
    assert!(Arc::ptr_eq(&again, &system));
}
