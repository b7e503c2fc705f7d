#[cfg(test)]
mod tests {
    use super::super::types::warning_suffix;
    use super::super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn create_file(path: &Path, size: usize, age: Duration) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; size]).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn roots(dir: &TempDir) -> Vec<PathBuf> {
        vec![dir.path().to_path_buf()]
    }

    fn running_as_root() -> bool {
        #[cfg(unix)]
        {
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn entry(name: &str, size: u64, age_days: i64) -> FileEntry {
        FileEntry {
            path: PathBuf::from(name),
            size,
            mod_time: Utc::now() - ChronoDuration::days(age_days),
        }
    }

    #[test]
    fn aggregate_sums_nested_files() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a.bin"), 100, Duration::ZERO);
        create_file(&dir.path().join("sub/b.bin"), 250, Duration::ZERO);
        create_file(&dir.path().join("sub/deeper/c.bin"), 50, Duration::ZERO);

        let inventory = aggregate(&roots(&dir), &CancellationToken::new()).unwrap();
        assert_eq!(inventory.total_bytes, 400);
        assert!(inventory.warnings.is_empty());
    }

    #[test]
    fn aggregate_multiple_roots_and_missing_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        create_file(&first.path().join("a"), 10, Duration::ZERO);
        create_file(&second.path().join("b"), 20, Duration::ZERO);
        let missing = first.path().join("does-not-exist");

        let paths = vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
            missing,
        ];
        let inventory = aggregate(&paths, &CancellationToken::new()).unwrap();
        assert_eq!(inventory.total_bytes, 30);
        assert!(inventory.warnings.is_empty());
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        let inventory = aggregate(&[], &CancellationToken::new()).unwrap();
        assert_eq!(inventory.total_bytes, 0);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_never_counted() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        create_file(&dir.path().join("real"), 100, Duration::ZERO);
        create_file(&outside.path().join("big"), 10_000, Duration::ZERO);
        std::os::unix::fs::symlink(outside.path().join("big"), dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("dirlink")).unwrap();

        let cancel = CancellationToken::new();
        let inventory = aggregate(&roots(&dir), &cancel).unwrap();
        assert_eq!(inventory.total_bytes, 100);

        let listing = enumerate(&roots(&dir), &cancel).unwrap();
        assert_eq!(listing.files.len(), 1);
        assert!(listing.files[0].path.ends_with("real"));
    }

    #[test]
    fn enumerate_reports_size_and_mtime() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("old"), 10, DAY * 3);
        create_file(&dir.path().join("new"), 20, Duration::ZERO);

        let mut listing = enumerate(&roots(&dir), &CancellationToken::new()).unwrap();
        listing.files.sort_by(|a, b| a.mod_time.cmp(&b.mod_time));
        assert_eq!(listing.files.len(), 2);
        assert!(listing.files[0].path.ends_with("old"));
        assert_eq!(listing.files[0].size, 10);
        let age = Utc::now() - listing.files[0].mod_time;
        assert!(age >= ChronoDuration::days(3) - ChronoDuration::minutes(1));
    }

    #[test]
    fn repeated_scans_agree() {
        let dir = TempDir::new().unwrap();
        for i in 0..20 {
            create_file(&dir.path().join(format!("d{}/f{}", i % 4, i)), i * 7, Duration::ZERO);
        }
        let cancel = CancellationToken::new();
        let first = aggregate(&roots(&dir), &cancel).unwrap().total_bytes;
        let second = aggregate(&roots(&dir), &cancel).unwrap().total_bytes;
        assert_eq!(first, second);

        let mut a = enumerate(&roots(&dir), &cancel).unwrap().files;
        let mut b = enumerate(&roots(&dir), &cancel).unwrap().files;
        a.sort_by(|x, y| x.path.cmp(&y.path));
        b.sort_by(|x, y| x.path.cmp(&y.path));
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_becomes_warning() {
        use std::os::unix::fs::PermissionsExt;
        if running_as_root() {
            return;
        }
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("visible"), 40, Duration::ZERO);
        let locked = dir.path().join("locked");
        create_file(&locked.join("hidden"), 1000, Duration::ZERO);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let inventory = aggregate(&roots(&dir), &CancellationToken::new()).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(inventory.total_bytes, 40);
        assert_eq!(inventory.warnings.len(), 1);
        assert_eq!(inventory.warnings[0].reason, WarningReason::PermissionDenied);
    }

    #[test]
    fn cancelled_scan_returns_partial_and_error() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a"), 10, Duration::ZERO);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failed = aggregate(&roots(&dir), &cancel).unwrap_err();
        assert!(failed.error.is_cancelled());
        assert!(failed.partial.total_bytes <= 10);
    }

    #[test]
    fn trim_deletes_only_aged_files() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("old.txt"), 1000, DAY * 40);
        create_file(&dir.path().join("new.txt"), 1000, DAY * 10);
        create_file(&dir.path().join("newer.txt"), 1000, DAY * 5);

        let policy = EvictionPolicy::new(u64::MAX / 2, DAY * 30);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new()).unwrap();

        assert_eq!(result.freed_bytes, 1000);
        assert_eq!(result.deleted_count, 1);
        assert!(!dir.path().join("old.txt").exists());
        assert!(dir.path().join("new.txt").exists());
        assert!(dir.path().join("newer.txt").exists());
        assert_eq!(result.summary, "deleted 1 files");
    }

    #[test]
    fn trim_deletes_oldest_until_under_target() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("oldest.txt"), 1000, DAY * 20);
        create_file(&dir.path().join("middle.txt"), 1000, DAY * 10);
        create_file(&dir.path().join("newest.txt"), 1000, DAY * 5);

        let policy = EvictionPolicy::new(2000, DAY * 60);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new()).unwrap();

        assert_eq!(result.freed_bytes, 2000);
        assert_eq!(result.deleted_count, 2);
        assert!(!dir.path().join("oldest.txt").exists());
        assert!(!dir.path().join("middle.txt").exists());
        assert!(dir.path().join("newest.txt").exists());
    }

    #[test]
    fn trim_combines_age_and_size() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("ancient"), 500, DAY * 60);
        create_file(&dir.path().join("stale"), 500, DAY * 15);
        create_file(&dir.path().join("fresh"), 500, DAY * 5);

        let policy = EvictionPolicy::new(1000, DAY * 30);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new()).unwrap();

        assert_eq!(result.freed_bytes, 1000);
        assert_eq!(result.deleted_count, 2);
        assert!(dir.path().join("fresh").exists());
    }

    #[test]
    fn dry_run_matches_real_run() {
        let preview_dir = TempDir::new().unwrap();
        let real_dir = TempDir::new().unwrap();
        for dir in [&preview_dir, &real_dir] {
            create_file(&dir.path().join("a"), 700, DAY * 45);
            create_file(&dir.path().join("b"), 300, DAY * 20);
            create_file(&dir.path().join("c"), 900, DAY * 2);
        }
        let policy = EvictionPolicy::new(1000, DAY * 30);
        let cancel = CancellationToken::new();

        let preview = trim(&roots(&preview_dir), &policy, true, &cancel).unwrap();
        let real = trim(&roots(&real_dir), &policy, false, &cancel).unwrap();

        assert!(preview.dry_run);
        assert!(!real.dry_run);
        assert_eq!(preview.freed_bytes, real.freed_bytes);
        assert_eq!(preview.deleted_count, real.deleted_count);
        assert!(preview_dir.path().join("a").exists());
        assert!(preview.summary.contains("would delete:"));
        assert!(preview.summary.contains("would delete 2 files"));
    }

    #[test]
    fn empty_tree_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let policy = EvictionPolicy::new(0, Duration::ZERO);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new()).unwrap();
        assert_eq!(result.deleted_count, 0);
        assert_eq!(result.freed_bytes, 0);
        assert_eq!(result.summary, "no files found");
    }

    #[test]
    fn already_under_limit_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a"), 100, DAY);
        let policy = EvictionPolicy::new(10_000, DAY * 30);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new()).unwrap();
        assert_eq!(result.deleted_count, 0);
        assert!(dir.path().join("a").exists());
    }

    #[test]
    fn zero_limits_evict_everything() {
        let files = vec![entry("a", 10, 3), entry("b", 20, 2), entry("c", 30, 1)];
        let by_size = EvictionPolicy::new(0, DAY * 365);
        assert_eq!(trimmer::plan_eviction(&files, &by_size, Utc::now()).len(), 3);

        let by_age = EvictionPolicy::new(u64::MAX / 2, Duration::ZERO);
        assert_eq!(trimmer::plan_eviction(&files, &by_age, Utc::now()).len(), 3);
    }

    #[test]
    fn plan_is_oldest_first() {
        let files = vec![
            entry("a", 100, 90),
            entry("b", 100, 50),
            entry("c", 100, 20),
            entry("d", 100, 1),
        ];
        // age marks a and b; c follows to fit 180
        let policy = EvictionPolicy::new(200, DAY * 40);
        let plan = trimmer::plan_eviction(&files, &policy, Utc::now());
        let names: Vec<_> = plan.iter().map(|f| f.path.to_string_lossy()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn size_limit_plan_has_no_headroom() {
        let files = vec![entry("a", 400, 3), entry("b", 400, 2), entry("c", 400, 1)];
        assert_eq!(trimmer::plan_size_limit(&files, 800).len(), 1);
        assert_eq!(trimmer::plan_size_limit(&files, 1200).len(), 0);
        assert_eq!(trimmer::plan_size_limit(&files, 0).len(), 3);
    }

    #[test]
    fn trim_to_limit_stops_at_limit() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a"), 1000, DAY * 3);
        create_file(&dir.path().join("b"), 1000, DAY * 2);
        create_file(&dir.path().join("c"), 1000, DAY);

        let result = trim_to_limit(&roots(&dir), 2000, false, &CancellationToken::new()).unwrap();
        assert_eq!(result.deleted_count, 1);
        assert!(!dir.path().join("a").exists());
        assert!(dir.path().join("b").exists());
    }

    #[test]
    fn cancelled_trim_is_interrupted() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a"), 100, DAY * 40);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let policy = EvictionPolicy::new(0, Duration::ZERO);
        let (partial, error) = trim(&roots(&dir), &policy, false, &cancel)
            .unwrap_err()
            .into_parts();
        assert!(error.is_cancelled());
        assert!(partial.interrupted);
        assert_eq!(partial.deleted_count, 0);
        assert!(dir.path().join("a").exists());
    }

    #[test]
    fn execute_stops_before_next_file_when_cancelled() {
        let dir = TempDir::new().unwrap();
        create_file(&dir.path().join("a"), 100, DAY * 3);
        create_file(&dir.path().join("b"), 200, DAY * 2);
        create_file(&dir.path().join("c"), 300, DAY);
        let listing = enumerate(&roots(&dir), &CancellationToken::new()).unwrap();
        let plan: Vec<&FileEntry> = listing.files.iter().collect();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scan_warning = classify(&dir.path().join("unreadable"), None);
        let (partial, error) = trimmer::execute(plan.clone(), vec![scan_warning], false, &cancel)
            .unwrap_err()
            .into_parts();
        assert!(error.is_cancelled());
        assert!(partial.interrupted);
        assert!(!partial.dry_run);
        assert_eq!(partial.deleted_count, 0);
        assert_eq!(partial.freed_bytes, 0);
        assert_eq!(partial.summary, "interrupted after deleting 0 files");
        assert_eq!(partial.warnings.len(), 1);
        for name in ["a", "b", "c"] {
            assert!(dir.path().join(name).exists());
        }

        let (preview, error) = trimmer::execute(plan, Vec::new(), true, &cancel)
            .unwrap_err()
            .into_parts();
        assert!(error.is_cancelled());
        assert!(preview.interrupted && preview.dry_run);
        assert_eq!(preview.summary, "interrupted");
    }

    #[cfg(unix)]
    #[test]
    fn failed_delete_is_recorded_and_skipped() {
        use std::os::unix::fs::PermissionsExt;
        if running_as_root() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let sealed = dir.path().join("sealed");
        create_file(&sealed.join("stuck"), 100, DAY * 50);
        create_file(&dir.path().join("loose"), 100, DAY * 40);
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o555)).unwrap();

        let policy = EvictionPolicy::new(u64::MAX / 2, DAY * 30);
        let result = trim(&roots(&dir), &policy, false, &CancellationToken::new());
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o755)).unwrap();
        let result = result.unwrap();

        assert_eq!(result.deleted_count, 1);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].reason, WarningReason::PermissionDenied);
        assert_eq!(result.summary, "deleted 1 files (1 permission denied)");
    }

    #[test]
    fn warning_suffix_groups_by_reason() {
        use std::io;
        let warnings = vec![
            classify(Path::new("/a"), Some(io::Error::from(io::ErrorKind::PermissionDenied))),
            classify(Path::new("/b"), Some(io::Error::from(io::ErrorKind::PermissionDenied))),
            classify(Path::new("/c"), None),
        ];
        assert_eq!(warning_suffix(&warnings), " (2 permission denied, 1 unknown)");
        assert_eq!(warning_suffix(&[]), "");
    }

    #[test]
    fn target_keeps_ten_percent_headroom() {
        assert_eq!(EvictionPolicy::new(2000, Duration::ZERO).target_bytes(), 1800);
        assert_eq!(EvictionPolicy::new(1000, Duration::ZERO).target_bytes(), 900);
    }
}
