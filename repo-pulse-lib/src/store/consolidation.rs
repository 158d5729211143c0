use super::json_file::{read_json, write_json};
use super::layout::{DataLayout, HistoryFile, Month, monthly_file_name};
use super::snapshot::{Snapshot, SnapshotKind, SnapshotMetrics, fold_snapshots};
use crate::Result;
use crate::facts::RepoSpec;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Days, NaiveDate, Utc};
use ohno::{IntoAppError, app_err};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;

const LOG_TARGET: &str = "     store";

/// Daily snapshots younger than this many days are left alone by default.
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// One monthly record produced (or, in a dry run, that would be produced).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthRollup {
    pub month: Month,

    /// Daily files folded in by this run. Leftover dailies the monthly record already
    /// covers are removed but not counted.
    pub dailies: usize,

    /// Days represented by the resulting monthly record.
    pub days: u64,
}

/// Fold old daily snapshots of `repo` into monthly records.
///
/// Dailies dated before `today - retention_days` are grouped by calendar month. Each group
/// is folded together with any monthly record already present for that month, the result
/// is written, and only then are the folded dailies deleted. With `dry_run`, nothing is
/// written or deleted.
pub fn consolidate_repo(
    layout: &DataLayout,
    repo: &RepoSpec,
    retention_days: u32,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<Vec<MonthRollup>> {
    let cutoff = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .ok_or_else(|| app_err!("retention of {retention_days} days reaches before the calendar start"))?;

    consolidate_history(&layout.history_dir(repo), &repo.to_string(), cutoff, now, dry_run)
}

fn consolidate_history(
    history_dir: &Utf8Path,
    repository: &str,
    cutoff: NaiveDate,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<Vec<MonthRollup>> {
    let mut months: BTreeMap<Month, Vec<(NaiveDate, Utf8PathBuf)>> = BTreeMap::new();
    for (date, path) in old_dailies(history_dir, cutoff)? {
        months.entry(Month::of(date)).or_default().push((date, path));
    }

    let mut rollups = Vec::with_capacity(months.len());
    for (month, mut dailies) in months {
        dailies.sort();
        rollups.push(fold_month(history_dir, repository, month, &dailies, now, dry_run)?);
    }

    Ok(rollups)
}

fn old_dailies(history_dir: &Utf8Path, cutoff: NaiveDate) -> Result<Vec<(NaiveDate, Utf8PathBuf)>> {
    let entries = match history_dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).into_app_err_with(|| format!("listing '{history_dir}'")),
    };

    let mut dailies = Vec::new();
    for entry in entries {
        let entry = entry.into_app_err_with(|| format!("listing '{history_dir}'"))?;
        if let Some(HistoryFile::Daily(date)) = HistoryFile::parse(entry.file_name())
            && date < cutoff
        {
            dailies.push((date, entry.into_path()));
        }
    }

    Ok(dailies)
}

fn fold_month(
    history_dir: &Utf8Path,
    repository: &str,
    month: Month,
    dailies: &[(NaiveDate, Utf8PathBuf)],
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<MonthRollup> {
    let monthly_path = history_dir.join(monthly_file_name(month));
    let mut records: Vec<(SnapshotMetrics, u64)> = Vec::with_capacity(dailies.len() + 1);
    let mut folded = BTreeSet::new();

    if let Some(existing) = read_json::<Snapshot>(&monthly_path)? {
        folded = existing.folded;
        records.push((existing.metrics, existing.days));
    }

    // dailies left behind by an interrupted run are already part of the monthly record
    let (covered, fresh): (Vec<_>, Vec<_>) = dailies.iter().partition(|(date, _)| folded.contains(date));

    for (date, path) in &fresh {
        let snapshot = read_json::<Snapshot>(path)?.ok_or_else(|| app_err!("daily snapshot '{path}' disappeared"))?;
        records.push((snapshot.metrics, snapshot.days));
        let _ = folded.insert(*date);
    }

    let days: u64 = records.iter().map(|(_, days)| days).sum();

    if dry_run {
        log::info!(
            target: LOG_TARGET,
            "Would fold {} daily snapshot(s) of {repository} into {monthly_path}",
            fresh.len()
        );
    } else {
        if !fresh.is_empty() {
            let rollup = Snapshot {
                repository: repository.to_string(),
                period: month.to_string(),
                kind: SnapshotKind::Monthly,
                days,
                folded,
                generated_at: now,
                metrics: fold_snapshots(&records),
            };
            write_json(&monthly_path, &rollup)?;
        }

        for (_, path) in fresh.iter().chain(&covered) {
            std::fs::remove_file(path).into_app_err_with(|| format!("removing folded snapshot '{path}'"))?;
        }

        if !fresh.is_empty() {
            log::info!(
                target: LOG_TARGET,
                "Folded {} daily snapshot(s) of {repository} into {monthly_path}",
                fresh.len()
            );
        }
        if !covered.is_empty() {
            log::info!(
                target: LOG_TARGET,
                "Removed {} daily snapshot(s) of {repository} already folded into {monthly_path}",
                covered.len()
            );
        }
    }

    Ok(MonthRollup {
        month,
        dailies: fresh.len(),
        days,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::store::layout::daily_file_name;

    fn history() -> (tempfile::TempDir, Utf8PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        (tmp, root.join("history"))
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-15T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn write_daily(dir: &Utf8Path, date: NaiveDate, open_issues: u64) {
        let mut metrics = SnapshotMetrics::default();
        metrics.issues.open = open_issues;
        let snapshot = Snapshot {
            repository: "octo/widgets".into(),
            period: date.format("%Y-%m-%d").to_string(),
            kind: SnapshotKind::Daily,
            days: 1,
            folded: BTreeSet::new(),
            generated_at: now(),
            metrics,
        };
        write_json(&dir.join(daily_file_name(date)), &snapshot).unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn old_month_becomes_one_record() {
        let (_tmp, dir) = history();
        for day in 1..=30 {
            write_daily(&dir, date(2024, 11, day), 10);
        }
        write_daily(&dir, date(2025, 6, 1), 99);

        let cutoff = date(2025, 3, 17);
        let rollups = consolidate_history(&dir, "octo/widgets", cutoff, now(), false).unwrap();

        assert_eq!(
            rollups,
            vec![MonthRollup {
                month: Month { year: 2024, month: 11 },
                dailies: 30,
                days: 30,
            }]
        );

        let monthly: Snapshot = read_json(&dir.join("2024-11.json")).unwrap().unwrap();
        assert_eq!(monthly.kind, SnapshotKind::Monthly);
        assert_eq!(monthly.days, 30);
        assert_eq!(monthly.metrics.issues.open, 10);

        assert!(!dir.join("2024-11-01.json").exists());
        assert!(dir.join("2025-06-01.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn existing_monthly_is_weighted_in() {
        let (_tmp, dir) = history();
        for day in 1..=10 {
            write_daily(&dir, date(2024, 11, day), 10);
        }
        let _ = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        for day in 11..=15 {
            write_daily(&dir, date(2024, 11, day), 40);
        }
        let rollups = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        assert_eq!(rollups[0].dailies, 5);
        assert_eq!(rollups[0].days, 15);
        let monthly: Snapshot = read_json(&dir.join("2024-11.json")).unwrap().unwrap();
        assert_eq!(monthly.metrics.issues.open, 20);
        assert_eq!(monthly.folded.len(), 15);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn rerun_after_interrupted_fold_does_not_double_count() {
        let (_tmp, dir) = history();
        for day in 1..=30 {
            write_daily(&dir, date(2024, 11, day), 10);
        }
        let _ = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        // a crash after the monthly write leaves the dailies behind
        for day in 1..=30 {
            write_daily(&dir, date(2024, 11, day), 10);
        }
        let rollups = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        assert_eq!(rollups[0].dailies, 0);
        assert_eq!(rollups[0].days, 30);
        let monthly: Snapshot = read_json(&dir.join("2024-11.json")).unwrap().unwrap();
        assert_eq!(monthly.days, 30);
        assert_eq!(monthly.metrics.issues.open, 10);
        assert!(!dir.join("2024-11-01.json").exists());
        assert!(!dir.join("2024-11-30.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn partially_removed_dailies_fold_only_the_new_ones() {
        let (_tmp, dir) = history();
        for day in 1..=2 {
            write_daily(&dir, date(2024, 11, day), 10);
        }
        let _ = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        write_daily(&dir, date(2024, 11, 2), 10);
        write_daily(&dir, date(2024, 11, 3), 40);
        let rollups = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap();

        assert_eq!(rollups[0].dailies, 1);
        assert_eq!(rollups[0].days, 3);
        let monthly: Snapshot = read_json(&dir.join("2024-11.json")).unwrap().unwrap();
        assert_eq!(monthly.metrics.issues.open, 20);
        assert!(!dir.join("2024-11-02.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn dry_run_changes_nothing() {
        let (_tmp, dir) = history();
        write_daily(&dir, date(2024, 11, 1), 10);

        let rollups = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), true).unwrap();

        assert_eq!(rollups.len(), 1);
        assert!(dir.join("2024-11-01.json").exists());
        assert!(!dir.join("2024-11.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn failed_monthly_write_keeps_dailies() {
        let (_tmp, dir) = history();
        write_daily(&dir, date(2024, 11, 1), 10);
        write_daily(&dir, date(2024, 11, 2), 10);
        std::fs::create_dir_all(dir.join("2024-11.json").join("blocker")).unwrap();

        let _ = consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap_err();

        assert!(dir.join("2024-11-01.json").exists());
        assert!(dir.join("2024-11-02.json").exists());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn missing_history_is_empty() {
        let (_tmp, dir) = history();
        assert!(consolidate_history(&dir, "octo/widgets", date(2025, 1, 1), now(), false).unwrap().is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn retention_is_measured_from_now() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let layout = DataLayout::new(root);
        let repo: RepoSpec = "octo/widgets".parse().unwrap();
        let dir = layout.history_dir(&repo);

        write_daily(&dir, date(2025, 3, 16), 1);
        write_daily(&dir, date(2025, 3, 17), 1);

        let rollups = consolidate_repo(&layout, &repo, 90, now(), false).unwrap();

        assert_eq!(rollups[0].dailies, 1);
        assert!(!dir.join("2025-03-16.json").exists());
        assert!(dir.join("2025-03-17.json").exists());
    }
}
