//! Display formatting for terminal and log output
//!
//! Byte sizes, durations, transfer rates, and the local archive listing
//! printed by `arcsync --list`.

use std::time::Duration;

use crate::archive::naming::ArchiveFile;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;
const TB: f64 = GB * 1024.0;

/// Format a byte count with a binary unit suffix
pub fn format_size(bytes: u64) -> String {
    format_size_f64(bytes as f64)
}

fn format_size_f64(bytes: f64) -> String {
    if bytes >= TB {
        format!("{:.2} TB", bytes / TB)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes / KB)
    } else {
        format!("{:.0} B", bytes)
    }
}

/// Format a transfer rate, e.g. `1.50 MB/s`
pub fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return "n/a".to_string();
    }
    format!("{}/s", format_size_f64(bytes as f64 / secs))
}

/// Format a duration as `1h 02m 03s`, `2m 03s` or `3.4s`
pub fn format_duration(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Format local archives as a table, grouped by job and newest first
pub fn format_archive_list(archives: &[ArchiveFile]) -> String {
    if archives.is_empty() {
        return "No archives found.".to_string();
    }

    let mut rows: Vec<&ArchiveFile> = archives.iter().collect();
    rows.sort_by(|a, b| {
        a.name
            .job
            .to_lowercase()
            .cmp(&b.name.job.to_lowercase())
            .then(b.name.timestamp.cmp(&a.name.timestamp))
    });

    let job_width = rows.iter().map(|a| a.name.job.len()).max().unwrap_or(3).max(3);
    let file_width = rows.iter().map(|a| a.file_name().len()).max().unwrap_or(4).max(4);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<job_width$}  {:<11}  {:<file_width$}  {:>12}\n",
        "Job",
        "Kind",
        "File",
        "Size",
        job_width = job_width,
        file_width = file_width,
    ));
    output.push_str(&format!(
        "{:-<job_width$}  {:-<11}  {:-<file_width$}  {:->12}\n",
        "",
        "",
        "",
        "",
        job_width = job_width,
        file_width = file_width,
    ));

    for archive in &rows {
        output.push_str(&format!(
            "{:<job_width$}  {:<11}  {:<file_width$}  {:>12}\n",
            archive.name.job,
            archive.kind().to_string(),
            archive.file_name(),
            format_size(archive.size),
            job_width = job_width,
            file_width = file_width,
        ));
    }

    let total: u64 = archives.iter().map(|a| a.size).sum();
    output.push_str(&format!(
        "\nTotal: {} archive(s), {}\n",
        archives.len(),
        format_size(total)
    ));

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::naming::ArchiveName;
    use std::path::PathBuf;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(2048, Duration::from_secs(2)), "1.00 KB/s");
        assert_eq!(format_rate(2048, Duration::ZERO), "n/a");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(3400)), "3.4s");
        assert_eq!(format_duration(Duration::from_secs(123)), "2m 03s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h 02m 03s");
    }

    #[test]
    fn test_format_archive_list() {
        let name = "F-Logs-2024-01-01-00-00-00.7z";
        let archives = vec![ArchiveFile {
            path: PathBuf::from("/bak").join(name),
            name: ArchiveName::parse(name).unwrap(),
            size: 2048,
        }];
        let output = format_archive_list(&archives);
        assert!(output.contains("Logs"));
        assert!(output.contains(name));
        assert!(output.contains("2.00 KB"));
        assert!(output.contains("Total: 1 archive(s)"));
    }

    #[test]
    fn test_empty_archive_list() {
        assert_eq!(format_archive_list(&[]), "No archives found.");
    }
}
