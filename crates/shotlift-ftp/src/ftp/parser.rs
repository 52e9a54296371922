//! Names out of LIST / MLSD replies.
//!
//! The duplicate check only needs entry names and whether an entry is a
//! directory. Recognised line shapes:
//! - MLSD facts (RFC 3659): `type=file;size=1234;modify=20260101120000; shot.png`
//! - Unix `ls -l`: `-rw-r--r-- 1 owner group 1234 Jan  1 12:00 shot.png`
//! - Windows/IIS: `01-01-26  12:00AM       1234 shot.png`
//!
//! Any other line (bare NLST output) is taken as a name.

use crate::ftp::types::{FtpEntry, FtpEntryKind};
use regex::Regex;

/// Parse a complete LIST or MLSD body, dropping `.`, `..` and `total` lines.
pub fn parse_listing(raw: &str) -> Vec<FtpEntry> {
    let unix = Regex::new(r"^([dlcbps-])[rwxsStT-]{9}\S*\s+\d+\s+\S+\s+\S+\s+\d+\s+\w{3}\s+\d{1,2}\s+[\d:]+\s+(.+)$").ok();
    let windows = Regex::new(r"^\d{2}-\d{2}-\d{2}\s+\d{1,2}:\d{2}(?:AM|PM)?\s+(<DIR>|\d+)\s+(.+)$").ok();

    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("total "))
        .map(|line| {
            parse_mlsd(line)
                .or_else(|| unix.as_ref().and_then(|re| parse_unix(re, line)))
                .or_else(|| windows.as_ref().and_then(|re| parse_windows(re, line)))
                .unwrap_or_else(|| FtpEntry {
                    name: line.to_string(),
                    kind: FtpEntryKind::Unknown,
                })
        })
        .filter(|e| e.name != "." && e.name != "..")
        .collect()
}

/// Names of every non-directory entry, in server order.
pub fn file_names(raw: &str) -> Vec<String> {
    parse_listing(raw)
        .into_iter()
        .filter(|e| e.kind != FtpEntryKind::Directory)
        .map(|e| e.name)
        .collect()
}

/// `fact=value;fact=value; name`
fn parse_mlsd(line: &str) -> Option<FtpEntry> {
    let (facts, name) = line.split_once("; ")?;
    if name.is_empty() || !facts.contains('=') {
        return None;
    }
    let kind = facts
        .split(';')
        .filter_map(|fact| fact.split_once('='))
        .find(|(key, _)| key.eq_ignore_ascii_case("type"))
        .map_or(FtpEntryKind::Unknown, |(_, value)| match value.to_ascii_lowercase().as_str() {
            "dir" | "cdir" | "pdir" => FtpEntryKind::Directory,
            "file" => FtpEntryKind::File,
            v if v.starts_with("os.unix=sl") => FtpEntryKind::Symlink,
            _ => FtpEntryKind::Unknown,
        });
    Some(FtpEntry {
        name: name.to_string(),
        kind,
    })
}

fn parse_unix(re: &Regex, line: &str) -> Option<FtpEntry> {
    let caps = re.captures(line)?;
    let kind = match caps.get(1)?.as_str() {
        "d" => FtpEntryKind::Directory,
        "l" => FtpEntryKind::Symlink,
        "-" => FtpEntryKind::File,
        _ => FtpEntryKind::Unknown,
    };
    let name = caps.get(2)?.as_str();
    let name = match (kind, name.split_once(" -> ")) {
        (FtpEntryKind::Symlink, Some((link, _))) => link,
        _ => name,
    };
    Some(FtpEntry {
        name: name.to_string(),
        kind,
    })
}

fn parse_windows(re: &Regex, line: &str) -> Option<FtpEntry> {
    let caps = re.captures(line)?;
    let kind = if caps.get(1)?.as_str() == "<DIR>" {
        FtpEntryKind::Directory
    } else {
        FtpEntryKind::File
    };
    Some(FtpEntry {
        name: caps.get(2)?.as_str().to_string(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_lines() {
        let raw = "total 12\n\
                   drwxr-xr-x   2 root root  4096 Mar  1  2023 shots\n\
                   -rw-r--r--   1 u g  10 Jan  1 12:00 my shot.png\n\
                   lrwxrwxrwx   1 root root    22 Jan  5 08:00 latest.png -> /var/shots/a.png";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, FtpEntryKind::Directory);
        assert_eq!(entries[1].name, "my shot.png");
        assert_eq!(entries[2].name, "latest.png");
        assert_eq!(entries[2].kind, FtpEntryKind::Symlink);
    }

    #[test]
    fn mlsd_lines() {
        let raw = "type=cdir;modify=20260101120000; .\n\
                   type=file;size=1024;modify=20260101120000; old_shot.png\n\
                   type=dir;modify=20260101120000; archive";
        let entries = parse_listing(raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "old_shot.png");
        assert_eq!(entries[0].kind, FtpEntryKind::File);
        assert_eq!(entries[1].kind, FtpEntryKind::Directory);
    }

    #[test]
    fn windows_lines() {
        let entries = parse_listing("01-01-26  12:00AM      <DIR> My Documents\r\n01-02-26  03:15PM   2048 shot.png");
        assert_eq!(entries[0].name, "My Documents");
        assert_eq!(entries[0].kind, FtpEntryKind::Directory);
        assert_eq!(entries[1].name, "shot.png");
    }

    #[test]
    fn directories_are_not_file_names() {
        let raw = "drwxr-xr-x 2 u g 4096 Jan  1 12:00 shot.png.d\n-rw-r--r-- 1 u g 10 Jan  1 12:00 shot.png";
        assert_eq!(file_names(raw), vec!["shot.png".to_string()]);
    }

    #[test]
    fn bare_names_fall_through() {
        let names = file_names("shot.png\r\nshot_old.png\r\n");
        assert_eq!(names, vec!["shot.png".to_string(), "shot_old.png".to_string()]);
    }
}
