use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSetBuilder};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::AggregateError;
use crate::pattern::{LogEntry, LogPattern};

/// Status codes counted as problems.
pub const HTTP_ERROR_RANGE: Range<u16> = 400..600;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub lines_read: usize,
    pub lines_matched: usize,
    pub entries_kept: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ScanOutcome {
    pub entries: Vec<LogEntry>,
    pub stats: ScanStats,
}

fn is_glob(s: &str) -> bool { s.contains(['*', '?', '[']) }

/// Resolves configured sources into concrete paths; literal paths pass through untouched.
pub fn expand_sources(sources: &[String]) -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    expand_sources_in(&cwd, sources)
}

/// Same as [`expand_sources`], resolving relative patterns against `cwd`.
pub fn expand_sources_in(cwd: &Path, sources: &[String]) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = vec![];
    for src in sources {
        // An existing file is taken as named even if it contains glob characters, e.g. `app[1].log`.
        if !is_glob(src) || Path::new(src).exists() || cwd.join(src).exists() { out.push(PathBuf::from(src)); continue; }
        let mut found = expand_glob(cwd, src);
        if found.is_empty() { log::warn!("Source pattern {} matched no files", src); }
        found.sort();
        out.extend(found);
    }
    out
}

fn expand_glob(cwd: &Path, src: &str) -> Vec<PathBuf> {
    let pattern = src.strip_prefix("./").unwrap_or(src);
    let glob = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(g) => g,
        Err(e) => { log::error!("Invalid source pattern {}: {}", src, e); return vec![] }
    };
    let set = match GlobSetBuilder::new().add(glob).build() {
        Ok(s) => s,
        Err(e) => { log::error!("Invalid source pattern {}: {}", src, e); return vec![] }
    };
    let root = glob_root(pattern);
    let walk_root = if root.as_os_str().is_empty() { cwd.to_path_buf() } else { cwd.join(&root) };
    let mut wd = WalkDir::new(walk_root).follow_links(false);
    if !pattern.contains("**") {
        wd = wd.max_depth(Path::new(pattern).components().count().saturating_sub(root.components().count()));
    }
    let mut found: Vec<PathBuf> = vec![];
    for de in wd {
        let de = match de { Ok(d) => d, Err(e) => { log::warn!("Skipping while expanding {}: {}", src, e); continue } };
        let full = de.path();
        // Relative patterns are matched, and reported, relative to `cwd`.
        let shown = if root.is_absolute() { full.to_path_buf() } else { full.strip_prefix(cwd).unwrap_or(full).to_path_buf() };
        if full.is_file() && set.is_match(&shown) { found.push(shown); }
    }
    found
}

// Longest leading run of path components without glob metacharacters; empty for `*.log`.
fn glob_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for comp in Path::new(pattern).components() {
        if is_glob(&comp.as_os_str().to_string_lossy()) { break; }
        root.push(comp);
    }
    root
}

fn scan_file(pattern: &LogPattern, path: &Path, entries: &mut Vec<LogEntry>, stats: &mut ScanStats) -> Result<(), AggregateError> {
    let fail = |e: std::io::Error| AggregateError::FileScan { path: path.to_string_lossy().to_string(), reason: e.to_string() };
    let f = std::fs::File::open(path).map_err(fail)?;
    let mut br = BufReader::new(f);
    let mut kept: Vec<LogEntry> = vec![];
    let mut buf: Vec<u8> = vec![];
    let (mut read_n, mut matched_n) = (0usize, 0usize);
    loop {
        buf.clear();
        if br.read_until(b'\n', &mut buf).map_err(fail)? == 0 { break; }
        read_n += 1;
        let line = String::from_utf8_lossy(&buf);
        let Some(entry) = pattern.extract(line.trim_end_matches(['\r', '\n'])) else { continue };
        matched_n += 1;
        match entry.status() {
            Some(code) if HTTP_ERROR_RANGE.contains(&code) => kept.push(entry),
            _ => {}
        }
    }
    log::debug!("{}: {} lines, {} matched, {} in error range", path.to_string_lossy(), read_n, matched_n, kept.len());
    stats.lines_read += read_n;
    stats.lines_matched += matched_n;
    stats.entries_kept += kept.len();
    entries.extend(kept);
    Ok(())
}

/// Scans every path in order, keeping matching lines whose `status` lies in [`HTTP_ERROR_RANGE`].
///
/// A file that cannot be read is logged and contributes nothing; the remaining files are still scanned.
pub fn scan(pattern: &LogPattern, paths: &[PathBuf], progress: bool) -> ScanOutcome {
    let mut out = ScanOutcome::default();
    let pb = if progress { Some(indicatif::ProgressBar::new_spinner()) } else { None };
    for p in paths {
        if let Some(ref pb) = pb { pb.set_message(format!("Scanning {}", p.to_string_lossy())); pb.tick(); }
        match scan_file(pattern, p, &mut out.entries, &mut out.stats) {
            Ok(()) => out.stats.files_scanned += 1,
            Err(e) => {
                out.stats.files_failed += 1;
                log::error!("{}", e);
            }
        }
    }
    if let Some(pb) = pb { pb.finish_and_clear(); }
    log::info!("Scanned {} file(s) ({} failed): {} lines, {} matched, {} error entries", out.stats.files_scanned, out.stats.files_failed, out.stats.lines_read, out.stats.lines_matched, out.stats.entries_kept);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nginx_aggregate_scan_{}_{}", std::process::id(), name));
        let _ = std::fs::create_dir_all(&dir);
        let p = dir.join("access.log");
        std::fs::write(&p, body).unwrap();
        p
    }

    #[test]
    fn keeps_only_error_statuses() {
        let p = fixture("status", "500 /a\n200 /b\nabc /c\n404 /d\n600 /e\n399 /f\n599 /g\n");
        let pattern = LogPattern::compile("$status $request").unwrap();
        let out = scan(&pattern, std::slice::from_ref(&p), false);
        let reqs: Vec<&str> = out.entries.iter().map(|e| e.get("request").unwrap()).collect();
        assert_eq!(reqs, ["/a", "/d", "/g"]);
        assert_eq!(out.stats.lines_read, 7);
        assert_eq!(out.stats.entries_kept, 3);
        let _ = std::fs::remove_dir_all(p.parent().unwrap());
    }

    #[test]
    fn missing_file_does_not_stop_the_run() {
        let p = fixture("missing", "502 /x\r\n");
        let gone = p.with_file_name("nope.log");
        let pattern = LogPattern::compile("$status $request").unwrap();
        let out = scan(&pattern, &[gone, p.clone(), p.clone()], false);
        assert_eq!(out.stats.files_failed, 1);
        assert_eq!(out.stats.files_scanned, 2);
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].get("request"), Some("/x"));
        let _ = std::fs::remove_dir_all(p.parent().unwrap());
    }

    #[test]
    fn entries_without_status_are_dropped() {
        let p = fixture("nostatus", "GET /x\n");
        let pattern = LogPattern::compile("$method $request").unwrap();
        assert!(scan(&pattern, std::slice::from_ref(&p), false).entries.is_empty());
        let _ = std::fs::remove_dir_all(p.parent().unwrap());
    }

    #[test]
    fn glob_sources_expand_sorted() {
        let p = fixture("glob", "500 /a\n");
        let dir = p.parent().unwrap().to_path_buf();
        std::fs::write(dir.join("access.log.1"), "503 /b\n").unwrap();
        std::fs::write(dir.join("error.log"), "500 /c\n").unwrap();
        let pat = format!("{}/access.log*", dir.to_string_lossy());
        let paths = expand_sources(&[pat]);
        assert_eq!(paths, vec![dir.join("access.log"), dir.join("access.log.1")]);
        let literal = expand_sources(&["/var/log/nginx/access.log".to_string()]);
        assert_eq!(literal, vec![PathBuf::from("/var/log/nginx/access.log")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn bare_relative_glob_matches_in_cwd() {
        let p = fixture("relative", "500 /a\n");
        let dir = p.parent().unwrap().to_path_buf();
        std::fs::write(dir.join("b.log"), "500 /b\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "").unwrap();
        let paths = expand_sources_in(&dir, &["*.log".to_string()]);
        assert_eq!(paths, vec![PathBuf::from("access.log"), PathBuf::from("b.log")]);
        let dotted = expand_sources_in(&dir, &["./*.log".to_string()]);
        assert_eq!(dotted, paths);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wildcard_directory_component() {
        let p = fixture("midglob", "");
        let dir = p.parent().unwrap().to_path_buf();
        for site in ["site1", "site2"] {
            std::fs::create_dir_all(dir.join(site).join("deeper")).unwrap();
            std::fs::write(dir.join(site).join("access.log"), "500 /a\n").unwrap();
            std::fs::write(dir.join(site).join("deeper").join("access.log"), "500 /a\n").unwrap();
        }
        let pat = format!("{}/*/access.log", dir.to_string_lossy());
        assert_eq!(expand_sources(&[pat]), vec![dir.join("site1/access.log"), dir.join("site2/access.log")]);
        let rel = expand_sources_in(&dir, &["site*/access.log".to_string()]);
        assert_eq!(rel, vec![PathBuf::from("site1/access.log"), PathBuf::from("site2/access.log")]);
        let deep = expand_sources(&[format!("{}/**/access.log", dir.to_string_lossy())]);
        assert_eq!(deep.len(), 5);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_glob_root_yields_nothing() {
        let gone = std::env::temp_dir().join(format!("nginx_aggregate_scan_{}_absent", std::process::id()));
        assert!(expand_sources(&[format!("{}/*.log", gone.to_string_lossy())]).is_empty());
    }

    #[test]
    fn existing_file_with_brackets_is_literal() {
        let p = fixture("brackets", "500 /a\n");
        let dir = p.parent().unwrap().to_path_buf();
        let odd = dir.join("app[1].log");
        std::fs::write(&odd, "500 /a\n").unwrap();
        let src = odd.to_string_lossy().to_string();
        assert_eq!(expand_sources(std::slice::from_ref(&src)), vec![odd.clone()]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
