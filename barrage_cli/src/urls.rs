//! Loading targets from a newline-delimited URL file.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};
use barrage::Target;

/// Read the targets listed in the file at `path`.
pub fn read_targets(path: &Path) -> Result<Vec<Target>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    parse_targets(BufReader::new(file)).with_context(|| format!("in {}", path.display()))
}

/// One URL per line. Blank lines and lines starting with `#` are skipped,
/// repeated URLs are dropped with a warning. The first invalid URL aborts.
pub fn parse_targets(reader: impl BufRead) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.with_context(|| format!("cannot read line {lineno}"))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let target = Target::parse(line).with_context(|| format!("line {lineno}"))?;
        if !seen.insert(target.clone()) {
            tracing::warn!("Ignoring duplicate URL {target} on line {lineno}");
            continue;
        }
        targets.push(target);
    }
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn urls(targets: &[Target]) -> Vec<&str> {
        targets.iter().map(Target::as_str).collect()
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let input = "\n# staging\n  http://a.example  \n\n\thttps://b.example/path\n#http://c.example\n";
        let targets = parse_targets(Cursor::new(input)).unwrap();
        assert_eq!(urls(&targets), ["http://a.example/", "https://b.example/path"]);
    }

    #[test]
    fn keeps_file_order_and_drops_duplicates() {
        let input = "http://b.example\nhttp://a.example\nhttp://b.example/\n";
        let targets = parse_targets(Cursor::new(input)).unwrap();
        assert_eq!(urls(&targets), ["http://b.example/", "http://a.example/"]);
    }

    #[test]
    fn invalid_url_names_the_line() {
        let input = "http://a.example\n\nnot a url\nhttp://b.example\n";
        let err = parse_targets(Cursor::new(input)).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"), "{err:#}");
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        assert!(parse_targets(Cursor::new("ftp://a.example\n")).is_err());
    }

    #[test]
    fn empty_file_has_no_targets() {
        assert!(parse_targets(Cursor::new("")).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_targets(Path::new("/nonexistent/barrage-urls")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/barrage-urls"));
    }
}
