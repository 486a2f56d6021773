use std::fs;
use std::io::Write;
use std::path::Path;

/// Renders a value the way the engine's input files expect it: plain
/// decimals keep a fractional part, very large or small magnitudes use an
/// upper-case exponent.
pub fn format_engine_number(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    let magnitude = value.abs();
    if !value.is_finite() || (1.0e-4..1.0e16).contains(&magnitude) {
        let rendered = value.to_string();
        if value.is_finite() && !rendered.contains('.') {
            return format!("{}.0", rendered);
        }
        return rendered;
    }
    format!("{:E}", value)
}

pub fn normalize_text(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_file(path: &Path, content: &str) -> std::io::Result<()> {
    fs::write(path, normalize_text(content))
}

pub fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    write_text_file(path, &lines.join("\n"))
}

/// Writes next to `path` first and renames over it, so readers never see a
/// half-written file.
pub fn write_text_file_replacing(path: &Path, content: &str) -> std::io::Result<()> {
    let mut staging_name = path.as_os_str().to_owned();
    staging_name.push(".tmp");
    let staging = Path::new(&staging_name);
    {
        let mut file = fs::File::create(staging)?;
        file.write_all(normalize_text(content).as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(staging, path)
}

/// Lines of a text file without their terminators. Blank trailing lines are
/// dropped.
pub fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    let mut lines: Vec<String> = normalize_text(&content)
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::{
        format_engine_number, normalize_text, read_lines, write_lines, write_text_file,
        write_text_file_replacing,
    };
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn engine_numbers_keep_a_decimal_point() {
        assert_eq!(format_engine_number(10.0), "10.0");
        assert_eq!(format_engine_number(0.25), "0.25");
        assert_eq!(format_engine_number(-3.0), "-3.0");
        assert_eq!(format_engine_number(0.0), "0.0");
    }

    #[test]
    fn extreme_magnitudes_use_exponent_form() {
        assert_eq!(format_engine_number(1.5e-7), "1.5E-7");
        assert_eq!(format_engine_number(2.0e20), "2E20");
    }

    #[test]
    fn normalize_text_uses_canonical_line_endings() {
        assert_eq!(normalize_text("alpha\r\nbeta\rgamma"), "alpha\nbeta\ngamma\n");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn repeated_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("case.inp");
        let lines = vec!["! comment".to_string(), "SFA,Face1,1,PRES,10.0".to_string()];

        write_lines(&path, &lines).expect("first write should succeed");
        let first = fs::read(&path).expect("file should be readable");
        write_lines(&path, &lines).expect("second write should succeed");
        let second = fs::read(&path).expect("file should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"! comment\nSFA,Face1,1,PRES,10.0\n");
    }

    #[test]
    fn replacing_write_leaves_no_staging_file() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("cache.json");
        write_text_file(&path, "old").expect("seed write");
        write_text_file_replacing(&path, "new").expect("replacing write");

        assert_eq!(fs::read_to_string(&path).expect("readable"), "new\n");
        assert!(!temp.path().join("cache.json.tmp").exists());
    }

    #[test]
    fn read_lines_drops_trailing_blank_lines() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("hook.txt");
        fs::write(&path, "NSUBST,10\r\nOUTRES,ALL,ALL  \n\n\n").expect("seed");
        let lines = read_lines(&path).expect("read should succeed");
        assert_eq!(lines, vec!["NSUBST,10".to_string(), "OUTRES,ALL,ALL".to_string()]);
    }
}
