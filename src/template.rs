use anyhow::{Context, Result};
use std::path::Path;
use wormgrid_common::TemplateSource;

/// Default pattern: a skull. `.` untouched, space disabled, digits pre-seeded counts.
const BUILTIN_PATTERN: &str = "
............222222222222222............
...........12222222222222221...........
...........12111111211111121...........
...........21    11211    12...........
...........21     121     12...........
...........2      222      2...........
...........21     222     12...........
...........22    12121    22...........
...........221   21 12.  122...........
...........1222222   2222221...........
...........1112221   1222111...........
...........1112221   1222111...........
...........1111221 1 1221111...........
............111222121222111............
.............1122222222211.............
..............12121212121..............
..............12222222221..............
..............11212121211..............
............... 1 1 1 1 ...............
.......................................
";

/// Rows of seed characters, applied once to the grid at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    rows: Vec<String>,
}

impl Template {
    /// Splits `text` into rows, dropping a single leading and trailing blank line
    /// so patterns can be written inside multi-line string literals.
    pub fn parse(text: &str) -> Self {
        let mut rows: Vec<String> = text.split('\n').map(|r| r.trim_end_matches('\r').to_string()).collect();
        if rows.first().is_some_and(|r| r.is_empty()) {
            rows.remove(0);
        }
        if rows.last().is_some_and(|r| r.is_empty()) {
            rows.pop();
        }
        Self { rows }
    }

    pub fn builtin() -> Self {
        Self::parse(BUILTIN_PATTERN)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref)
            .with_context(|| format!("Failed to read template file '{}'", path_ref.display()))?;
        Ok(Self::parse(&text))
    }

    /// Resolves the configured source. `None` means the grid starts empty.
    pub fn from_source(source: &TemplateSource) -> Result<Option<Self>> {
        match source {
            TemplateSource::None => Ok(None),
            TemplateSource::Builtin => Ok(Some(Self::builtin())),
            TemplateSource::File(path) => Self::load(path).map(Some),
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.chars().count()).max().unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}
