//! `onecode stat`: print per-line-type counts without dumping records.
//! Mirrors `ONEstat.c`'s role in the reference toolchain.

use onecode_core::error::Result;
use onecode_format::Reader;
use onecode_schema::Schema;
use serde::Serialize;
use std::path::PathBuf;

/// Arguments for `onecode stat`.
#[derive(clap::Args, Debug)]
pub struct StatArgs {
    /// Input container file.
    pub input: PathBuf,

    /// External schema file to resolve the input's line types against.
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Primary type name hint for a bare file with no `1` header line.
    #[arg(long = "type", value_name = "NAME")]
    pub type_hint: Option<String>,

    /// Print every declared line type, including ones with a zero count.
    #[arg(short, long)]
    pub all: bool,

    /// Print the report as JSON instead of the plain-text table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct LineTypeReport {
    line_type: String,
    count: i64,
    max: i64,
    total: i64,
    given_count: Option<i64>,
}

#[derive(Serialize)]
struct FileReport {
    file_type: String,
    major: u32,
    minor: u32,
    line_types: Vec<LineTypeReport>,
}

pub fn run(args: StatArgs) -> Result<()> {
    let schema = args.schema.as_deref().map(Schema::from_file).transpose()?;
    let mut reader = Reader::open(&args.input, schema.as_ref(), args.type_hint.as_deref())?;

    while reader.read_line()?.is_some() {}

    let mut rows = Vec::new();
    for line_type in reader.declared_line_types() {
        let (count, max, total) = reader.counts(line_type).unwrap_or((0, 0, 0));
        if count == 0 && !args.all {
            continue;
        }
        let given = reader.given_counts(line_type).map(|(gc, _, _)| gc).filter(|&gc| gc != count);
        rows.push(LineTypeReport {
            line_type: line_type.to_string(),
            count,
            max,
            total,
            given_count: given,
        });
    }

    if args.json {
        let report = FileReport {
            file_type: reader.file_type.clone(),
            major: reader.major,
            minor: reader.minor,
            line_types: rows,
        };
        println!("{}", serde_json::to_string_pretty(&report).map_err(|e| onecode_core::error::OneError::write(e.to_string()))?);
        return Ok(());
    }

    println!("{} {}.{}", reader.file_type, reader.major, reader.minor);
    for row in rows {
        print!("{}  count {}", row.line_type, row.count);
        if row.max > 0 {
            print!("  max {}", row.max);
        }
        if row.total > 0 {
            print!("  total {}", row.total);
        }
        if let Some(gc) = row.given_count {
            print!("  (header declared {gc})");
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_type_report_serializes_expected_shape() {
        let row = LineTypeReport {
            line_type: "A".to_string(),
            count: 3,
            max: 5,
            total: 12,
            given_count: None,
        };
        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"count\":3"));
        assert!(json.contains("\"line_type\":\"A\""));
    }
}
