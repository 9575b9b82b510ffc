//! `onecode view`: dump, convert, or subset a container file. Mirrors
//! `ONEview.c`'s role in the reference toolchain.

use crate::index_spec::{self, IndexRange};
use onecode_core::error::{OneError, Result};
use onecode_format::{Reader, Writer};
use onecode_schema::Schema;
use std::io::{self, Write};
use std::path::PathBuf;

/// Arguments for `onecode view`.
#[derive(clap::Args, Debug)]
pub struct ViewArgs {
    /// Input container file.
    pub input: PathBuf,

    /// Output path; omit to write to stdout.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the output in binary form (default matches the input).
    #[arg(long, conflicts_with = "ascii")]
    pub binary: bool,

    /// Write the output in ASCII form (default matches the input).
    #[arg(long)]
    pub ascii: bool,

    /// Print only a summary of the header, without dumping body records.
    #[arg(long)]
    pub header_only: bool,

    /// Export the file's own schema text to PATH instead of dumping records.
    #[arg(long, value_name = "PATH")]
    pub write_schema: Option<PathBuf>,

    /// Suppress the ASCII header on output (ignored for binary output).
    #[arg(long)]
    pub no_header: bool,

    /// Print per-line-type counts to stderr after dumping.
    #[arg(short, long)]
    pub verbose: bool,

    /// Restrict the dump to these object index slices: `T i` or `T i-j`,
    /// comma-separated (e.g. `"A 0-9,A 20"`). Requires a binary input file.
    #[arg(long, value_name = "SPEC")]
    pub index: Option<String>,

    /// External schema file to resolve the input's line types against.
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Primary type name hint for a bare file with no `1` header line.
    #[arg(long = "type", value_name = "NAME")]
    pub type_hint: Option<String>,
}

pub fn run(args: ViewArgs) -> Result<()> {
    let schema = args.schema.as_deref().map(Schema::from_file).transpose()?;
    let mut reader = Reader::open(&args.input, schema.as_ref(), args.type_hint.as_deref())?;

    if let Some(path) = &args.write_schema {
        std::fs::write(path, reader.schema().write_text())
            .map_err(|e| OneError::write(format!("cannot write schema to {}: {e}", path.display())))?;
        return Ok(());
    }

    if args.header_only {
        print_header_summary(&reader);
        return Ok(());
    }

    let ranges = args.index.as_deref().map(index_spec::parse).transpose()?;
    let out_binary = if args.binary { true } else if args.ascii { false } else { reader.is_binary };

    let schema_for_output = reader.schema();
    let file_type = reader.file_type.clone();
    let subtype = reader.subtype.clone();
    let mut writer = Writer::new(Vec::new(), &schema_for_output, &file_type, subtype.as_deref(), out_binary)?;
    writer.set_no_ascii_header(args.no_header);
    writer.inherit_provenance(&reader.provenance)?;
    writer.add_provenance(
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        &std::env::args().collect::<Vec<_>>().join(" "),
        &crate::time::now_iso8601(),
    )?;
    writer.inherit_reference(&reader.references)?;
    writer.inherit_deferred(&reader.deferred)?;
    for text in &reader.header_text {
        writer.add_header_text(text)?;
    }

    let counts = match ranges {
        Some(ranges) => dump_ranges(&mut reader, &mut writer, &ranges)?,
        None => dump_all(&mut reader, &mut writer)?,
    };
    let bytes = writer.close()?;

    match &args.output {
        Some(path) => std::fs::write(path, &bytes).map_err(|e| OneError::write(format!("cannot write {}: {e}", path.display())))?,
        None => io::stdout().write_all(&bytes).map_err(|e| OneError::write(e.to_string()))?,
    }

    if args.verbose {
        for (line_type, count, max, total) in counts {
            eprintln!("{line_type}: count={count} max={max} total={total}");
        }
    }
    Ok(())
}

fn copy_current(reader: &Reader<impl io::BufRead + io::Seek>, writer: &mut Writer<Vec<u8>>, line_type: char) -> Result<()> {
    let record = reader
        .current()
        .ok_or_else(|| OneError::logic("no current record to copy"))?;
    writer.write_line(line_type, record.fields.clone(), record.list.clone())?;
    if let Some(comment) = &record.comment {
        writer.write_comment(comment)?;
    }
    Ok(())
}

fn dump_all(reader: &mut Reader<impl io::BufRead + io::Seek>, writer: &mut Writer<Vec<u8>>) -> Result<Vec<(char, i64, i64, i64)>> {
    while let Some(line_type) = reader.read_line()? {
        copy_current(reader, writer, line_type)?;
    }
    Ok(reader
        .declared_line_types()
        .into_iter()
        .filter_map(|c| reader.counts(c).map(|(count, max, total)| (c, count, max, total)))
        .collect())
}

fn dump_ranges(reader: &mut Reader<impl io::BufRead + io::Seek>, writer: &mut Writer<Vec<u8>>, ranges: &[IndexRange]) -> Result<Vec<(char, i64, i64, i64)>> {
    if !reader.is_binary {
        return Err(OneError::logic("--index requires a binary input file with a footer index"));
    }
    let object_type = reader.schema().blocks[0].object_type;
    for range in ranges {
        if Some(range.type_char) != object_type {
            return Err(OneError::logic(format!(
                "'{}' is not this file's object type",
                range.type_char
            )));
        }
    }
    for range in ranges {
        reader.goto_object(range.start)?;
        let mut ordinal = range.start;
        while ordinal <= range.end {
            let Some(line_type) = reader.read_line()? else { break };
            if line_type == range.type_char {
                ordinal += 1;
            }
            copy_current(reader, writer, line_type)?;
        }
    }
    Ok(reader
        .declared_line_types()
        .into_iter()
        .filter_map(|c| reader.counts(c).map(|(count, max, total)| (c, count, max, total)))
        .collect())
}

fn print_header_summary<R>(reader: &Reader<R>) {
    println!("type: {} {}", reader.file_type, reader.subtype.as_deref().unwrap_or(""));
    println!("version: {}.{}", reader.major, reader.minor);
    println!("encoding: {}", if reader.is_binary { "binary" } else { "ascii" });
    if reader.is_binary {
        println!("endian: {}", if reader.is_file_big_endian { "big" } else { "little" });
    }
    for p in &reader.provenance {
        println!("provenance: {} {} ({}) [{}]", p.program, p.version, p.command, p.date);
    }
    for r in &reader.references {
        println!("reference: {} ({} objects)", r.filename, r.count);
    }
    for d in &reader.deferred {
        println!("deferred: {}", d.filename);
    }
    for c in reader.declared_line_types() {
        if let Some((count, max, total)) = reader.given_counts(c) {
            if count > 0 {
                println!("given: {c} count={count} max={max} total={total}");
            }
        }
    }
}
