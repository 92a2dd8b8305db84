// Turns the text of one GTFS member file into records.
//
// Default behaviour is deliberately loose: the first non-empty line is taken
// as the header without looking at it, every other line is split on bare
// commas, and short lines produce records with missing fields. Quoted fields
// and header checks are opt-in through `ParseOptions`.

use crate::error::ParseError;
use crate::gtfs_models::{Column, GtfsRecord, GtfsTable, RawRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SplitMode {
    /// Split on every comma; quoted commas break the line apart.
    #[default]
    Naive,
    /// RFC 4180 tokenizer from the `csv` crate.
    Csv,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    pub split: SplitMode,
    pub validate_headers: bool,
}

pub fn parse_table(
    raw_text: &str,
    table: GtfsTable,
    options: ParseOptions,
) -> Result<Vec<GtfsRecord>, ParseError> {
    let records = parse_raw(raw_text, table.file_name(), table.columns(), options)?;
    Ok(records
        .into_iter()
        .map(|raw| table.build_record(raw))
        .collect())
}

/// `source` only names the file in error messages.
pub fn parse_raw(
    raw_text: &str,
    source: &str,
    columns: &[Column],
    options: ParseOptions,
) -> Result<Vec<RawRecord>, ParseError> {
    let mut rows = split_rows(raw_text, options.split)?.into_iter();

    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };

    if options.validate_headers {
        check_header(source, &header, columns)?;
    }

    Ok(rows
        .map(|fields| RawRecord::from_fields(&fields, columns))
        .collect())
}

fn split_rows(raw_text: &str, mode: SplitMode) -> Result<Vec<Vec<String>>, ParseError> {
    match mode {
        SplitMode::Naive => Ok(raw_text
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect()),
        SplitMode::Csv => {
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(raw_text.as_bytes());

            let mut rows = Vec::new();
            for result in rdr.records() {
                let record = result?;
                rows.push(record.iter().map(str::to_string).collect());
            }
            Ok(rows)
        }
    }
}

fn check_header(source: &str, header: &[String], columns: &[Column]) -> Result<(), ParseError> {
    for column in columns {
        let found = header
            .get(column.index)
            .map(|h| h.trim_start_matches('\u{feff}').trim())
            .unwrap_or_default();

        if found != column.name {
            return Err(ParseError::HeaderMismatch {
                file: source.to_string(),
                index: column.index,
                expected: column.name.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(())
}
