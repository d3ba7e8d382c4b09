//! Bulk student import from spreadsheet uploads.
//!
//! The first row of the sheet is the header row and must name the `name`, `phone` and `email`
//! columns (exact, case-sensitive; other columns are ignored). Every later row with all three
//! values non-empty becomes a student. Rows missing any of them are skipped and only counted.
//! Entirely blank rows are not data rows at all.
//!
//! `.xlsx` workbooks are read with `calamine` (first worksheet only) and `.csv` files with `csv`.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook_from_rs};
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 3] = ["name", "phone", "email"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImportError {
    #[error("The uploaded file is empty.")]
    EmptyFile,

    #[error("No valid student data found in the file. Make sure the columns are named 'name', 'phone' and 'email'.")]
    NoValidRows,

    #[error("Unsupported file type '{0}'. Upload an .xlsx or .csv file.")]
    UnsupportedFormat(String),

    #[error("Could not read the spreadsheet: {0}")]
    Unreadable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    Xlsx,
    Csv,
}

impl SpreadsheetFormat {
    /// Pick the format from the uploaded file name, falling back to the content type
    pub fn detect(file_name: Option<&str>, content_type: Option<&str>) -> Result<Self, ImportError> {
        let extension = file_name
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match (extension.as_deref(), content_type) {
            (Some("xlsx"), _) => Ok(SpreadsheetFormat::Xlsx),
            (Some("csv"), _) => Ok(SpreadsheetFormat::Csv),
            (_, Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")) => Ok(SpreadsheetFormat::Xlsx),
            (_, Some("text/csv")) => Ok(SpreadsheetFormat::Csv),
            (Some(other), _) => Err(ImportError::UnsupportedFormat(other.to_string())),
            (None, other) => Err(ImportError::UnsupportedFormat(other.unwrap_or("unknown").to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedStudent {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSheet {
    pub students: Vec<ImportedStudent>,
    pub rows_skipped: u64,
}

pub fn parse_spreadsheet(bytes: &[u8], format: SpreadsheetFormat) -> Result<ParsedSheet, ImportError> {
    let table = match format {
        SpreadsheetFormat::Xlsx => read_xlsx(bytes)?,
        SpreadsheetFormat::Csv => read_csv(bytes)?,
    };
    students_from_table(table)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut workbook: Xlsx<Cursor<&[u8]>> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|e: XlsxError| ImportError::Unreadable(e.to_string()))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| ImportError::Unreadable(e.to_string()))?,
        None => return Err(ImportError::EmptyFile),
    };

    Ok(range.rows().map(|row| row.iter().map(cell_to_string).collect()).collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<Vec<String>>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut table = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| match e.position() {
            Some(p) => ImportError::Unreadable(format!("line {}: {e}", p.line())),
            None => ImportError::Unreadable(e.to_string()),
        })?;
        table.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

fn students_from_table(table: Vec<Vec<String>>) -> Result<ParsedSheet, ImportError> {
    let mut rows = table
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()));

    let header = rows.next().ok_or(ImportError::EmptyFile)?;
    let data: Vec<Vec<String>> = rows.collect();
    if data.is_empty() {
        return Err(ImportError::EmptyFile);
    }

    let column = |wanted: &str| header.iter().position(|h| h.trim() == wanted);
    let columns = (column("name"), column("phone"), column("email"));

    let mut students = Vec::new();
    let mut rows_skipped = 0;
    for row in data {
        let value = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match (value(columns.0), value(columns.1), value(columns.2)) {
            (Some(name), Some(phone), Some(email)) => students.push(ImportedStudent { name, phone, email }),
            _ => rows_skipped += 1,
        }
    }

    if students.is_empty() {
        return Err(ImportError::NoValidRows);
    }

    Ok(ParsedSheet { students, rows_skipped })
}
