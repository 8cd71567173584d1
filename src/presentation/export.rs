//! CSV and XLSX export of record series.
//!
//! One row per record in the order given, one column per variable present in
//! the series, and an empty cell wherever a value is missing.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::models::record::columns;
use crate::models::{Location, Variable, WeatherRecord};
use crate::{Result, WeatherError};

const FIXED_COLUMNS: [&str; 5] = ["timestamp", "location", "country", "latitude", "longitude"];

fn csv_error(err: impl std::fmt::Display) -> WeatherError {
    WeatherError::render(format!("csv export failed: {err}"))
}

fn xlsx_error(err: XlsxError) -> WeatherError {
    WeatherError::render(format!("spreadsheet export failed: {err}"))
}

fn header(variables: &[Variable]) -> Vec<String> {
    FIXED_COLUMNS
        .iter()
        .map(|c| (*c).to_string())
        .chain(variables.iter().map(|v| v.as_str().to_string()))
        .collect()
}

/// Serialize records to CSV text
pub fn to_csv(records: &[WeatherRecord]) -> Result<String> {
    let variables = columns(records);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header(&variables)).map_err(csv_error)?;

    for record in records {
        let mut row = vec![
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            record.location.name.clone(),
            record.location.country.clone().unwrap_or_default(),
            record.location.latitude.to_string(),
            record.location.longitude.to_string(),
        ];
        row.extend(
            variables
                .iter()
                .map(|v| record.get(*v).map(|x| x.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row).map_err(csv_error)?;
    }

    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

fn parse_number(field: &str, column: &str, line: usize) -> Result<Option<f64>> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field.parse::<f64>().map(Some).map_err(|_| {
        WeatherError::validation(format!(
            "line {line}: '{field}' in column '{column}' is not a number"
        ))
    })
}

/// Parse CSV text produced by [`to_csv`]. Unknown columns are ignored.
pub fn from_csv(text: &str) -> Result<Vec<WeatherRecord>> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| WeatherError::validation(format!("invalid csv header: {e}")))?
        .clone();

    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let Some(timestamp_col) = position("timestamp") else {
        return Err(WeatherError::validation("csv has no 'timestamp' column"));
    };
    let name_col = position("location");
    let country_col = position("country");
    let (Some(lat_col), Some(lon_col)) = (position("latitude"), position("longitude")) else {
        return Err(WeatherError::validation(
            "csv needs 'latitude' and 'longitude' columns",
        ));
    };
    let variable_cols: BTreeMap<usize, Variable> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| h.parse::<Variable>().ok().map(|v| (i, v)))
        .collect();

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let line = index + 2;
        let row = row.map_err(|e| WeatherError::validation(format!("line {line}: {e}")))?;
        let field = |col: usize| row.get(col).unwrap_or_default();

        let timestamp = DateTime::parse_from_rfc3339(field(timestamp_col).trim())
            .map_err(|e| WeatherError::validation(format!("line {line}: bad timestamp: {e}")))?
            .with_timezone(&Utc);
        let latitude = parse_number(field(lat_col), "latitude", line)?
            .ok_or_else(|| WeatherError::validation(format!("line {line}: missing latitude")))?;
        let longitude = parse_number(field(lon_col), "longitude", line)?
            .ok_or_else(|| WeatherError::validation(format!("line {line}: missing longitude")))?;

        let mut location = Location::new(
            latitude,
            longitude,
            name_col.map(field).unwrap_or_default(),
        );
        location.country = country_col
            .map(field)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut record = WeatherRecord::new(timestamp, location);
        for (col, variable) in &variable_cols {
            let value = parse_number(field(*col), variable.as_str(), line)?;
            record.values.insert(*variable, value);
        }
        records.push(record);
    }
    Ok(records)
}

/// Serialize records to an XLSX workbook
pub fn to_spreadsheet(records: &[WeatherRecord]) -> Result<Vec<u8>> {
    let variables = columns(records);
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Weather").map_err(xlsx_error)?;

    for (col, name) in header(&variables).iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, name, &bold)
            .map_err(xlsx_error)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet
            .write_string(row, 0, record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true))
            .map_err(xlsx_error)?;
        worksheet
            .write_string(row, 1, &record.location.name)
            .map_err(xlsx_error)?;
        if let Some(country) = &record.location.country {
            worksheet.write_string(row, 2, country).map_err(xlsx_error)?;
        }
        worksheet
            .write_number(row, 3, record.location.latitude)
            .map_err(xlsx_error)?;
        worksheet
            .write_number(row, 4, record.location.longitude)
            .map_err(xlsx_error)?;
        for (offset, variable) in variables.iter().enumerate() {
            if let Some(value) = record.get(*variable) {
                let col = (FIXED_COLUMNS.len() + offset) as u16;
                worksheet.write_number(row, col, value).map_err(xlsx_error)?;
            }
        }
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}
