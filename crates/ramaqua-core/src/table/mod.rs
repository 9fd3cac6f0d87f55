use crate::domain::{
    CoreError, CoreResult, Delimiter, ReferenceEntry, Roi, RoiSet, SampleRecord, SampleTable,
    Spectrum, MAX_ROI_PAIRS, MIN_ROI_PAIRS,
};
use std::path::Path;

/// Read a two-column delimited spectrum file. The first row is treated as a
/// header and skipped; descending-shift files are reversed by
/// `Spectrum::from_columns`.
pub fn read_spectrum(path: &Path, delimiter: Delimiter) -> CoreResult<Spectrum> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| spectrum_file_error(path, source.to_string()))?;

    let mut shift = Vec::new();
    let mut intensity = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 2;
        let record =
            record.map_err(|source| spectrum_file_error(path, source.to_string()))?;
        if record.len() < 2 {
            return Err(spectrum_file_error(
                path,
                format!("line {line} has {} column(s), expected 2", record.len()),
            ));
        }

        shift.push(parse_numeric_field(path, &record[0], line, "shift")?);
        intensity.push(parse_numeric_field(path, &record[1], line, "intensity")?);
    }

    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Spectrum::from_columns(shift, intensity)
        .map_err(|source| CoreError::MalformedSpectrum { name, source })
}

fn parse_numeric_field(path: &Path, field: &str, line: usize, column: &str) -> CoreResult<f64> {
    field.parse::<f64>().map_err(|_| {
        spectrum_file_error(path, format!("line {line}: {column} value '{field}' is not numeric"))
    })
}

fn spectrum_file_error(path: &Path, detail: String) -> CoreError {
    CoreError::SpectrumFile {
        path: path.to_path_buf(),
        detail,
    }
}

const NAME_COLUMN: &str = "Name";
const WATER_COLUMN: &str = "Water, wt%";
const FEO_COLUMN: &str = "FeO";
const REFERENCE_COLUMN: &str = "Ref";
const REFERENCE_WATER_COLUMN: &str = "Water Ref";

impl SampleTable {
    /// Read a sample table with an explicit, validated ROI pair count.
    ///
    /// Expected header columns: `Name`, `Water, wt%`, `FeO`, then
    /// `ROI<i> lb` / `ROI<i> hb` for `i` in `1..=roi_pairs`, and optionally
    /// `Ref` / `Water Ref` for the external-calibration path.
    pub fn from_csv(path: &Path, delimiter: Delimiter, roi_pairs: usize) -> CoreResult<Self> {
        if !(MIN_ROI_PAIRS..=MAX_ROI_PAIRS).contains(&roi_pairs) {
            return Err(CoreError::Config {
                detail: format!(
                    "ROI pair count must be between {MIN_ROI_PAIRS} and {MAX_ROI_PAIRS}, got {roi_pairs}"
                ),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| table_error(path, source.to_string()))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| table_error(path, source.to_string()))?
            .iter()
            .map(|header| header.to_string())
            .collect();

        let name_index = required_column(path, &headers, NAME_COLUMN)?;
        let water_index = required_column(path, &headers, WATER_COLUMN)?;
        let feo_index = required_column(path, &headers, FEO_COLUMN)?;
        let mut roi_indices = Vec::with_capacity(roi_pairs * 2);
        for pair in 1..=roi_pairs {
            roi_indices.push(required_column(path, &headers, &format!("ROI{pair} lb"))?);
            roi_indices.push(required_column(path, &headers, &format!("ROI{pair} hb"))?);
        }
        let reference_index = headers.iter().position(|header| header == REFERENCE_COLUMN);
        let reference_water_index = headers
            .iter()
            .position(|header| header == REFERENCE_WATER_COLUMN);

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|source| table_error(path, source.to_string()))?;
            let name = field(path, &row, name_index, index)?.to_string();
            if name.is_empty() {
                return Err(table_error(path, format!("row {index}: empty sample name")));
            }

            let water_wt = parse_table_numeric(path, &row, water_index, index, WATER_COLUMN)?;
            let feo_wt = parse_table_numeric(path, &row, feo_index, index, FEO_COLUMN)?;

            let mut pairs = Vec::with_capacity(roi_pairs);
            for bounds in roi_indices.chunks_exact(2) {
                let low = parse_table_numeric(path, &row, bounds[0], index, "ROI low bound")?;
                let high = parse_table_numeric(path, &row, bounds[1], index, "ROI high bound")?;
                pairs.push(Roi::new(low, high));
            }
            let rois = RoiSet::new(pairs)
                .map_err(|source| table_error(path, format!("row {index}: {source}")))?;

            let reference = match reference_index {
                Some(column) => {
                    let file = field(path, &row, column, index)?.to_string();
                    if file.is_empty() {
                        None
                    } else {
                        let water_column = reference_water_index.ok_or_else(|| {
                            table_error(
                                path,
                                format!(
                                    "row {index}: '{REFERENCE_COLUMN}' set but '{REFERENCE_WATER_COLUMN}' column is missing"
                                ),
                            )
                        })?;
                        let water_wt = parse_table_numeric(
                            path,
                            &row,
                            water_column,
                            index,
                            REFERENCE_WATER_COLUMN,
                        )?;
                        Some(ReferenceEntry { file, water_wt })
                    }
                }
                None => None,
            };

            records.push(SampleRecord {
                name,
                water_wt,
                feo_wt,
                rois,
                reference,
            });
        }

        Ok(SampleTable::new(records))
    }
}

fn required_column(path: &Path, headers: &[String], name: &str) -> CoreResult<usize> {
    headers
        .iter()
        .position(|header| header == name)
        .ok_or_else(|| table_error(path, format!("missing required column '{name}'")))
}

fn field<'a>(
    path: &Path,
    row: &'a csv::StringRecord,
    column: usize,
    index: usize,
) -> CoreResult<&'a str> {
    row.get(column)
        .ok_or_else(|| table_error(path, format!("row {index}: missing field {column}")))
}

fn parse_table_numeric(
    path: &Path,
    row: &csv::StringRecord,
    column: usize,
    index: usize,
    label: &str,
) -> CoreResult<f64> {
    let raw = field(path, row, column, index)?;
    raw.parse::<f64>().map_err(|_| {
        table_error(path, format!("row {index}: {label} value '{raw}' is not numeric"))
    })
}

fn table_error(path: &Path, detail: String) -> CoreError {
    CoreError::Table {
        path: path.to_path_buf(),
        detail,
    }
}
