//! Export coefficients to CSV.
//!
//! One row per coefficient: `index,C` followed by one column per committee
//! member when a committee is present.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::SolveResult;
use crate::error::AppError;

/// Write coefficients (and committee, if any) to a CSV file.
pub fn write_coefficients_csv(path: &Path, result: &SolveResult) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_coefficients(&mut file, result)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))
}

fn write_coefficients<W: Write>(out: &mut W, result: &SolveResult) -> std::io::Result<()> {
    let committee = result.committee.as_deref().unwrap_or(&[]);

    write!(out, "index,C")?;
    for k in 0..committee.len() {
        write!(out, ",committee_{k}")?;
    }
    writeln!(out)?;

    for (i, c) in result.coefficients.iter().enumerate() {
        write!(out, "{i},{c:.17e}")?;
        for member in committee {
            write!(out, ",{:.17e}", member[i])?;
        }
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;

    #[test]
    fn csv_has_one_column_per_committee_member() {
        let result = SolveResult::new(DVector::from_row_slice(&[1.0, 2.0]))
            .with_committee(vec![DVector::from_row_slice(&[1.1, 2.1]), DVector::from_row_slice(&[0.9, 1.9])]);
        let mut buf = Vec::new();
        write_coefficients(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,C,committee_0,committee_1");
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].split(',').count(), 4);
    }
}
