//! Write result JSON files.

use std::fs::File;
use std::path::Path;

use crate::domain::ResultFile;
use crate::error::AppError;

pub fn write_result_json(path: &Path, result: &ResultFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create result JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, result)
        .map_err(|e| AppError::new(2, format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_json_survives_disk() {
        let path = std::env::temp_dir().join(format!("lsq-{}-result.json", std::process::id()));
        let result = ResultFile {
            solver: "qr".to_string(),
            coefficients: vec![1.0, 2.0],
            committee: None,
            residual_norm: 0.0,
            relative_rmse: 0.0,
        };
        write_result_json(&path, &result).unwrap();
        let file = File::open(&path).unwrap();
        let back: ResultFile = serde_json::from_reader(file).unwrap();
        assert_eq!(back, result);
        std::fs::remove_file(path).ok();
    }
}
