use crate::project::{ProjectIo, ProjectRecords};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub fn output_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .context("project file has no stem")?;
    let parent = input.parent().context("project file has no parent")?;
    Ok(parent.join(format!("{stem}{suffix}.pmm")))
}

// The output starts as a byte-for-byte copy of the input; the helper then
// rewrites only the recorded path fields in place.
pub fn write_output(
    io: &dyn ProjectIo,
    input: &Path,
    suffix: &str,
    records: &ProjectRecords,
) -> Result<PathBuf> {
    let output = output_path(input, suffix)?;
    fs::copy(input, &output)
        .with_context(|| format!("copy {} to {}", input.display(), output.display()))?;
    io.apply(&output, records)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{ModelRecord, ProjectError};
    use std::cell::RefCell;

    struct RecordingIo {
        applied: RefCell<Vec<(PathBuf, usize)>>,
    }

    impl ProjectIo for RecordingIo {
        fn extract(&self, _: &Path) -> Result<ProjectRecords, ProjectError> {
            Ok(ProjectRecords::default())
        }

        fn apply(&self, path: &Path, records: &ProjectRecords) -> Result<(), ProjectError> {
            self.applied
                .borrow_mut()
                .push((path.to_path_buf(), records.models.len()));
            Ok(())
        }
    }

    #[test]
    fn output_named_beside_input_with_suffix() {
        let out = output_path(Path::new("/proj/dance.pmm"), "_out").unwrap();
        assert_eq!(out, Path::new("/proj/dance_out.pmm"));
        let out = output_path(Path::new("/proj/dance.pmm"), "_migrated").unwrap();
        assert_eq!(out, Path::new("/proj/dance_migrated.pmm"));
    }

    #[test]
    fn write_copies_bytes_then_applies() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("dance.pmm");
        fs::write(&input, b"binary project bytes").unwrap();

        let io = RecordingIo {
            applied: RefCell::new(Vec::new()),
        };
        let records = ProjectRecords {
            models: vec![ModelRecord::default(); 2],
            accessories: Vec::new(),
            media: None,
        };
        let output = write_output(&io, &input, "_out", &records).unwrap();

        assert_eq!(output, dir.path().join("dance_out.pmm"));
        assert_eq!(fs::read(&output).unwrap(), b"binary project bytes");
        let applied = io.applied.borrow();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0], (output.clone(), 2));
    }
}
