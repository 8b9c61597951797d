use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use garde::Validate;
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Department, Employee, Job, JobHistory};

/// Reference data as kept in a TOML file: one array of tables per
/// collection.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Validate)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    #[garde(dive)]
    #[serde(default, rename = "department", skip_serializing_if = "Vec::is_empty")]
    pub departments: Vec<Department>,
    #[garde(dive)]
    #[serde(default, rename = "job", skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<Job>,
    #[garde(dive)]
    #[serde(default, rename = "employee", skip_serializing_if = "Vec::is_empty")]
    pub employees: Vec<Employee>,
    #[garde(dive)]
    #[serde(default, rename = "jobhistory", skip_serializing_if = "Vec::is_empty")]
    pub job_history: Vec<JobHistory>,
}

#[derive(Debug, Error)]
#[error("Invalid reference data in '{file}'")]
pub struct SeedValidationError {
    pub file: String,
    pub src: NamedSource<String>,
    pub labels: Vec<LabeledSpan>,
    #[source]
    pub source: garde::Report,
}

impl Diagnostic for SeedValidationError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("hrdesk::validation::seed"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("The following validation errors occurred:"))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(self.labels.iter().cloned()))
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum SeedError {
    #[error("could not read {1:?}: {0}")]
    #[diagnostic(code(hrdesk::io))]
    Io(#[source] std::io::Error, PathBuf),

    #[error("Error deserializing TOML: {0}")]
    #[diagnostic(code(hrdesk::toml))]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] SeedValidationError),
}

impl Seed {
    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let content = fs::read_to_string(path).map_err(|e| SeedError::Io(e, path.to_path_buf()))?;
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(&file, content)
    }

    pub fn parse(file: &str, content: String) -> Result<Self, SeedError> {
        let seed: Seed = toml::from_str(&content)?;
        if let Err(e) = seed.validate() {
            let labels = to_labels(&content, &e);
            return Err(SeedValidationError {
                file: file.to_string(),
                src: NamedSource::new(file, content),
                labels,
                source: e,
            }
            .into());
        }
        Ok(seed)
    }
}

fn to_labels(content: &str, report: &garde::Report) -> Vec<LabeledSpan> {
    report
        .iter()
        .map(|(path, error)| {
            let span = find_span(content, &path.to_string()).unwrap_or(SourceSpan::new(0.into(), 0));
            LabeledSpan::new_with_span(Some(error.to_string()), span)
        })
        .collect()
}

/// Points at the value of the last key named in a garde path such as
/// `employees[2].gender`, counting array entries to find the right table.
fn find_span(content: &str, path: &str) -> Option<SourceSpan> {
    let mut parts = path
        .split(['.', '[', ']'])
        .filter(|s| !s.is_empty());
    let table = parts.next().and_then(table_header);
    let index: usize = parts.next().and_then(|i| i.parse().ok()).unwrap_or(0);
    let key = parts.last()?;

    let start = match table {
        Some(header) => content.match_indices(header).nth(index)?.0,
        None => 0,
    };
    let section = &content[start..];
    let pos = start
        + section
            .lines()
            .scan(0, |offset, line| {
                let at = *offset;
                *offset += line.len() + 1;
                Some((at, line))
            })
            .find(|(_, line)| {
                line.trim_start()
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.trim_start().starts_with('='))
            })?
            .0;

    let line = content[pos..].lines().next().unwrap_or_default();
    let value_at = line.find('=').map(|eq| eq + 1).unwrap_or(0);
    let value = &line[value_at..];
    let leading = value.len() - value.trim_start().len();
    Some(SourceSpan::new(
        (pos + value_at + leading).into(),
        value.trim().len(),
    ))
}

fn table_header(field: &str) -> Option<&'static str> {
    match field {
        "departments" => Some("[[department]]"),
        "jobs" => Some("[[job]]"),
        "employees" => Some("[[employee]]"),
        "job_history" => Some("[[jobhistory]]"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEED: &str = r#"
[[department]]
deptcode = "D1"
deptname = "Finance"

[[job]]
jobcode = "J1"
jobdesc = "Analyst"

[[employee]]
empno = "EMP001"
firstname = "Ann"
lastname = "Lee"
gender = "F"

[[employee]]
empno = "EMP002"
firstname = "Raj"
lastname = "Das"
gender = "MX"

[[jobhistory]]
empno = "EMP001"
jobcode = "J1"
deptcode = "D1"
effdate = "2024-01-01"
salary = 5000.0
"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.replace("\"MX\"", "\"M\"").as_bytes())
            .unwrap();

        let seed = Seed::load(file.path()).unwrap();

        assert_eq!(seed.departments.len(), 1);
        assert_eq!(seed.employees[1].gender.as_deref(), Some("M"));
        assert_eq!(seed.job_history[0].salary, Some(5000.0));
    }

    #[test]
    fn test_validation_labels_point_at_the_value() {
        let err = match Seed::parse("seed.toml", SEED.to_string()) {
            Err(SeedError::Validation(err)) => err,
            other => panic!("expected a validation error, got {:?}", other),
        };
        assert_eq!(err.labels.len(), 1);
        let span = err.labels[0].inner();
        assert_eq!(&SEED[span.offset()..span.offset() + span.len()], "\"MX\"");
    }

    #[test]
    fn test_unknown_collection_is_rejected() {
        let result = Seed::parse("seed.toml", "[[payroll]]\nid = 1\n".to_string());
        assert!(matches!(result, Err(SeedError::Toml(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Seed::load(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(SeedError::Io(..))));
    }
}
