use anyhow::{Context, Result, ensure};
use std::path::Path;
use tracing::info;

use crate::backend::Backend;
use crate::backend::sqlitebe::SqliteBackend;
use crate::seed::Seed;

pub fn init(output: &Path) -> Result<()> {
    ensure!(!output.exists(), "output DB already exists at {:?}", output);

    let conn = rusqlite::Connection::open(output)
        .with_context(|| format!("could not create sqlite DB at {:?}", output))?;
    SqliteBackend::new(&conn)
        .create_tables()
        .context("could not create schema")?;

    info!(db = ?output, "initialised database");
    Ok(())
}

pub fn run(source: &Path, output: &Path) -> Result<()> {
    ensure!(!output.exists(), "output DB already exists at {:?}", output);

    let seed = Seed::load(source).map_err(|e| anyhow::anyhow!("{:?}", miette::Report::new(e)))?;

    let mut conn = rusqlite::Connection::open(output)
        .with_context(|| format!("could not create sqlite DB at {:?}", output))?;
    SqliteBackend::new(&conn)
        .create_tables()
        .context("could not create schema")?;

    let tx = conn.transaction()?;
    load_seed(&SqliteBackend::new(&tx), &seed)?;
    tx.commit()?;

    info!(
        departments = seed.departments.len(),
        jobs = seed.jobs.len(),
        employees = seed.employees.len(),
        job_history = seed.job_history.len(),
        "imported reference data"
    );
    println!(
        "Successfully imported data into `{}`",
        output.to_string_lossy()
    );

    Ok(())
}

/// Inserts every collection in the order the dashboards read them.
pub fn load_seed<B: Backend>(backend: &B, seed: &Seed) -> Result<()> {
    for department in &seed.departments {
        backend
            .insert_department(department)
            .with_context(|| format!("could not insert department {}", department.deptcode))?;
    }
    for job in &seed.jobs {
        backend
            .insert_job(job)
            .with_context(|| format!("could not insert job {}", job.jobcode))?;
    }
    for employee in &seed.employees {
        backend
            .insert_employee(employee)
            .with_context(|| format!("could not insert employee {}", employee.empno))?;
    }
    for history in &seed.job_history {
        backend.insert_job_history(history).with_context(|| {
            format!(
                "could not insert job history {}/{}/{}",
                history.empno, history.jobcode, history.effdate
            )
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Directory;
    use std::fs;

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

[[jobhistory]]
empno = "EMP001"
jobcode = "J1"
deptcode = "D1"
effdate = "2024-01-01"
salary = 5000.0
"#;

    #[test]
    fn test_import_then_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("seed.toml");
        let db = dir.path().join("hr.db");
        fs::write(&source, SEED).unwrap();

        run(&source, &db).unwrap();

        let conn = rusqlite::Connection::open(&db).unwrap();
        let directory = Directory::load(&SqliteBackend::new(&conn)).unwrap();
        assert_eq!(directory.employees[0].job, "Analyst");
        assert_eq!(directory.employees[0].department, "Finance");
    }

    #[test]
    fn test_existing_output_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("hr.db");
        init(&db).unwrap();

        assert!(init(&db).is_err());
    }
}
