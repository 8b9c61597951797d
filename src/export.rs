use anyhow::{Context, Result};
use std::{fs::File, io::Write, path::Path};

use crate::backend::Backend;
use crate::backend::sqlitebe::SqliteBackend;
use crate::seed::Seed;

pub fn run(db: &Path, output: &Path) -> Result<()> {
    let conn = rusqlite::Connection::open(db)
        .with_context(|| format!("could not open database at {:?}", db))?;

    let seed = dump(&SqliteBackend::new(&conn))?;
    let toml_string =
        toml::to_string_pretty(&seed).context("could not serialize reference data to TOML")?;

    let mut file =
        File::create(output).with_context(|| format!("could not create {:?}", output))?;
    file.write_all(toml_string.as_bytes())
        .with_context(|| format!("could not write to {:?}", output))?;

    println!(
        "Successfully exported data to `{}`",
        output.to_string_lossy()
    );

    Ok(())
}

pub fn dump<B: Backend>(backend: &B) -> Result<Seed> {
    let mut job_history = backend.job_history().context("could not read job history")?;
    job_history.sort_by(|a, b| {
        (&a.empno, a.effdate, &a.jobcode).cmp(&(&b.empno, b.effdate, &b.jobcode))
    });

    Ok(Seed {
        departments: backend.departments().context("could not read departments")?,
        jobs: backend.jobs().context("could not read jobs")?,
        employees: backend.employees().context("could not read employees")?,
        job_history,
    })
}
