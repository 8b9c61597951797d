use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use static_toml::static_toml;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::auth::{AuthContext, SignUpForm};
use crate::backend::sqlitebe::SqliteBackend;
use crate::context::{EmployeeRow, HistoryRow};
use crate::directory::Directory;
use crate::directory::filter::FilterState;
use crate::model::{Role, TableSelector};

mod attendance;
mod auth;
mod backend;
mod context;
mod directory;
mod employee;
mod export;
mod gate;
mod import;
mod leave;
mod model;
mod seed;
mod serve;

static_toml! {
    pub static CONFIG = include_toml!("config.toml");
}

#[derive(Parser)]
#[command(version = env!("HRDESK_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty database
    Init { output: PathBuf },

    /// Create a database from a TOML file of reference data
    Import { source: PathBuf, output: PathBuf },

    /// Write the reference data of a database to TOML
    Export { db: PathBuf, output: PathBuf },

    Serve {
        db: PathBuf,

        #[arg(short = 'p', long)]
        port: Option<String>,
    },

    /// Print the joined employee directory
    Directory {
        db: PathBuf,

        #[arg(short = 'q', long)]
        query: Option<String>,

        #[arg(long)]
        department: Option<String>,

        #[arg(long)]
        job: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long, default_value = "all")]
        table: TableSelector,
    },

    /// Add a user account
    Useradd {
        db: PathBuf,
        email: String,

        #[arg(long, default_value = "employee")]
        role: Role,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(long, env = "HRDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hrdesk=info,tower_http=info")),
        )
        .init();

    let args = Cli::parse();

    match args.command {
        Commands::Init { output } => {
            import::init(output.as_path()).with_context(|| "could not run `init`")
        }

        Commands::Import { source, output } => import::run(source.as_path(), output.as_path())
            .with_context(|| "could not run `import`"),

        Commands::Export { db, output } => {
            export::run(db.as_path(), output.as_path()).with_context(|| "could not run `export`")
        }

        Commands::Serve { db, port } => serve::run(db, port.as_deref())
            .await
            .with_context(|| "failed to run `serve`"),

        Commands::Directory {
            db,
            query,
            department,
            job,
            gender,
            table,
        } => {
            let filter = FilterState {
                search_query: query.unwrap_or_default(),
                department: department.unwrap_or_default(),
                job: job.unwrap_or_default(),
                gender: gender.unwrap_or_default(),
                table,
            };
            print_directory(&db, &filter).with_context(|| "could not run `directory`")
        }

        Commands::Useradd {
            db,
            email,
            role,
            first_name,
            last_name,
            password,
        } => {
            let form = SignUpForm {
                first_name,
                last_name,
                email,
                password,
                role,
            };
            useradd(&db, &form).with_context(|| "could not run `useradd`")
        }
    }
}

fn open(db: &Path) -> Result<rusqlite::Connection> {
    anyhow::ensure!(db.exists(), "no database at {:?}", db);
    rusqlite::Connection::open(db).with_context(|| format!("could not open database at {:?}", db))
}

fn print_directory(db: &Path, filter: &FilterState) -> Result<()> {
    let conn = open(db)?;
    let directory = Directory::load(&SqliteBackend::new(&conn))?;
    let filtered = directory.filter(filter);

    if filtered.no_results() {
        println!("No results found for \"{}\"", filter.search_query.trim());
        return Ok(());
    }

    let summary = directory.summary();
    println!(
        "{} employees, {} departments, {} jobs, {} job history records",
        summary.employees, summary.departments, summary.jobs, summary.job_history
    );

    if filter.table.shows(TableSelector::Employees) {
        println!("\nEmployees:");
        for e in filtered.employees.iter().map(|e| EmployeeRow::from(*e)) {
            println!(
                "  {:<10} {:<24} {:<2} {:<20} {:<20} {:>10}",
                e.empno, e.name, e.gender, e.job, e.department, e.salary
            );
        }
    }

    if filter.table.shows(TableSelector::Departments) {
        println!("\nDepartments:");
        for d in &filtered.departments {
            println!(
                "  {:<10} {:<24} {:>4}",
                d.deptcode,
                d.deptname.as_deref().unwrap_or(CONFIG.labels.missing),
                directory.headcounts().department(d)
            );
        }
    }

    if filter.table.shows(TableSelector::Jobs) {
        println!("\nJobs:");
        for j in &filtered.jobs {
            println!(
                "  {:<10} {:<24} {:>4}",
                j.jobcode,
                j.jobdesc.as_deref().unwrap_or(CONFIG.labels.missing),
                directory.headcounts().job(j)
            );
        }
    }

    if filter.table.shows(TableSelector::JobHistory) {
        println!("\nJob history:");
        for h in filtered.job_history.iter().map(|h| HistoryRow::from(*h)) {
            println!(
                "  {:<10} {:<24} {:<20} {:<20} {} {:>10}",
                h.empno, h.employee, h.job, h.department, h.effdate, h.salary
            );
        }
    }

    Ok(())
}

fn useradd(db: &Path, form: &SignUpForm) -> Result<()> {
    let conn = open(db)?;
    let user = AuthContext::new().sign_up(&SqliteBackend::new(&conn), form, Utc::now())?;

    println!("Created {} ({}) with id {}", user.email, user.role(), user.id);
    Ok(())
}
