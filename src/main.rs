use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lecture_noshow_tracker::analysis::{self, Analysis};
use lecture_noshow_tracker::config::AppConfig;
use lecture_noshow_tracker::export::{self, ExportOutcome, Format, Table};
use lecture_noshow_tracker::filter::RosterFilter;
use lecture_noshow_tracker::loader;
use lecture_noshow_tracker::models::{AttendanceRecord, Dimension};
use lecture_noshow_tracker::registry::{
    self, LectureWhen, Mark, NewLecture, NewStudent, Registry, RegistrationQuery, SearchField,
};
use lecture_noshow_tracker::report;
use lecture_noshow_tracker::store::{JsonFileStore, ResetScope, Store};

#[derive(Parser)]
#[command(name = "noshow-tracker")]
#[command(about = "Lecture registration and no-show tracker", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// JSON store location (overrides NOSHOW_DATA_FILE)
    #[arg(long, global = true)]
    data_file: Option<PathBuf>,
    /// Export and backup directory (overrides NOSHOW_EXPORT_DIR)
    #[arg(long, global = true)]
    export_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long = "department")]
    departments: Vec<String>,
    #[arg(long = "major")]
    majors: Vec<String>,
    #[arg(long = "grade")]
    grades: Vec<String>,
    #[arg(long = "lecture")]
    lectures: Vec<String>,
}

impl FilterArgs {
    fn into_filter(self) -> RosterFilter {
        RosterFilter::new(self.departments, self.majors, self.grades, self.lectures)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List CSV rosters available in a directory
    Files {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Summarize no-shows for a CSV roster, or the store when no CSV is given
    Analyze {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write a markdown no-show report
    Report {
        #[arg(long)]
        csv: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Manage students
    #[command(subcommand)]
    Student(StudentCommand),
    /// Manage lectures
    #[command(subcommand)]
    Lecture(LectureCommand),
    /// Browse registrations
    #[command(subcommand)]
    Registration(RegistrationCommand),
    /// Register a student for a lecture
    Register {
        #[arg(long)]
        student: String,
        #[arg(long)]
        lecture: Uuid,
    },
    /// Cancel a registration
    Cancel {
        #[arg(long)]
        student: String,
        #[arg(long)]
        lecture: Uuid,
    },
    /// Mark attendance for a registration of today's lecture
    CheckIn {
        #[arg(long)]
        student: String,
        #[arg(long)]
        lecture: Uuid,
        #[arg(long, value_enum)]
        mark: Mark,
    },
    /// List no-show registrations and per-student counts from the store
    Noshows,
    /// Show store-wide counts, recent registrations and upcoming lectures
    Dashboard,
    /// Export a derived table or a store collection
    Export {
        #[arg(value_enum)]
        target: ExportTarget,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
        #[arg(long)]
        csv: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Write a JSON backup of the whole store
    Backup,
    /// Replace the store with a JSON backup
    Restore {
        #[arg(long)]
        file: PathBuf,
    },
    /// Clear part or all of the store
    Reset {
        #[arg(value_enum)]
        scope: ResetScope,
        /// Confirm the irreversible reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StudentCommand {
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        grade: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
    },
    List,
    #[command(group(
        ArgGroup::new("field")
            .args(["id", "name", "department"])
            .multiple(false)
    ))]
    Search {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        department: Option<String>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum LectureCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "00:00")]
        time: String,
        #[arg(long)]
        location: String,
        #[arg(long, default_value_t = 30)]
        capacity: u32,
        #[arg(long)]
        instructor: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List {
        #[arg(long, value_enum, default_value_t = LectureWhen::All)]
        when: LectureWhen,
    },
    /// Lectures held today, open for check-in
    Today,
    Delete {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum RegistrationCommand {
    List {
        /// Student id substring
        #[arg(long)]
        student: Option<String>,
        /// Exact lecture name
        #[arg(long)]
        lecture: Option<String>,
        #[arg(long, conflicts_with = "attended")]
        noshow: bool,
        #[arg(long)]
        attended: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportTarget {
    LectureStats,
    DepartmentStats,
    MajorStats,
    GradeStats,
    LectureStatus,
    NoShowStudents,
    StudentNoShows,
    Students,
    Lectures,
    Registrations,
}

impl ExportTarget {
    fn stem(&self) -> &'static str {
        match self {
            ExportTarget::LectureStats => "lecture_stats",
            ExportTarget::DepartmentStats => "department_stats",
            ExportTarget::MajorStats => "major_stats",
            ExportTarget::GradeStats => "grade_stats",
            ExportTarget::LectureStatus => "lecture_status",
            ExportTarget::NoShowStudents => "no_show_students",
            ExportTarget::StudentNoShows => "student_no_shows",
            ExportTarget::Students => "students",
            ExportTarget::Lectures => "lectures",
            ExportTarget::Registrations => "registrations",
        }
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.verbose >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env(cli.verbose)
        .with_data_file(cli.data_file)
        .with_export_dir(cli.export_dir);
    init_logging(&config);
    debug!(?config, "Configuration resolved");

    let registry = Registry::new(JsonFileStore::new(&config.data_file));
    let now = Local::now().naive_local();
    let today = now.date();

    match cli.command {
        Commands::Files { dir } => {
            for path in loader::list_csv_files(&dir)? {
                println!("{}", path.display());
            }
        }
        Commands::Analyze { csv, filter } => {
            let (source, roster) = scoped_roster(csv.as_deref(), &registry, filter.into_filter())?;
            print_analysis(&source, &analysis::analyze(&roster));
        }
        Commands::Report { csv, filter, out } => {
            let filter = filter.into_filter();
            let scope = describe_filter(&filter);
            let (source, roster) = scoped_roster(csv.as_deref(), &registry, filter)?;
            let report =
                report::build_report(&source, scope.as_deref(), &analysis::analyze(&roster));
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Student(command) => run_student(command, &registry, now)?,
        Commands::Lecture(command) => run_lecture(command, &registry, now)?,
        Commands::Registration(RegistrationCommand::List {
            student,
            lecture,
            noshow,
            attended,
        }) => {
            let query = RegistrationQuery {
                student_contains: student,
                lecture_name: lecture,
                noshow: match (noshow, attended) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };
            let registrations = registry.list_registrations(&query)?;
            if registrations.is_empty() {
                println!("No matching registrations.");
            }
            for registration in &registrations {
                println!(
                    "- {} {} ({}) '{}' on {} [{}]",
                    registration.registration_date,
                    registration.student_name,
                    registration.student_id,
                    registration.lecture_name,
                    registration.lecture_date,
                    registration.status()
                );
            }
        }
        Commands::Register { student, lecture } => {
            let registration = registry.register(&student, lecture, now)?;
            println!(
                "{} registered for '{}' ({}).",
                registration.student_name, registration.lecture_name, registration.lecture_date
            );
        }
        Commands::Cancel { student, lecture } => {
            let removed = registry.cancel(&student, lecture)?;
            println!("Registration for '{}' cancelled.", removed.lecture_name);
        }
        Commands::CheckIn {
            student,
            lecture,
            mark,
        } => {
            let registration = registry.check_in(&student, lecture, mark, today)?;
            let label = match mark {
                Mark::Attended => "출석",
                Mark::NoShow => "노쇼",
            };
            println!(
                "{} ({}) marked {} for '{}'.",
                registration.student_name, registration.student_id, label, registration.lecture_name
            );
        }
        Commands::Noshows => {
            let noshows = registry.no_show_registrations()?;
            if noshows.is_empty() {
                println!("No no-show records.");
                return Ok(());
            }
            for registration in &noshows {
                println!(
                    "- {} ({}) {} on {}",
                    registration.student_name,
                    registration.student_id,
                    registration.lecture_name,
                    registration.lecture_date
                );
            }
            let roster = registry::roster(&registry.snapshot()?);
            println!("No-show counts by student:");
            for student in analysis::student_no_show_counts(&roster) {
                println!(
                    "- {} ({}, {}) {} no-shows",
                    student.name, student.student_id, student.department, student.no_show_count
                );
            }
        }
        Commands::Dashboard => {
            let dashboard = registry.dashboard(today)?;
            println!("Students: {}", dashboard.student_count);
            println!("Lectures: {}", dashboard.lecture_count);
            println!("Registrations: {}", dashboard.registration_count);
            println!(
                "No-shows: {} ({:.1}%)",
                dashboard.noshow_count, dashboard.noshow_rate
            );
            println!("Recent registrations:");
            for registration in &dashboard.recent_registrations {
                println!(
                    "- {} {} -> {}",
                    registration.registration_date, registration.student_name, registration.lecture_name
                );
            }
            println!("Upcoming lectures:");
            for overview in &dashboard.upcoming_lectures {
                println!(
                    "- {} ({} registered)",
                    overview.lecture.label(),
                    overview.registration_count
                );
            }
        }
        Commands::Export {
            target,
            format,
            csv,
            filter,
        } => {
            let table = export_table(target, csv.as_deref(), &registry, filter.into_filter())?;
            match export::write_table(&table, format, &config.export_dir, target.stem())? {
                ExportOutcome::Written { path, rows } => {
                    println!("Exported {rows} rows to {}.", path.display())
                }
                ExportOutcome::Empty => println!("Nothing to export."),
            }
        }
        Commands::Backup => {
            let data = registry.snapshot()?;
            let path = export::write_backup(&data, &config.export_dir, now)?;
            println!("Backup written to {}.", path.display());
        }
        Commands::Restore { file } => {
            let data = export::read_backup(&file)
                .with_context(|| format!("failed to read backup {}", file.display()))?;
            registry.store().save_all(&data)?;
            info!(
                students = data.students.len(),
                lectures = data.lectures.len(),
                registrations = data.registrations.len(),
                "Store restored"
            );
            println!("Store restored from {}.", file.display());
        }
        Commands::Reset { scope, yes } => {
            if !yes {
                anyhow::bail!("reset is irreversible; pass --yes to confirm");
            }
            registry.store().reset(scope)?;
            println!("Reset complete.");
        }
    }

    Ok(())
}

fn run_student(
    command: StudentCommand,
    registry: &Registry<JsonFileStore>,
    now: chrono::NaiveDateTime,
) -> anyhow::Result<()> {
    match command {
        StudentCommand::Add {
            id,
            name,
            department,
            major,
            grade,
            email,
            phone,
        } => {
            let student = registry.add_student(
                NewStudent {
                    student_id: id,
                    name,
                    department,
                    major,
                    grade,
                    email,
                    phone,
                },
                now,
            )?;
            println!("Student {} ({}) registered.", student.name, student.student_id);
        }
        StudentCommand::List => {
            let students = registry.snapshot()?.students;
            if students.is_empty() {
                println!("No students registered.");
            }
            for student in students {
                println!(
                    "- {} {} ({} {} {}학년) no-shows {}",
                    student.student_id,
                    student.name,
                    student.department,
                    student.major,
                    student.grade,
                    student.noshow_count
                );
            }
        }
        StudentCommand::Search {
            id,
            name,
            department,
        } => {
            let (field, text) = match (id, name, department) {
                (Some(text), _, _) => (SearchField::Id, text),
                (_, Some(text), _) => (SearchField::Name, text),
                (_, _, Some(text)) => (SearchField::Department, text),
                _ => anyhow::bail!("provide one of --id, --name or --department"),
            };
            let found = registry.search_students(field, &text)?;
            if found.is_empty() {
                println!("No matching students.");
            }
            for student in found {
                println!("- {} {} ({})", student.student_id, student.name, student.department);
            }
        }
        StudentCommand::Delete { id } => {
            let removed = registry.delete_student(&id)?;
            println!("Student {id} deleted with {removed} registrations.");
        }
    }
    Ok(())
}

fn run_lecture(
    command: LectureCommand,
    registry: &Registry<JsonFileStore>,
    now: chrono::NaiveDateTime,
) -> anyhow::Result<()> {
    match command {
        LectureCommand::Add {
            name,
            date,
            time,
            location,
            capacity,
            instructor,
            description,
        } => {
            let lecture = registry.add_lecture(
                NewLecture {
                    lecture_name: name,
                    lecture_date: date,
                    lecture_time: time,
                    location,
                    capacity,
                    instructor,
                    description,
                },
                now,
            )?;
            println!("Lecture {} created with id {}.", lecture.label(), lecture.lecture_id);
        }
        LectureCommand::List { when } => {
            let lectures = registry.list_lectures(when, now.date())?;
            if lectures.is_empty() {
                println!("No lectures found.");
            }
            for overview in lectures {
                println!(
                    "- {} {} at {} [{}] registered {} / no-shows {}",
                    overview.lecture.lecture_id,
                    overview.lecture.label(),
                    overview.lecture.location,
                    overview.lecture.instructor,
                    overview.registration_count,
                    overview.noshow_count
                );
            }
        }
        LectureCommand::Today => {
            let lectures = registry.todays_lectures(now.date())?;
            if lectures.is_empty() {
                println!("No lectures today.");
            }
            for lecture in lectures {
                println!(
                    "- {} {} {} at {}",
                    lecture.lecture_id, lecture.lecture_name, lecture.lecture_time, lecture.location
                );
            }
        }
        LectureCommand::Delete { id } => {
            let removed = registry.delete_lecture(id)?;
            println!("Lecture {id} deleted with {removed} registrations.");
        }
    }
    Ok(())
}

fn scoped_roster(
    csv: Option<&Path>,
    registry: &Registry<JsonFileStore>,
    filter: RosterFilter,
) -> anyhow::Result<(String, Vec<AttendanceRecord>)> {
    let (source, roster) = match csv {
        Some(path) => {
            let roster = loader::load_roster(path)
                .with_context(|| format!("failed to load roster {}", path.display()))?;
            (path.display().to_string(), roster)
        }
        None => {
            let source = registry.store().path().display().to_string();
            (source, registry::roster(&registry.snapshot()?))
        }
    };
    let scoped = filter.apply(&roster);
    debug!(total = roster.len(), scoped = scoped.len(), "Roster filtered");
    Ok((source, scoped))
}

fn describe_filter(filter: &RosterFilter) -> Option<String> {
    if filter.is_empty() {
        return None;
    }
    let parts: Vec<String> = [
        ("학과", &filter.departments),
        ("전공", &filter.majors),
        ("학년", &filter.grades),
        ("특강", &filter.lectures),
    ]
    .iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(label, values)| {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        format!("{label}: {}", values.join("/"))
    })
    .collect();
    Some(parts.join(", "))
}

fn export_table(
    target: ExportTarget,
    csv: Option<&Path>,
    registry: &Registry<JsonFileStore>,
    filter: RosterFilter,
) -> anyhow::Result<Table> {
    let derived = |dimension: Dimension| -> anyhow::Result<Table> {
        let (_, roster) = scoped_roster(csv, registry, filter.clone())?;
        Ok(export::dimension_table(
            dimension,
            &analysis::rate_by_dimension(&roster, dimension),
        ))
    };

    let table = match target {
        ExportTarget::LectureStats => derived(Dimension::Lecture)?,
        ExportTarget::DepartmentStats => derived(Dimension::Department)?,
        ExportTarget::MajorStats => derived(Dimension::Major)?,
        ExportTarget::GradeStats => derived(Dimension::Grade)?,
        ExportTarget::LectureStatus => {
            let (_, roster) = scoped_roster(csv, registry, filter.clone())?;
            export::lecture_status_table(&analysis::lecture_status_distribution(&roster))
        }
        ExportTarget::NoShowStudents => {
            let (_, roster) = scoped_roster(csv, registry, filter.clone())?;
            export::records_table(&analysis::no_show_students(&roster))
        }
        ExportTarget::StudentNoShows => {
            let (_, roster) = scoped_roster(csv, registry, filter.clone())?;
            export::student_no_show_table(&analysis::student_no_show_counts(&roster))
        }
        ExportTarget::Students => export::students_table(&registry.snapshot()?.students),
        ExportTarget::Lectures => export::lectures_table(&registry.snapshot()?.lectures),
        ExportTarget::Registrations => {
            export::registrations_table(&registry.snapshot()?.registrations)
        }
    };
    Ok(table)
}

fn print_analysis(source: &str, analysis: &Analysis) {
    let summary = &analysis.summary;
    println!("Roster: {source}");
    println!(
        "{} records, {} students, {} lectures, {} no-shows ({:.2}%)",
        summary.total_records,
        summary.unique_students,
        summary.unique_lectures,
        summary.no_show_count,
        summary.no_show_rate
    );

    if summary.total_records == 0 {
        println!("No records in this scope.");
        return;
    }

    println!(
        "Marked present {}, absent {}, unmarked {}",
        analysis.marks.present_like, analysis.marks.no_show_like, analysis.marks.unmarked
    );

    println!("Status counts:");
    for (status, count) in &analysis.status_counts {
        println!("- {}: {count}", status);
    }

    for (dimension, rates) in &analysis.rates {
        println!("No-show rate by {}:", dimension.slug());
        for rate in rates {
            println!(
                "- {}: {}/{} ({:.2}%)",
                rate.value, rate.no_show_count, rate.total, rate.no_show_rate
            );
        }
    }

    let tiers = [
        (report::RiskTier::Multiple, &analysis.buckets.multiple),
        (report::RiskTier::Twice, &analysis.buckets.twice),
        (report::RiskTier::Once, &analysis.buckets.once),
    ];
    for (tier, students) in tiers {
        println!("{}: {} students", tier.title(), students.len());
        for student in students {
            println!(
                "  - {} ({}, {}) {}회",
                student.name, student.student_id, student.department, student.no_show_count
            );
        }
    }
}
