use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use env_logger::{Builder, Env};
use log::{error, info};

use ufvm_rs::config::DiscretizationConfig;
use ufvm_rs::discretization::mesh_io::write_mesh_file;
use ufvm_rs::models::{Cavity, Pipe};
use ufvm_rs::numerics::least_squares::reconstruct_gradients;
use ufvm_rs::numerics::pipeline::prepare_case;
use ufvm_rs::physics::CaseSetup;
use ufvm_rs::processing::checkpoint::{DEFAULT_PREFIX, save_checkpoint};
use ufvm_rs::processing::csv_writer;
use ufvm_rs::processing::summary::SetupSummary;

const OUTPUT_DIR: &str = "output";

fn init_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = buf.timestamp_seconds().to_string();
            // RFC 3339, keep the time of day only
            let hms = ts.get(11..19).unwrap_or(&ts);
            writeln!(buf, "[{} {:<5}] {}", hms, record.level(), record.args())
        })
        .init();
}

fn main() -> ExitCode {
    init_logging();

    let config = match env::args().nth(1) {
        Some(path) => match DiscretizationConfig::from_file(&path) {
            Ok(config) => {
                info!("configuration loaded from {}", path);
                config
            }
            Err(e) => {
                error!("cannot load configuration {}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => DiscretizationConfig::default(),
    };

    let cases: Vec<Box<dyn CaseSetup>> = vec![
        Box::new(Cavity::new([8, 8, 8])),
        Box::new(Pipe::new(4.0, [16, 4, 4])),
    ];

    for case in &cases {
        if let Err(e) = run_case(case.as_ref(), &config) {
            error!("case {} failed: {}", case.name(), e);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}

fn run_case(case: &dyn CaseSetup, config: &DiscretizationConfig) -> ufvm_rs::Result<()> {
    let dir = Path::new(OUTPUT_DIR).join(case.name());
    fs::create_dir_all(&dir)?;

    let (mut mesh, report) = prepare_case(case, config)?;
    report.timing.print_summary();

    for field in &report.fields {
        reconstruct_gradients(&mut mesh, field, config)?;
        csv_writer::write_nodal_field(dir.join(format!("nodes_{field}.csv")), &mesh, field.as_str())?;
        csv_writer::write_cell_field(dir.join(format!("cells_{field}.csv")), &mesh, field.as_str())?;
    }

    write_mesh_file(&mesh, dir.join("mesh.txt"))?;
    let checkpoint = save_checkpoint(&mesh, &dir, DEFAULT_PREFIX, 0, 0.0)?;
    info!("initial state saved to {}", checkpoint.display());

    let mut summary = SetupSummary::from_setup(case.name(), &mesh, config, &report);
    summary.add_gradient_info(&mesh);
    summary.write_to_file(dir.join("setup_summary.txt"))?;
    summary.print_to_console();

    println!("Summary saved to {}", dir.join("setup_summary.txt").display());
    Ok(())
}
