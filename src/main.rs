//! Main CLI application for the Sokoban SAT planner

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sokoban_sat_planner::{
    config::{CliOverrides, OutputFormat, Settings},
    game::{create_example_levels, load_level_from_file, GoalCondition, ObjectKind},
    plan::{PlanOutcome, PlanSolution, PlanValidator, PlanningProblem, ValidationReport},
    utils::{ColorOutput, PlanFormatter},
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sokoban_sat_planner")]
#[command(about = "SAT-based planner for grid-rewrite puzzles")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a plan for a level
    Solve {
        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Level file (overrides config)
        #[arg(short, long)]
        level: Option<PathBuf>,

        /// Fixed number of snapshots; disables minimisation
        #[arg(long, conflicts_with = "max_horizon")]
        horizon: Option<usize>,

        /// Upper bound on the plan length; enables minimisation
        #[arg(short, long)]
        max_horizon: Option<usize>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Print every snapshot of the plan
        #[arg(long)]
        show_trajectory: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Create example configuration and level files
    Setup {
        /// Directory to create files in
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Force overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Replay a saved JSON plan against the configured rules and goal
    Validate {
        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Plan file written with `--format json`
        #[arg(short, long)]
        plan: PathBuf,

        /// Print every snapshot of the plan
        #[arg(long)]
        show_trajectory: bool,
    },

    /// Show a level and the size of its encoding
    Analyze {
        /// Configuration file path
        #[arg(short, long, default_value = "config/default.yaml")]
        config: PathBuf,

        /// Level file
        #[arg(short, long)]
        level: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            config,
            level,
            horizon,
            max_horizon,
            output,
            format,
            show_trajectory,
            verbose,
        } => {
            init_tracing(verbose);
            let overrides = CliOverrides {
                horizon,
                max_horizon,
                level_file: level,
                output_dir: output,
                format,
            };
            solve_command(config, overrides, show_trajectory, verbose)
        }
        Commands::Setup { directory, force } => setup_command(directory, force),
        Commands::Validate {
            config,
            plan,
            show_trajectory,
        } => {
            init_tracing(false);
            validate_command(config, plan, show_trajectory)
        }
        Commands::Analyze { config, level } => {
            init_tracing(false);
            analyze_command(config, level)
        }
    }
}

/// Logs go to stderr; `RUST_LOG` takes precedence over `--verbose`
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

fn load_settings(config_path: &Path) -> Result<Settings> {
    if config_path.exists() {
        Settings::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))
    } else {
        let message = format!("Config file {} not found, using defaults", config_path.display());
        println!("{}", ColorOutput::warning(&message));
        Ok(Settings::default())
    }
}

fn solve_command(
    config_path: PathBuf,
    overrides: CliOverrides,
    show_trajectory: bool,
    verbose: bool,
) -> Result<()> {
    println!("{}", ColorOutput::info("🔄 Starting Sokoban SAT Planner"));

    let mut settings = load_settings(&config_path)?;
    settings.merge_with_cli(&overrides);

    if verbose {
        println!("Configuration:");
        println!("  Level file: {}", settings.board.level_file.display());
        if settings.planning.optimize {
            println!("  Max plan length: {} (minimised)", settings.planning.max_horizon);
        } else {
            println!("  Time steps: {}", settings.planning.horizon);
        }
        println!("  Goal: {}", settings.goal_condition());
        println!("  Output dir: {}", settings.output.output_directory.display());
        println!();
    }

    settings.validate().context("Configuration validation failed")?;

    let start_time = Instant::now();
    let problem = PlanningProblem::new(&settings).context("Failed to create planning problem")?;

    println!("{}", ColorOutput::info("🧮 Generating SAT constraints and solving..."));
    let outcome = problem.solve().context("Failed to solve planning problem")?;
    let total_time = start_time.elapsed();

    println!("{}", PlanFormatter::format_outcome(&outcome));

    let solution = match outcome {
        PlanOutcome::Solved(solution) => solution,
        PlanOutcome::Infeasible { .. } | PlanOutcome::Unknown { .. } => return Ok(()),
    };

    let found = format!("✅ Plan found in {:.3}s", total_time.as_secs_f64());
    println!("{}", ColorOutput::success(&found));
    println!("\n{}", PlanFormatter::format_solution(&solution, show_trajectory));

    println!("\n{}", ColorOutput::info("💾 Saving plan..."));
    let output = &settings.output;
    let path = PlanFormatter::save_solution(&solution, &output.output_directory, output.format)
        .context("Failed to save plan")?;
    println!("{}", ColorOutput::success(&format!("Plan saved to {}", path.display())));

    if verbose {
        println!("\n{}", solution.encoding);
        println!("{}", solution.solver);
    }

    Ok(())
}

fn setup_command(directory: PathBuf, force: bool) -> Result<()> {
    println!("{}", ColorOutput::info("🛠️  Setting up project structure..."));

    let config_dir = directory.join("config");
    let levels_dir = directory.join("levels");
    let output_dir = directory.join("output/plans");

    for dir in [&config_dir, &levels_dir, &output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let config_path = config_dir.join("default.yaml");
    if !config_path.exists() || force {
        Settings::default()
            .to_file(&config_path)
            .context("Failed to create default configuration")?;
        println!("Created: {}", config_path.display());
    } else {
        println!("Skipped: {} (already exists)", config_path.display());
    }

    create_example_levels(&levels_dir).context("Failed to create example levels")?;
    println!("Created example levels in: {}", levels_dir.display());

    let examples_dir = config_dir.join("examples");
    std::fs::create_dir_all(&examples_dir)?;

    // Walk to the far corner, minimised
    let mut walk = Settings::default();
    walk.board.level_file = PathBuf::from("levels/walk.txt");
    walk.planning.max_horizon = 10;
    walk.goal = vec![GoalCondition::object_at(3, 3, ObjectKind::Player)];
    walk.to_file(examples_dir.join("walk.yaml"))?;

    // Push with an exact horizon and a crate count
    let mut push = Settings::default();
    push.planning.optimize = false;
    push.planning.horizon = 7;
    push.goal.push(GoalCondition::count(ObjectKind::Crate, 1));
    push.output.format = OutputFormat::Json;
    push.to_file(examples_dir.join("push_fixed.yaml"))?;

    // No plan exists
    let mut enclosed = Settings::default();
    enclosed.board.level_file = PathBuf::from("levels/enclosed.txt");
    enclosed.planning.max_horizon = 6;
    enclosed.goal = vec![GoalCondition::object_at(1, 1, ObjectKind::Player)];
    enclosed.to_file(examples_dir.join("enclosed.yaml"))?;

    println!("Created example configurations in: {}", examples_dir.display());

    println!("\n{}", ColorOutput::success("✅ Setup complete!"));
    println!("\nNext steps:");
    println!("1. Edit configuration files in {}", config_dir.display());
    println!("2. Add your levels to {}", levels_dir.display());
    println!("3. Run: cargo run -- solve --config config/default.yaml");

    Ok(())
}

fn validate_command(config_path: PathBuf, plan_path: PathBuf, show_trajectory: bool) -> Result<()> {
    println!("{}", ColorOutput::info("🔍 Replaying plan..."));

    let settings = load_settings(&config_path)?;
    let solution = PlanSolution::load_from_file(&plan_path)
        .with_context(|| format!("Failed to load plan from {}", plan_path.display()))?;

    let report = replay_plan(&settings, &solution)?;

    for action in &report.explanations {
        println!("  {}", action);
    }
    if show_trajectory {
        println!("\n{}", solution.format_trajectory());
    }

    if report.is_valid() {
        println!("{}", ColorOutput::success("✅ Plan is valid!"));
    } else {
        println!("{}", ColorOutput::error("❌ Plan is invalid"));
        for violation in &report.violations {
            println!("  {}", violation);
        }
    }

    Ok(())
}

/// Replay `solution` from the configured level under the configured rules and goal
fn replay_plan(settings: &Settings, solution: &PlanSolution) -> Result<ValidationReport> {
    let level = load_level_from_file(&settings.board.level_file).with_context(|| {
        format!("Failed to load level from {}", settings.board.level_file.display())
    })?;
    let rules = settings.rule_library().context("Failed to build rule library")?;
    let goal = settings.goal_condition();

    Ok(PlanValidator::new(&rules, &goal).validate(
        &level.initial_state(),
        &solution.trajectory,
        solution.plan_length,
    ))
}

fn analyze_command(config_path: PathBuf, level_path: PathBuf) -> Result<()> {
    println!("{}", ColorOutput::info("🔬 Analyzing level..."));

    let mut settings = load_settings(&config_path)?;
    settings.board.level_file = level_path.clone();

    let level = load_level_from_file(&level_path)
        .with_context(|| format!("Failed to load level from {}", level_path.display()))?;
    let state = level.initial_state();

    println!("Level ({}x{}):", level.width, level.height);
    println!("{}", PlanFormatter::format_state_with_coords(&state));

    println!("Level Statistics:");
    for kind in ObjectKind::ALL {
        println!("  {}: {}", kind, state.count(kind));
    }

    let problem = PlanningProblem::new(&settings).context("Failed to create problem for analysis")?;
    let encoding_stats = problem.encoding_statistics().context("Failed to encode level")?;
    println!("\n{}", encoding_stats);

    Ok(())
}
