use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use research_core::ViewMode;
use research_planner::commands::Planner;
use research_planner::config::PlannerConfig;
use research_planner::{db, render};

#[derive(Parser)]
#[command(name = "rplan")]
#[command(about = "Plan research paths through a strategy game's research tree")]
struct Cli {
    /// Research database (overrides the configured location)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the research tree with the projects of an XML file
    Load {
        /// Research tree XML (defaults to the configured tree)
        tree: Option<PathBuf>,

        /// Initial research list to remember for `list --view initial`
        #[arg(long)]
        initial: Option<PathBuf>,
    },
    /// List projects
    List {
        #[arg(long, default_value_t = ViewMode::All)]
        view: ViewMode,
    },
    /// Mark a project as researched
    Complete {
        name: String,

        /// Also complete every prerequisite
        #[arg(short, long)]
        recursive: bool,
    },
    /// Mark a project as not researched
    Uncomplete { name: String },
    /// Edit the goals list (the path is re-planned)
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },
    /// Show the goals
    Goals,
    /// Re-plan the research path from the goals
    Plan,
    /// Show the research path
    Path,
    /// Show the prerequisite tree of a project
    Requires { name: String },
    /// Write the research tree to stdout
    Export {
        /// Write the full snapshot as JSON instead of the XML tree
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GoalAction {
    Add { name: String },
    Remove { name: String },
    Up { name: String },
    Down { name: String },
}

/// Logs go to stderr so stdout only carries command output
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "research_planner=info,research_core=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = PlannerConfig::load();
    let database = match cli.db.as_ref().or(config.database_path.as_ref()) {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    let mut planner = Planner::open(database)?;

    if let Some(initial) = &config.initial_research_path {
        if let Err(e) = planner.load_initial_research(initial) {
            tracing::warn!("Ignoring initial research list: {:#}", e);
        }
    }

    match cli.command {
        Commands::Load { tree, initial } => {
            let tree = tree
                .or_else(|| config.tree_path.clone())
                .context("No research tree given and none configured")?;
            planner.load_tree(&tree)?;
            println!("Loaded {} research projects", planner.session().len());

            let mut remembered = config.tree_path.as_ref() != Some(&tree);
            config.tree_path = Some(tree);
            if let Some(initial) = initial {
                let count = planner.load_initial_research(&initial)?;
                println!("Loaded {} initial research entries", count);
                config.initial_research_path = Some(initial);
                remembered = true;
            }
            if remembered {
                config.save()?;
            }
        }
        Commands::List { view } => {
            print!("{}", render::render_projects(planner.session(), &planner.view(view)));
        }
        Commands::Complete { name, recursive } => {
            let changed = planner.complete(&name, recursive)?;
            println!("Marked {} project(s) complete", changed);
        }
        Commands::Uncomplete { name } => {
            if !planner.uncomplete(&name)? {
                println!("{} was not complete", name);
            }
        }
        Commands::Goal { action } => {
            let changed = match &action {
                GoalAction::Add { name } => planner.add_goal(name)?,
                GoalAction::Remove { name } => planner.remove_goal(name)?,
                GoalAction::Up { name } => planner.move_goal_up(name)?,
                GoalAction::Down { name } => planner.move_goal_down(name)?,
            };
            if !changed {
                println!("Goals unchanged");
            }
            print!("{}", render::render_goals(planner.session()));
        }
        Commands::Goals => print!("{}", render::render_goals(planner.session())),
        Commands::Plan => {
            planner.plan()?;
            print!("{}", render::render_path(planner.session()));
        }
        Commands::Path => print!("{}", render::render_path(planner.session())),
        Commands::Requires { name } => {
            let id = planner.require(&name)?;
            print!("{}", render::render_requirements(planner.session(), id));
        }
        Commands::Export { json } => {
            let output = if json {
                planner.export_json()?
            } else {
                planner.export_xml()?
            };
            println!("{}", output);
        }
    }

    planner.close()
}
