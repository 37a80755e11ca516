use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use std::path::PathBuf;
use todostore::{Config, Task, TaskDraft, TaskPatch, TaskStore, View};

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - persisted to-do list with soft delete")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <data-dir>/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the stored snapshot
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        text: String,
        #[arg(short, long)]
        priority: Option<u8>,
        /// Tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Due time (RFC 3339)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List tasks in a view (all, active, pending, completed, deleted)
    List {
        #[arg(long, default_value = "active")]
        view: String,
    },

    /// Edit fields of a task
    Edit {
        id: i64,
        #[arg(long)]
        text: Option<String>,
        #[arg(short, long)]
        priority: Option<u8>,
        /// Replace tags (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Toggle completion
    Complete { id: i64 },

    /// Move a task to the trash
    Delete { id: i64 },

    /// Bring a task back from the trash
    Restore { id: i64 },

    /// Delete a task permanently
    Purge { id: i64 },

    /// Move a task to a new zero-based position
    Move { id: i64, position: usize },

    /// Remove every task
    Clear,

    /// Show or set the current mode
    Mode { name: Option<String> },

    /// Show counts and completion rate
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::resolve(cli.config.as_deref(), cli.data_dir.as_deref())?;

    // Open store
    let mut store = TaskStore::from_config(&config)?;
    store.initialize();

    match cli.command {
        Commands::Add {
            text,
            priority,
            tags,
            at,
        } => {
            let draft = TaskDraft {
                text,
                datetime: at,
                priority,
                tags: Some(tags),
            };
            let task = store.add_todo(draft)?;
            println!("{} {}", "Added".green(), format_task(&task));
        }
        Commands::List { view } => {
            let view: View = view.parse()?;
            let tasks = store.view(view);
            if tasks.is_empty() {
                println!("No {} tasks", view);
            }
            for task in tasks {
                println!("{}", format_task(task));
            }
        }
        Commands::Edit {
            id,
            text,
            priority,
            tags,
            at,
        } => {
            let patch = TaskPatch {
                text,
                priority,
                datetime: at,
                tags: (!tags.is_empty()).then_some(tags),
                ..TaskPatch::new(id)
            };
            if patch.is_empty() {
                return Err(eyre!("Nothing to change for task {}", id));
            }
            report(store.update_todo(patch)?, id, "Updated");
        }
        Commands::Complete { id } => {
            report(store.complete_todo(id)?, id, "Toggled");
        }
        Commands::Delete { id } => {
            report(store.delete_todo(id)?, id, "Trashed");
        }
        Commands::Restore { id } => {
            report(store.restore_todo(id)?, id, "Restored");
        }
        Commands::Purge { id } => {
            report(store.permanently_delete_todo(id)?, id, "Purged");
        }
        Commands::Move { id, position } => {
            report(store.move_todo(id, position)?, id, "Moved");
        }
        Commands::Clear => {
            store.clear_all_todos()?;
            println!("{}", "Cleared all tasks".green());
        }
        Commands::Mode { name } => match name {
            Some(name) => {
                store.set_current_mode(name)?;
                println!("{} {}", "Mode set to".green(), store.current_mode().bold());
            }
            None => println!("{}", store.current_mode()),
        },
        Commands::Stats => {
            let stats = store.stats();
            println!("Mode:      {}", store.current_mode().bold());
            println!("Total:     {}", stats.total);
            println!("Active:    {}", stats.active);
            println!("Pending:   {}", stats.pending);
            println!("Completed: {}", stats.completed);
            println!("Deleted:   {}", stats.deleted);
            println!("Done:      {}%", stats.completion_rate);
        }
    }

    Ok(())
}

fn report(found: bool, id: i64, action: &str) {
    if found {
        println!("{} task {}", action.green(), id);
    } else {
        println!("{} {}", "No task with id".yellow(), id);
    }
}

fn format_task(task: &Task) -> String {
    let check = if task.completed { "[x]".green() } else { "[ ]".normal() };
    let text = if task.soft_delete {
        task.text.strikethrough().dimmed()
    } else {
        task.text.normal()
    };
    let due = task.datetime.with_timezone(&Local).format("%Y-%m-%d %H:%M");

    let mut line = format!(
        "{} {} {} {} {}",
        check,
        task.id.to_string().cyan(),
        format!("P{}", task.priority).magenta(),
        text,
        due.to_string().dimmed()
    );
    if !task.tags.is_empty() {
        line.push_str(&format!(" {}", format!("#{}", task.tags.join(" #")).blue()));
    }
    line
}
