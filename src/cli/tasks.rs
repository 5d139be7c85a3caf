use ansi_term::Colour;
use anyhow::Result;
use chrono::{Local, Utc};
use clap::Subcommand;

use crate::storage::{
    entities::{FocusTaskEntity, TaskId, TaskStatus},
    task_store::{NewTask, TaskStore, TaskUpdate},
};

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    #[command(about = "Add a task to the backlog")]
    Add {
        title: String,
        #[arg(short, long, default_value_t = 1, help = "Estimated number of pomodoros")]
        estimate: u32,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, help = "Project name, \"General\" when empty")]
        project: Option<String>,
        #[arg(short, long = "tag")]
        tags: Vec<String>,
    },
    #[command(about = "List tasks that are not completed yet, newest first")]
    List,
    #[command(about = "Change fields of a task")]
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        estimate: Option<u32>,
        #[arg(long)]
        project: Option<String>,
    },
    #[command(about = "Raise or lower the estimate, it never drops below one pomodoro")]
    Estimate {
        id: TaskId,
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
    #[command(about = "Mark a task as skipped")]
    Skip { id: TaskId },
    #[command(about = "Put a task back into the backlog")]
    Reopen { id: TaskId },
}

pub async fn process_task_command(command: TaskCommand, tasks: &impl TaskStore) -> Result<()> {
    match command {
        TaskCommand::Add {
            title,
            estimate,
            description,
            project,
            tags,
        } => {
            let task = tasks
                .create(
                    NewTask {
                        title,
                        description,
                        estimated_pomodoros: estimate,
                        project,
                        tags,
                    },
                    Utc::now(),
                )
                .await?;
            print_task(&task);
        }
        TaskCommand::List => {
            let open = tasks.list_open().await?;
            if open.is_empty() {
                println!("No open tasks");
            }
            for task in open {
                print_task(&task);
            }
        }
        TaskCommand::Edit {
            id,
            title,
            description,
            estimate,
            project,
        } => {
            let task = tasks
                .update(
                    id,
                    TaskUpdate {
                        title,
                        description,
                        estimated_pomodoros: estimate,
                        project,
                    },
                )
                .await?;
            print_task(&task);
        }
        TaskCommand::Estimate { id, delta } => print_task(&tasks.adjust_estimate(id, delta).await?),
        TaskCommand::Skip { id } => {
            print_task(&tasks.set_status(id, TaskStatus::Skipped).await?)
        }
        TaskCommand::Reopen { id } => {
            print_task(&tasks.set_status(id, TaskStatus::Backlog).await?)
        }
    }
    Ok(())
}

fn print_task(task: &FocusTaskEntity) {
    let status = match task.status {
        TaskStatus::Completed => Colour::Green.paint(task.status.to_string()),
        TaskStatus::Skipped => Colour::Yellow.paint(task.status.to_string()),
        TaskStatus::Backlog | TaskStatus::InProgress => Colour::Blue.paint(task.status.to_string()),
    };
    println!(
        "{}\t{}\t{}/{}\t{}m\t{status}\t{}",
        task.id,
        task.created_at.with_timezone(&Local).format("%x"),
        task.completed_pomodoros,
        task.estimated_pomodoros,
        task.total_minutes_spent,
        Colour::White.bold().paint(&task.title),
    );
    let mut details = vec![format!("project: {}", task.project)];
    if !task.tags.is_empty() {
        details.push(format!("tags: {}", task.tags.join(", ")));
    }
    if let Some(description) = &task.description {
        details.push(description.clone());
    }
    println!("\t{}", details.join("\t"));
}
