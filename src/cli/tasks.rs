//! `sluice tasks`: print the task tree.

use std::process::ExitCode;

use super::EXIT_SUCCESS;
use crate::build::TaskName;

pub fn run_list() -> ExitCode {
    print!("{}", render_list());
    ExitCode::from(EXIT_SUCCESS)
}

fn render_list() -> String {
    let width = TaskName::ALL.iter().map(|t| t.as_str().len()).max().unwrap_or(0);
    let mut out = String::from("Tasks\n");
    for task in TaskName::ALL {
        out.push_str(&format!("├── {:<width$}  {}\n", task.as_str(), task.description(), width = width));
        let children = if task.is_aggregate() { task.members() } else { task.dependencies() };
        for (i, child) in children.iter().enumerate() {
            let branch = if i + 1 == children.len() { "└──" } else { "├──" };
            out.push_str(&format!("│   {} {}\n", branch, child));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_every_task() {
        let list = render_list();
        for task in TaskName::ALL {
            assert!(list.contains(task.as_str()));
        }
    }

    #[test]
    fn test_shows_sprite_before_img() {
        let list = render_list();
        let lines: Vec<&str> = list.lines().collect();
        let row = lines.iter().position(|l| l.starts_with("├── build:img")).unwrap();
        assert_eq!(lines[row + 1], "│   └── build:sprite");
    }
}
