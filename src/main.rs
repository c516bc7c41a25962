mod app;
mod bridge;
mod config;
mod entries;
mod pathops;
mod project;
mod ui;
mod writer;

use anyhow::Result;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut project: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                println!("pmmpath");
                println!("  pmmpath [project.pmm]   Open the TUI, optionally loading a project");
                return Ok(());
            }
            other => {
                if project.is_none() {
                    project = Some(other.to_string());
                } else {
                    eprintln!("ignoring extra argument: {other}");
                }
            }
        }
    }

    let mut app = app::App::initialize()?;
    if let Some(path) = project {
        app.load_project_and_extract(&path);
    }
    ui::run(&mut app)
}
